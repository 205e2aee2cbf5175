//! Application lifecycle.
//!
//! ```text
//!  submit ──► PENDING ──approve──► APPROVED ──elect──► ELECTED
//!               │                     │                   │
//!               └──deny──► DENIED     └──remove──► REMOVED ◄┘
//! ```
//!
//! Submissions to non-exclusive roles start out APPROVED. DENIED and REMOVED
//! are terminal; the same applicant may apply to the role again afterwards.

use crate::error::{SyncError, SyncResult};
use crate::records::{ApplicationRecord, ApplicationStatus, RoleRecord, RoleType};

/// An admin action on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Approve,
    Deny,
    Elect,
    Remove,
}

impl Transition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Elect => "elect",
            Self::Remove => "remove",
        }
    }

    /// Status after the transition, or `None` if it is not allowed from `from`.
    #[must_use]
    pub const fn target(self, from: ApplicationStatus) -> Option<ApplicationStatus> {
        use crate::records::ApplicationStatus::{Approved, Denied, Elected, Pending, Removed};

        match (self, from) {
            (Self::Approve, Pending) => Some(Approved),
            (Self::Deny, Pending) => Some(Denied),
            (Self::Elect, Approved) => Some(Elected),
            (Self::Remove, Approved | Elected) => Some(Removed),
            _ => None,
        }
    }

    /// Validate the transition against the current status.
    pub fn apply(self, from: ApplicationStatus) -> SyncResult<ApplicationStatus> {
        self.target(from).ok_or(SyncError::InvalidTransition {
            from,
            transition: self,
        })
    }

    /// Approvals and elections are announced on broadcast channels.
    #[must_use]
    pub const fn is_announced(self) -> bool {
        matches!(self, Self::Approve | Self::Elect)
    }
}

impl core::fmt::Display for Transition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status a new submission starts in.
#[must_use]
pub const fn initial_status(role_type: RoleType) -> ApplicationStatus {
    if role_type.is_exclusive() {
        ApplicationStatus::Pending
    } else {
        ApplicationStatus::Approved
    }
}

/// Other active applications by the same applicant to exclusive roles.
///
/// Only consulted when `role` itself is exclusive. The result is a warning
/// for the applicant, not a rejection.
#[must_use]
pub fn exclusive_conflicts<'a>(
    role: &RoleRecord,
    own_applications: impl IntoIterator<Item = &'a ApplicationRecord>,
    roles: &'a [RoleRecord],
) -> Vec<&'a RoleRecord> {
    if !role.role_type.is_exclusive() {
        return Vec::new();
    }

    let mut conflicts: Vec<&RoleRecord> = Vec::new();
    for application in own_applications {
        if !application.status.is_active() || application.role_id == role.id {
            continue;
        }
        let Some(other) = roles.iter().find(|r| r.id == application.role_id) else {
            continue;
        };
        if other.role_type.is_exclusive() && !conflicts.iter().any(|c| c.id == other.id) {
            conflicts.push(other);
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::records::{ApplicantId, ApplicantInfo, RoleId};

    use crate::records::ApplicationStatus::{Approved, Denied, Elected, Pending, Removed};

    const ALL: [ApplicationStatus; 5] = [Pending, Approved, Denied, Removed, Elected];

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(Transition::Approve.apply(Pending).unwrap(), Approved);
        assert_eq!(Transition::Deny.apply(Pending).unwrap(), Denied);
        assert_eq!(Transition::Elect.apply(Approved).unwrap(), Elected);
        assert_eq!(Transition::Remove.apply(Approved).unwrap(), Removed);
        assert_eq!(Transition::Remove.apply(Elected).unwrap(), Removed);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for transition in [
            Transition::Approve,
            Transition::Deny,
            Transition::Elect,
            Transition::Remove,
        ] {
            for from in [Denied, Removed] {
                assert!(transition.target(from).is_none(), "{transition} from {from}");
            }
        }
    }

    #[test]
    fn test_deny_after_approve_is_invalid() {
        let err = Transition::Deny.apply(Approved).unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidTransition {
                from: Approved,
                transition: Transition::Deny
            }
        ));
    }

    #[test]
    fn test_every_target_is_a_different_state() {
        for from in ALL {
            for transition in [Transition::Approve, Transition::Elect] {
                if let Some(to) = transition.target(from) {
                    assert_ne!(to, from);
                }
            }
        }
    }

    #[test]
    fn test_initial_status_by_role_type() {
        assert_eq!(initial_status(RoleType::Executive), Pending);
        assert_eq!(initial_status(RoleType::Elected), Pending);
        assert_eq!(initial_status(RoleType::NonElected), Approved);
        assert_eq!(initial_status(RoleType::Auditor), Approved);
    }

    fn role(id: &str, role_type: RoleType) -> RoleRecord {
        RoleRecord {
            id: RoleId::new(id),
            division_local: "Hallitus".into(),
            division_foreign: "Board".into(),
            title_local: id.into(),
            title_foreign: id.into(),
            role_type,
            capacity: "1".into(),
            deadline: None,
        }
    }

    fn applied(role_id: &str, status: ApplicationStatus) -> ApplicationRecord {
        ApplicationRecord::submitted(
            RoleId::new(role_id),
            ApplicantInfo {
                applicant_id: ApplicantId(1),
                name: "A".into(),
                email: "a@example.org".into(),
                handle: "a".into(),
                language: "en".into(),
            },
            status,
            Utc::now(),
        )
    }

    #[test]
    fn test_conflicts_only_for_active_exclusive_roles() {
        let roles = vec![
            role("chair", RoleType::Executive),
            role("treasurer", RoleType::Elected),
            role("webmaster", RoleType::NonElected),
            role("secretary", RoleType::Elected),
        ];
        let apps = [
            applied("chair", Pending),
            applied("webmaster", Approved),
            applied("secretary", Denied),
        ];

        let conflicts = exclusive_conflicts(&roles[1], &apps, &roles);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, RoleId::new("chair"));

        // Applying to a non-exclusive role never warns.
        assert!(exclusive_conflicts(&roles[2], &apps, &roles).is_empty());
    }
}
