//! The public election sheet: every role with its visible candidates.

use crate::records::{ApplicationRecord, ApplicationStatus, RoleRecord};
use crate::registry::RoleRegistry;

/// A candidate as shown on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub post_link: String,
    pub elected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRole {
    pub role: RoleRecord,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDivision {
    pub name_local: String,
    pub name_foreign: String,
    pub roles: Vec<SheetRole>,
}

/// Divisions in roles-table order, candidates in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionSheet {
    pub divisions: Vec<SheetDivision>,
}

impl ElectionSheet {
    /// Only APPROVED and ELECTED applications appear.
    #[must_use]
    pub fn build(roles: &[RoleRecord], applications: &[ApplicationRecord]) -> Self {
        let divisions = RoleRegistry::new(roles)
            .divisions()
            .into_iter()
            .map(|division| SheetDivision {
                name_local: division.name_local.to_owned(),
                name_foreign: division.name_foreign.to_owned(),
                roles: division
                    .roles
                    .into_iter()
                    .map(|role| SheetRole {
                        role: role.clone(),
                        candidates: candidates(role, applications),
                    })
                    .collect(),
            })
            .collect();
        Self { divisions }
    }

    /// Total visible candidates.
    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.divisions
            .iter()
            .flat_map(|d| &d.roles)
            .map(|r| r.candidates.len())
            .sum()
    }
}

fn candidates(role: &RoleRecord, applications: &[ApplicationRecord]) -> Vec<Candidate> {
    let mut visible: Vec<&ApplicationRecord> = applications
        .iter()
        .filter(|a| a.role_id == role.id && a.status.is_visible())
        .collect();
    // Rows without a timestamp predate it and sort first; the sort is stable.
    visible.sort_by_key(|a| a.submitted_at);
    visible
        .into_iter()
        .map(|a| Candidate {
            name: a.name.clone(),
            post_link: a.post_link.clone(),
            elected: a.status == ApplicationStatus::Elected,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::records::{ApplicantId, ApplicantInfo, RoleId, RoleType};

    fn role(id: &str, division: &str) -> RoleRecord {
        RoleRecord {
            id: RoleId::new(id),
            division_local: division.into(),
            division_foreign: division.to_uppercase(),
            title_local: id.into(),
            title_foreign: id.into(),
            role_type: RoleType::Elected,
            capacity: "1".into(),
            deadline: None,
        }
    }

    fn app(role: &str, who: i64, status: ApplicationStatus, minute: i64) -> ApplicationRecord {
        ApplicationRecord::submitted(
            RoleId::new(role),
            ApplicantInfo {
                applicant_id: ApplicantId(who),
                name: format!("n{who}"),
                email: String::new(),
                handle: String::new(),
                language: "fi".into(),
            },
            status,
            Utc::now() + Duration::minutes(minute),
        )
    }

    #[test]
    fn test_only_visible_candidates_in_submission_order() {
        let roles = vec![role("chair", "board"), role("web", "it"), role("sec", "board")];
        let apps = vec![
            app("chair", 2, ApplicationStatus::Elected, 5),
            app("chair", 1, ApplicationStatus::Approved, 1),
            app("chair", 3, ApplicationStatus::Pending, 0),
            app("chair", 4, ApplicationStatus::Denied, 0),
            app("web", 5, ApplicationStatus::Removed, 0),
        ];
        let sheet = ElectionSheet::build(&roles, &apps);

        assert_eq!(sheet.divisions.len(), 2);
        let board = &sheet.divisions[0];
        assert_eq!(board.name_foreign, "BOARD");
        assert_eq!(board.roles.len(), 2);
        let names: Vec<_> = board.roles[0].candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["n1", "n2"]);
        assert!(board.roles[0].candidates[1].elected);
        assert!(sheet.divisions[1].roles[0].candidates.is_empty());
        assert_eq!(sheet.candidate_count(), 2);
    }
}
