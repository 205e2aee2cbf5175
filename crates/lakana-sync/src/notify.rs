//! Outbound messages: applicant notifications and channel announcements.
//!
//! The engine decides *what* to say and *to whom*; a [`NotificationSink`]
//! does the delivery. Delivery errors on announcements are reported back so
//! the engine can drop channels that no longer accept messages.

use parking_lot::Mutex;
use thiserror::Error;

use crate::lifecycle::Transition;
use crate::records::{ApplicantId, ApplicationRecord, ChannelId, RoleRecord};

/// Language code of the organization's own language. Every other code gets
/// the foreign texts.
pub const LOCAL_LANGUAGE: &str = "fi";

/// Which message an applicant receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Approved,
    Denied,
    Elected,
    Removed,
}

impl TemplateKey {
    #[must_use]
    pub const fn for_transition(transition: Transition) -> Self {
        match transition {
            Transition::Approve => Self::Approved,
            Transition::Deny => Self::Denied,
            Transition::Elect => Self::Elected,
            Transition::Remove => Self::Removed,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "application_approved",
            Self::Denied => "application_denied",
            Self::Elected => "application_elected",
            Self::Removed => "application_removed",
        }
    }
}

impl core::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template parameters of an applicant notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeParams {
    pub applicant_name: String,
    /// Role title in the applicant's language.
    pub role_title: String,
    pub language: String,
}

impl NoticeParams {
    #[must_use]
    pub fn new(application: &ApplicationRecord, role: &RoleRecord) -> Self {
        Self {
            applicant_name: application.name.clone(),
            role_title: role
                .title(application.language != LOCAL_LANGUAGE)
                .to_owned(),
            language: application.language.clone(),
        }
    }

    /// Default rendering of a template.
    #[must_use]
    pub fn render(&self, template: TemplateKey) -> String {
        let title = &self.role_title;
        let local = self.language == LOCAL_LANGUAGE;
        match (template, local) {
            (TemplateKey::Approved, true) => {
                format!("Hakemuksesi virkaan {title} on hyväksytty ja lisätty vaalilakanaan.")
            }
            (TemplateKey::Approved, false) => format!(
                "Your application for the position {title} has been approved and added to the election sheet."
            ),
            (TemplateKey::Denied, true) => {
                format!("Valitettavasti hakemuksesi virkaan {title} on hylätty.")
            }
            (TemplateKey::Denied, false) => {
                format!("Unfortunately, your application for the position {title} has been rejected.")
            }
            (TemplateKey::Elected, true) => format!("Onnittelut! Sinut on valittu virkaan {title}."),
            (TemplateKey::Elected, false) => {
                format!("Congratulations! You have been elected to the position {title}.")
            }
            (TemplateKey::Removed, true) => {
                format!("Hakemuksesi virkaan {title} on poistettu vaalilakanasta.")
            }
            (TemplateKey::Removed, false) => {
                format!("Your application for the position {title} has been removed from the election sheet.")
            }
        }
    }
}

/// A message posted to every broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: TemplateKey,
    pub role_title: String,
    pub applicant_name: String,
}

impl Announcement {
    #[must_use]
    pub fn new(kind: TemplateKey, application: &ApplicationRecord, role: &RoleRecord) -> Self {
        Self {
            kind,
            role_title: role.title_local.clone(),
            applicant_name: application.name.clone(),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        match self.kind {
            TemplateKey::Elected => format!(
                "Elected: {}: {}",
                self.role_title, self.applicant_name
            ),
            _ => format!(
                "New candidate on election sheet!\n{}: {}",
                self.role_title, self.applicant_name
            ),
        }
    }
}

/// A message could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Delivers notifications and announcements.
pub trait NotificationSink: Send + Sync {
    fn notify(
        &self,
        applicant: ApplicantId,
        template: TemplateKey,
        params: &NoticeParams,
    ) -> Result<(), DeliveryError>;

    fn announce(&self, channel: ChannelId, announcement: &Announcement) -> Result<(), DeliveryError>;
}

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notice {
        applicant: ApplicantId,
        template: TemplateKey,
        params: NoticeParams,
    },
    Announcement {
        channel: ChannelId,
        announcement: Announcement,
    },
}

/// Sink that records deliveries in memory, for tests and dry runs.
///
/// Channels listed as unreachable reject every announcement.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    unreachable: Mutex<Vec<ChannelId>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, channel: ChannelId) {
        self.unreachable.lock().push(channel);
    }

    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Channels that received an announcement, in delivery order.
    #[must_use]
    pub fn announced_to(&self) -> Vec<ChannelId> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Announcement { channel, .. } => Some(*channel),
                Delivery::Notice { .. } => None,
            })
            .collect()
    }

    /// Templates sent to `applicant`, in delivery order.
    #[must_use]
    pub fn notices_for(&self, applicant: ApplicantId) -> Vec<TemplateKey> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Notice {
                    applicant: to,
                    template,
                    ..
                } if *to == applicant => Some(*template),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(
        &self,
        applicant: ApplicantId,
        template: TemplateKey,
        params: &NoticeParams,
    ) -> Result<(), DeliveryError> {
        self.deliveries.lock().push(Delivery::Notice {
            applicant,
            template,
            params: params.clone(),
        });
        Ok(())
    }

    fn announce(&self, channel: ChannelId, announcement: &Announcement) -> Result<(), DeliveryError> {
        if self.unreachable.lock().contains(&channel) {
            return Err(DeliveryError(format!("chat {channel} not found")));
        }
        self.deliveries.lock().push(Delivery::Announcement {
            channel,
            announcement: announcement.clone(),
        });
        Ok(())
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<S> {
    fn notify(
        &self,
        applicant: ApplicantId,
        template: TemplateKey,
        params: &NoticeParams,
    ) -> Result<(), DeliveryError> {
        (**self).notify(applicant, template, params)
    }

    fn announce(&self, channel: ChannelId, announcement: &Announcement) -> Result<(), DeliveryError> {
        (**self).announce(channel, announcement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_follows_applicant_language() {
        let params = NoticeParams {
            applicant_name: "Ada".into(),
            role_title: "Webmaster".into(),
            language: "en".into(),
        };
        assert!(params.render(TemplateKey::Denied).starts_with("Unfortunately"));

        let local = NoticeParams {
            language: LOCAL_LANGUAGE.into(),
            ..params
        };
        assert!(local.render(TemplateKey::Approved).contains("hyväksytty"));
    }

    #[test]
    fn test_unreachable_channel_rejects_announcements() {
        let sink = RecordingSink::new();
        sink.set_unreachable(ChannelId(-9));
        let announcement = Announcement {
            kind: TemplateKey::Approved,
            role_title: "Puheenjohtaja".into(),
            applicant_name: "Ada".into(),
        };
        assert!(sink.announce(ChannelId(-9), &announcement).is_err());
        sink.announce(ChannelId(3), &announcement).unwrap();
        assert_eq!(sink.announced_to(), vec![ChannelId(3)]);
    }
}
