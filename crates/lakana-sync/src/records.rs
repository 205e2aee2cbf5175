//! Typed records of the election sheet.
//!
//! Rows are parsed into these structs once, at the store boundary. Nothing
//! past [`TableStore`](crate::TableStore) indexes a row by column name.

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{Row, columns};

/// Stable opaque role identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh globally unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// External (chat platform) identity of an applicant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ApplicantId(pub i64);

impl core::fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat that receives broadcast announcements.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChannelId(pub i64);

impl core::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleType {
    Executive,
    Elected,
    NonElected,
    Auditor,
}

impl RoleType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Executive => "EXECUTIVE",
            Self::Elected => "ELECTED",
            Self::NonElected => "NON_ELECTED",
            Self::Auditor => "AUDITOR",
        }
    }

    /// Lenient parse. Accepts the legacy `BOARD` and `NON-ELECTED` spellings
    /// and reads an empty cell as non-elected.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EXECUTIVE" | "BOARD" => Some(Self::Executive),
            "ELECTED" => Some(Self::Elected),
            "" | "NON_ELECTED" | "NON-ELECTED" => Some(Self::NonElected),
            "AUDITOR" => Some(Self::Auditor),
            _ => None,
        }
    }

    /// Submissions to these roles wait for an admin, and an applicant should
    /// hold only one of them at a time.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::Executive | Self::Elected)
    }
}

impl core::fmt::Display for RoleType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Denied,
    Removed,
    Elected,
}

impl ApplicationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Removed => "REMOVED",
            Self::Elected => "ELECTED",
        }
    }

    /// An empty cell is a pending application in older sheets.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "DENIED" => Some(Self::Denied),
            "REMOVED" => Some(Self::Removed),
            "ELECTED" => Some(Self::Elected),
            _ => None,
        }
    }

    /// DENIED or REMOVED: the record is finished and the applicant may apply again.
    #[must_use]
    pub const fn is_terminal_negative(self) -> bool {
        matches!(self, Self::Denied | Self::Removed)
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal_negative()
    }

    /// Shown on the published election sheet.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Approved | Self::Elected)
    }
}

impl core::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application deadline as written in the sheet: `day.month`, current year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub day: u32,
    pub month: u32,
}

impl Deadline {
    /// Parse `"14.3"` or `"14.3."`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (day, month) = value.trim().trim_end_matches('.').split_once('.')?;
        Some(Self {
            day: day.trim().parse().ok()?,
            month: month.trim().parse().ok()?,
        })
    }

    /// Closing date in `year`, if it is a real calendar date.
    #[must_use]
    pub fn closes_on(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }

    /// The deadline day itself is still open.
    #[must_use]
    pub fn has_passed(self, today: NaiveDate) -> bool {
        self.closes_on(today.year())
            .is_some_and(|closing| today > closing)
    }
}

/// Error parsing a row into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} in column {column}")]
pub struct RowError {
    pub column: &'static str,
    pub value: String,
}

impl RowError {
    fn new(column: &'static str, value: &str) -> Self {
        Self {
            column,
            value: value.to_owned(),
        }
    }
}

/// A position that can receive applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub division_local: String,
    pub division_foreign: String,
    pub title_local: String,
    pub title_foreign: String,
    pub role_type: RoleType,
    /// Free-text slot count: "1", "2", "n".
    pub capacity: String,
    /// Raw `day.month` text, see [`Deadline`].
    pub deadline: Option<String>,
}

impl RoleRecord {
    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        let role_type = row.get(columns::ROLE_TYPE);
        Ok(Self {
            id: RoleId::new(row.get(columns::ROLE_ID)),
            division_local: row.get(columns::DIVISION_LOCAL).to_owned(),
            division_foreign: row.get(columns::DIVISION_FOREIGN).to_owned(),
            title_local: row.get(columns::TITLE_LOCAL).to_owned(),
            title_foreign: row.get(columns::TITLE_FOREIGN).to_owned(),
            role_type: RoleType::parse(role_type)
                .ok_or_else(|| RowError::new(columns::ROLE_TYPE, role_type))?,
            capacity: row.get(columns::CAPACITY).to_owned(),
            deadline: non_empty(row.get(columns::DEADLINE)),
        })
    }

    #[must_use]
    pub fn to_row(&self) -> Row {
        Row::new()
            .with(columns::ROLE_ID, self.id.as_str())
            .with(columns::DIVISION_LOCAL, &*self.division_local)
            .with(columns::DIVISION_FOREIGN, &*self.division_foreign)
            .with(columns::TITLE_LOCAL, &*self.title_local)
            .with(columns::TITLE_FOREIGN, &*self.title_foreign)
            .with(columns::ROLE_TYPE, self.role_type.as_str())
            .with(columns::CAPACITY, &*self.capacity)
            .with(columns::DEADLINE, self.deadline.as_deref().unwrap_or_default())
    }

    /// Parsed deadline. An unparsable value counts as no deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline.as_deref().and_then(Deadline::parse)
    }

    /// Title in the requested language, falling back to the local title.
    #[must_use]
    pub fn title(&self, foreign: bool) -> &str {
        if foreign && !self.title_foreign.is_empty() {
            &self.title_foreign
        } else {
            &self.title_local
        }
    }
}

/// Identity of an application: one role, one applicant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplicationKey {
    pub role_id: RoleId,
    pub applicant_id: ApplicantId,
}

impl ApplicationKey {
    #[must_use]
    pub fn new(role_id: RoleId, applicant_id: ApplicantId) -> Self {
        Self {
            role_id,
            applicant_id,
        }
    }
}

impl core::fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.role_id, self.applicant_id)
    }
}

/// One generation of an application: the key plus its submission time.
///
/// A re-application after DENIED/REMOVED reuses the key but gets a new
/// timestamp, so edits aimed at the old record never land on the new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationRef {
    pub key: ApplicationKey,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Applicant details collected by the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantInfo {
    pub applicant_id: ApplicantId,
    pub name: String,
    pub email: String,
    pub handle: String,
    pub language: String,
}

/// A nomination for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub role_id: RoleId,
    pub applicant_id: ApplicantId,
    pub name: String,
    pub email: String,
    pub handle: String,
    pub post_link: String,
    pub status: ApplicationStatus,
    pub language: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// A fresh submission.
    #[must_use]
    pub fn submitted(
        role_id: RoleId,
        applicant: ApplicantInfo,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            role_id,
            applicant_id: applicant.applicant_id,
            name: applicant.name,
            email: applicant.email,
            handle: applicant.handle,
            post_link: String::new(),
            status,
            language: applicant.language,
            submitted_at: Some(now),
        }
    }

    #[must_use]
    pub fn key(&self) -> ApplicationKey {
        ApplicationKey::new(self.role_id.clone(), self.applicant_id)
    }

    #[must_use]
    pub fn reference(&self) -> ApplicationRef {
        ApplicationRef {
            key: self.key(),
            submitted_at: self.submitted_at,
        }
    }

    #[must_use]
    pub fn is_key(&self, key: &ApplicationKey) -> bool {
        self.role_id == key.role_id && self.applicant_id == key.applicant_id
    }

    #[must_use]
    pub fn is_ref(&self, target: &ApplicationRef) -> bool {
        self.is_key(&target.key) && self.submitted_at == target.submitted_at
    }

    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        let applicant = row.get(columns::APPLICANT_ID);
        let status = row.get(columns::STATUS);
        let submitted = row.get(columns::SUBMITTED_AT);
        let submitted_at = if submitted.is_empty() {
            None
        } else {
            Some(parse_timestamp(submitted).ok_or_else(|| {
                RowError::new(columns::SUBMITTED_AT, submitted)
            })?)
        };

        Ok(Self {
            role_id: RoleId::new(row.get(columns::APP_ROLE_ID)),
            applicant_id: ApplicantId(
                applicant
                    .parse()
                    .map_err(|_| RowError::new(columns::APPLICANT_ID, applicant))?,
            ),
            name: row.get(columns::NAME).to_owned(),
            email: row.get(columns::EMAIL).to_owned(),
            handle: row.get(columns::HANDLE).to_owned(),
            post_link: row.get(columns::POST_LINK).to_owned(),
            status: ApplicationStatus::parse(status)
                .ok_or_else(|| RowError::new(columns::STATUS, status))?,
            language: row.get(columns::LANGUAGE).to_owned(),
            submitted_at,
        })
    }

    #[must_use]
    pub fn to_row(&self) -> Row {
        Row::new()
            .with(columns::APP_ROLE_ID, self.role_id.as_str())
            .with(columns::APPLICANT_ID, self.applicant_id.to_string())
            .with(columns::NAME, &*self.name)
            .with(columns::EMAIL, &*self.email)
            .with(columns::HANDLE, &*self.handle)
            .with(columns::POST_LINK, &*self.post_link)
            .with(columns::STATUS, self.status.as_str())
            .with(columns::LANGUAGE, &*self.language)
            .with(
                columns::SUBMITTED_AT,
                self.submitted_at.map(format_timestamp).unwrap_or_default(),
            )
    }
}

/// Field changes to an existing application. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    /// Empty string clears the link.
    pub post_link: Option<String>,
}

impl ApplicationPatch {
    #[must_use]
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            post_link: None,
        }
    }

    #[must_use]
    pub fn post_link(link: impl Into<String>) -> Self {
        Self {
            status: None,
            post_link: Some(link.into()),
        }
    }

    /// Fold a later patch into this one; the later value wins per field.
    pub fn merge(&mut self, later: Self) {
        if later.status.is_some() {
            self.status = later.status;
        }
        if later.post_link.is_some() {
            self.post_link = later.post_link;
        }
    }

    pub fn apply(&self, record: &mut ApplicationRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(link) = &self.post_link {
            record.post_link.clone_from(link);
        }
    }
}

/// A broadcast target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_id: ChannelId,
    pub added_at: Option<DateTime<Utc>>,
}

impl ChannelRecord {
    pub fn from_row(row: &Row) -> Result<Self, RowError> {
        let channel = row.get(columns::CHANNEL_ID);
        let added = row.get(columns::ADDED_DATE);
        Ok(Self {
            channel_id: ChannelId(
                channel
                    .parse()
                    .map_err(|_| RowError::new(columns::CHANNEL_ID, channel))?,
            ),
            // Legacy sheets hold naive local timestamps; those read as unknown.
            added_at: parse_timestamp(added),
        })
    }

    #[must_use]
    pub fn to_row(&self) -> Row {
        Row::new()
            .with(columns::CHANNEL_ID, self.channel_id.to_string())
            .with(
                columns::ADDED_DATE,
                self.added_at.map(format_timestamp).unwrap_or_default(),
            )
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// RFC 3339 with as many fractional digits as needed, so it parses back equal.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn application() -> ApplicationRecord {
        ApplicationRecord::submitted(
            RoleId::new("r1"),
            ApplicantInfo {
                applicant_id: ApplicantId(42),
                name: "Maija Meikäläinen".into(),
                email: "maija@example.org".into(),
                handle: "maija".into(),
                language: "fi".into(),
            },
            ApplicationStatus::Pending,
            Utc::now(),
        )
    }

    #[test]
    fn test_application_row_preserves_generation() {
        let record = application();
        let parsed = ApplicationRecord::from_row(&record.to_row()).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.is_ref(&record.reference()));
    }

    #[test]
    fn test_empty_status_is_pending() {
        let row = Row::from([
            (columns::APP_ROLE_ID, "r1"),
            (columns::APPLICANT_ID, "7"),
            (columns::STATUS, ""),
        ]);
        let record = ApplicationRecord::from_row(&row).unwrap();
        assert_eq!(record.status, ApplicationStatus::Pending);
        assert_eq!(record.submitted_at, None);
    }

    #[test]
    fn test_bad_applicant_id_is_rejected() {
        let row = Row::from([(columns::APP_ROLE_ID, "r1"), (columns::APPLICANT_ID, "abc")]);
        let err = ApplicationRecord::from_row(&row).unwrap_err();
        assert_eq!(err.column, columns::APPLICANT_ID);
    }

    #[test]
    fn test_legacy_role_types() {
        assert_eq!(RoleType::parse("BOARD"), Some(RoleType::Executive));
        assert_eq!(RoleType::parse("NON-ELECTED"), Some(RoleType::NonElected));
        assert_eq!(RoleType::parse(""), Some(RoleType::NonElected));
        assert_eq!(RoleType::parse("chair"), None);
        assert!(RoleType::Elected.is_exclusive());
        assert!(!RoleType::Auditor.is_exclusive());
    }

    #[test]
    fn test_deadline_parsing() {
        assert_eq!(Deadline::parse("14.3."), Some(Deadline { day: 14, month: 3 }));
        assert_eq!(Deadline::parse(" 1.12 "), Some(Deadline { day: 1, month: 12 }));
        assert_eq!(Deadline::parse("soon"), None);
        assert_eq!(Deadline::parse("31"), None);
    }

    #[test]
    fn test_deadline_day_is_still_open() {
        let deadline = Deadline { day: 14, month: 3 };
        let on_day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert!(!deadline.has_passed(on_day));
        assert!(deadline.has_passed(after));
        // Not a calendar date: never passes.
        assert!(!Deadline { day: 31, month: 2 }.has_passed(after));
    }

    #[test]
    fn test_patch_merge_is_last_writer_wins() {
        let mut patch = ApplicationPatch::status(ApplicationStatus::Approved);
        patch.merge(ApplicationPatch::post_link("https://forum/t/1"));
        patch.merge(ApplicationPatch::status(ApplicationStatus::Elected));
        assert_eq!(patch.status, Some(ApplicationStatus::Elected));
        assert_eq!(patch.post_link.as_deref(), Some("https://forum/t/1"));
    }
}
