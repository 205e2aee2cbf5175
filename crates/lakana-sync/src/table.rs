//! Header-addressed table access.
//!
//! The remote store is a spreadsheet: each table has a header row and the
//! data rows below it. Callers never address columns by position, only by
//! header name, so a human reordering columns in the sheet does not break
//! anything.

use std::collections::BTreeMap;

use crate::error::StoreResult;

/// The logical tables of the election sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Roles,
    Applications,
    Channels,
}

impl Table {
    pub const ALL: [Self; 3] = [Self::Roles, Self::Applications, Self::Channels];

    /// Sheet name in the remote store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Roles => "Roles",
            Self::Applications => "Applications",
            Self::Channels => "Channels",
        }
    }

    /// Canonical header row used when the table has to be created.
    #[must_use]
    pub const fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Roles => &columns::ROLES,
            Self::Applications => &columns::APPLICATIONS,
            Self::Channels => &columns::CHANNELS,
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column names. These are the contract with the sheet; order is not.
pub mod columns {
    pub const ROLE_ID: &str = "id";
    pub const DIVISION_LOCAL: &str = "divisionLocal";
    pub const DIVISION_FOREIGN: &str = "divisionForeign";
    pub const TITLE_LOCAL: &str = "titleLocal";
    pub const TITLE_FOREIGN: &str = "titleForeign";
    pub const ROLE_TYPE: &str = "type";
    pub const CAPACITY: &str = "capacity";
    pub const DEADLINE: &str = "deadline";

    pub const APP_ROLE_ID: &str = "roleId";
    pub const APPLICANT_ID: &str = "applicantId";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const HANDLE: &str = "handle";
    pub const POST_LINK: &str = "externalPostLink";
    pub const STATUS: &str = "status";
    pub const LANGUAGE: &str = "language";
    pub const SUBMITTED_AT: &str = "submittedAt";

    pub const CHANNEL_ID: &str = "channelId";
    pub const ADDED_DATE: &str = "addedDate";

    pub const ROLES: [&str; 8] = [
        ROLE_ID,
        DIVISION_LOCAL,
        DIVISION_FOREIGN,
        TITLE_LOCAL,
        TITLE_FOREIGN,
        ROLE_TYPE,
        CAPACITY,
        DEADLINE,
    ];

    pub const APPLICATIONS: [&str; 9] = [
        APP_ROLE_ID,
        APPLICANT_ID,
        NAME,
        EMAIL,
        HANDLE,
        POST_LINK,
        STATUS,
        LANGUAGE,
        SUBMITTED_AT,
    ];

    pub const CHANNELS: [&str; 2] = [CHANNEL_ID, ADDED_DATE];
}

/// Zero-based index of a data row (the header row is not counted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowIndex(pub usize);

/// One data row, keyed by header name.
///
/// Missing cells read as the empty string, like blank spreadsheet cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell setter.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.0.insert(column.to_owned(), value.into());
    }

    /// Cell value, trimmed. Empty when the column is absent.
    #[must_use]
    pub fn get(&self, column: &str) -> &str {
        self.0.get(column).map_or("", |value| value.trim())
    }

    /// Iterate over `(column, value)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Row {
    fn from(cells: [(&str, &str); N]) -> Self {
        Self(
            cells
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

/// A single-cell write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: RowIndex,
    pub column: String,
    pub value: String,
}

impl CellEdit {
    #[must_use]
    pub fn new(row: RowIndex, column: &str, value: impl Into<String>) -> Self {
        Self {
            row,
            column: column.to_owned(),
            value: value.into(),
        }
    }
}

/// Raw access to the remote tabular store.
///
/// Implementations perform no retries; every failure is returned to the
/// caller. Each method is one round trip, so callers batch.
pub trait RemoteTableClient: Send + Sync {
    /// Create `table` with `headers` if it does not exist yet.
    fn ensure_table(&self, table: Table, headers: &[&str]) -> StoreResult<()>;

    /// All data rows in sheet order.
    fn list_rows(&self, table: Table) -> StoreResult<Vec<Row>>;

    /// Append rows after the last data row.
    fn append_rows(&self, table: Table, rows: Vec<Row>) -> StoreResult<()>;

    /// Write individual cells.
    fn update_cells(&self, table: Table, edits: Vec<CellEdit>) -> StoreResult<()>;

    /// Delete data rows. Indices refer to the table before any deletion.
    fn delete_rows(&self, table: Table, rows: Vec<RowIndex>) -> StoreResult<()>;
}

impl<C: RemoteTableClient + ?Sized> RemoteTableClient for std::sync::Arc<C> {
    fn ensure_table(&self, table: Table, headers: &[&str]) -> StoreResult<()> {
        (**self).ensure_table(table, headers)
    }

    fn list_rows(&self, table: Table) -> StoreResult<Vec<Row>> {
        (**self).list_rows(table)
    }

    fn append_rows(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        (**self).append_rows(table, rows)
    }

    fn update_cells(&self, table: Table, edits: Vec<CellEdit>) -> StoreResult<()> {
        (**self).update_cells(table, edits)
    }

    fn delete_rows(&self, table: Table, rows: Vec<RowIndex>) -> StoreResult<()> {
        (**self).delete_rows(table, rows)
    }
}
