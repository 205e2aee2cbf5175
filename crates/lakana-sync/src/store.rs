//! Typed access to the election sheet.
//!
//! Wraps a [`RemoteTableClient`] and turns rows into records. Every table is
//! bootstrapped (created with its canonical header row) the first time it is
//! touched. Reading the roles table also assigns ids to rows that lack one.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::records::{ApplicationRecord, ChannelRecord, RoleRecord, RowError};
use crate::registry;
use crate::table::{CellEdit, RemoteTableClient, Row, RowIndex, Table};

/// Typed wrapper around a table client.
pub struct TableStore<C> {
    client: C,
    bootstrapped: Mutex<Vec<Table>>,
}

impl<C: RemoteTableClient> TableStore<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            bootstrapped: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    const fn client(&self) -> &C {
        &self.client
    }

    fn ensure(&self, table: Table) -> StoreResult<()> {
        let mut done = self.bootstrapped.lock();
        if !done.contains(&table) {
            self.client.ensure_table(table, table.headers())?;
            done.push(table);
        }
        Ok(())
    }

    fn rows(&self, table: Table) -> StoreResult<Vec<Row>> {
        self.ensure(table)?;
        self.client.list_rows(table)
    }

    /// All roles, assigning ids to rows that have a division and title but
    /// no id. The new ids are written back in a single bulk edit.
    pub fn load_roles(&self) -> StoreResult<Vec<RoleRecord>> {
        let mut rows = self.rows(Table::Roles)?;

        let edits = registry::assign_missing_ids(&mut rows);
        if !edits.is_empty() {
            let assigned = edits.len();
            self.client.update_cells(Table::Roles, edits)?;
            info!("Assigned ids to {assigned} role rows");
        }

        let roles: Vec<RoleRecord> = parse_rows(Table::Roles, &rows, |row| {
            if !registry::is_keyed_role_row(row) {
                return None;
            }
            Some(RoleRecord::from_row(row))
        })
        .into_iter()
        .map(|(_, role)| role)
        .collect();

        for id in registry::duplicate_ids(&roles) {
            warn!("Role id {id} is used by more than one row; the first one wins");
        }
        Ok(roles)
    }

    /// All application rows with their sheet positions.
    pub fn load_applications_indexed(&self) -> StoreResult<Vec<(RowIndex, ApplicationRecord)>> {
        let rows = self.rows(Table::Applications)?;
        Ok(parse_rows(Table::Applications, &rows, |row| {
            Some(ApplicationRecord::from_row(row))
        }))
    }

    pub fn load_applications(&self) -> StoreResult<Vec<ApplicationRecord>> {
        Ok(self
            .load_applications_indexed()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// All channel rows with their sheet positions.
    pub fn load_channels_indexed(&self) -> StoreResult<Vec<(RowIndex, ChannelRecord)>> {
        let rows = self.rows(Table::Channels)?;
        Ok(parse_rows(Table::Channels, &rows, |row| {
            Some(ChannelRecord::from_row(row))
        }))
    }

    pub fn load_channels(&self) -> StoreResult<Vec<ChannelRecord>> {
        Ok(self
            .load_channels_indexed()?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// One bulk append.
    pub fn append_applications(&self, records: &[ApplicationRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure(Table::Applications)?;
        self.client.append_rows(
            Table::Applications,
            records.iter().map(ApplicationRecord::to_row).collect(),
        )
    }

    /// One bulk cell update.
    pub fn update_applications(&self, edits: Vec<CellEdit>) -> StoreResult<()> {
        if edits.is_empty() {
            return Ok(());
        }
        self.ensure(Table::Applications)?;
        self.client.update_cells(Table::Applications, edits)
    }

    pub fn append_channels(&self, records: &[ChannelRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure(Table::Channels)?;
        self.client.append_rows(
            Table::Channels,
            records.iter().map(ChannelRecord::to_row).collect(),
        )
    }

    pub fn delete_channels(&self, rows: Vec<RowIndex>) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.ensure(Table::Channels)?;
        self.client.delete_rows(Table::Channels, rows)
    }
}

/// Parse rows, skipping (and logging) the ones that do not fit the schema.
fn parse_rows<T>(
    table: Table,
    rows: &[Row],
    parse: impl Fn(&Row) -> Option<Result<T, RowError>>,
) -> Vec<(RowIndex, T)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| match parse(row)? {
            Ok(record) => Some((RowIndex(i), record)),
            Err(e) => {
                // Sheet row numbers are 1-based and start below the header.
                warn!("Skipping {table} row {}: {e}", i + 2);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTables;
    use crate::table::columns;

    fn role_row(id: &str, division: &str, title: &str) -> Row {
        Row::from([
            (columns::ROLE_ID, id),
            (columns::DIVISION_LOCAL, division),
            (columns::DIVISION_FOREIGN, division),
            (columns::TITLE_LOCAL, title),
            (columns::TITLE_FOREIGN, title),
            (columns::ROLE_TYPE, "ELECTED"),
        ])
    }

    #[test]
    fn test_missing_tables_are_bootstrapped() {
        let store = TableStore::new(MemoryTables::new());
        assert!(store.load_applications().unwrap().is_empty());
        assert_eq!(
            store.client().headers(Table::Applications).unwrap(),
            columns::APPLICATIONS
        );
        assert!(store.client().headers(Table::Roles).is_none());
    }

    #[test]
    fn test_role_ids_assigned_in_one_bulk_edit() {
        let tables = MemoryTables::new();
        tables.seed(
            Table::Roles,
            vec![
                role_row("", "Hallitus", "Puheenjohtaja"),
                role_row("fixed", "Hallitus", "Rahastonhoitaja"),
                role_row("", "Toimikunnat", "Webmaster"),
                role_row("", "", ""),
            ],
        );
        let store = TableStore::new(tables);

        let roles = store.load_roles().unwrap();
        // ensure + list + one update for both missing ids
        assert_eq!(store.client().calls(), 3);
        assert_eq!(roles.len(), 3);
        assert_eq!(roles[1].id.as_str(), "fixed");
        assert!(roles.iter().all(|r| !r.id.as_str().is_empty()));
        assert_ne!(roles[0].id, roles[2].id);

        // The ids stuck: a second read writes nothing and sees the same ids.
        let again = store.load_roles().unwrap();
        assert_eq!(store.client().calls(), 4);
        assert_eq!(again, roles);
    }

    #[test]
    fn test_unparsable_rows_are_skipped() {
        let tables = MemoryTables::new();
        tables.seed(
            Table::Applications,
            vec![
                Row::from([(columns::APP_ROLE_ID, "r1"), (columns::APPLICANT_ID, "1")]),
                Row::from([(columns::APP_ROLE_ID, "r1"), (columns::APPLICANT_ID, "nobody")]),
                Row::from([
                    (columns::APP_ROLE_ID, "r1"),
                    (columns::APPLICANT_ID, "3"),
                    (columns::STATUS, "MAYBE"),
                ]),
            ],
        );
        let store = TableStore::new(tables);
        let indexed = store.load_applications_indexed().unwrap();
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].0, RowIndex(0));
    }
}
