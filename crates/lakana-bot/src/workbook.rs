//! A workbook kept in one JSON file.
//!
//! Stands in for the hosted spreadsheet: every table is a [`SheetData`]
//! (header row plus string cells) stored under its sheet name. Each call
//! reads from memory and writes the whole file back before returning, via a
//! temporary sibling and a rename, so a crash never leaves half a file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lakana_sync::{
    CellEdit, RemoteTableClient, Row, RowIndex, SheetData, StoreError, StoreResult, Table,
};
use parking_lot::Mutex;
use tracing::{debug, info};

pub struct FileWorkbook {
    path: PathBuf,
    sheets: Mutex<BTreeMap<String, SheetData>>,
}

impl FileWorkbook {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let sheets = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let sheets: BTreeMap<String, SheetData> =
                serde_json::from_str(&text).map_err(std::io::Error::from)?;
            info!("Opened workbook {} ({} sheets)", path.display(), sheets.len());
            sheets
        } else {
            info!("Workbook {} does not exist yet", path.display());
            BTreeMap::new()
        };
        Ok(Self {
            path,
            sheets: Mutex::new(sheets),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, sheets: &BTreeMap<String, SheetData>) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(sheets).map_err(std::io::Error::from)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved workbook {}", self.path.display());
        Ok(())
    }

    /// Apply `f` to a copy of `table` and keep the result only if it was
    /// written to disk.
    fn modify(
        &self,
        table: Table,
        f: impl FnOnce(&mut SheetData) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let mut sheets = self.sheets.lock();
        let mut next = sheets.clone();
        let sheet = next
            .get_mut(table.name())
            .ok_or_else(|| StoreError::Unavailable(format!("worksheet {table} not found")))?;
        f(sheet)?;
        self.persist(&next)?;
        *sheets = next;
        Ok(())
    }
}

impl RemoteTableClient for FileWorkbook {
    fn ensure_table(&self, table: Table, headers: &[&str]) -> StoreResult<()> {
        let mut sheets = self.sheets.lock();
        if sheets.contains_key(table.name()) {
            return Ok(());
        }
        let mut next = sheets.clone();
        next.insert(table.name().to_owned(), SheetData::new(headers));
        self.persist(&next)?;
        *sheets = next;
        info!("Created worksheet {table}");
        Ok(())
    }

    fn list_rows(&self, table: Table) -> StoreResult<Vec<Row>> {
        self.sheets
            .lock()
            .get(table.name())
            .map(SheetData::to_rows)
            .ok_or_else(|| StoreError::Unavailable(format!("worksheet {table} not found")))
    }

    fn append_rows(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        self.modify(table, |sheet| sheet.append(table, rows))
    }

    fn update_cells(&self, table: Table, edits: Vec<CellEdit>) -> StoreResult<()> {
        self.modify(table, |sheet| sheet.update(table, edits))
    }

    fn delete_rows(&self, table: Table, rows: Vec<RowIndex>) -> StoreResult<()> {
        self.modify(table, |sheet| sheet.delete(table, rows))
    }
}

#[cfg(test)]
mod tests {
    use lakana_sync::columns;
    use pretty_assertions::assert_eq;

    use super::*;

    fn channel(id: &str) -> Row {
        Row::from([(columns::CHANNEL_ID, id), (columns::ADDED_DATE, "")])
    }

    #[test]
    fn test_tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lakana.json");

        let workbook = FileWorkbook::open(&path).unwrap();
        workbook
            .ensure_table(Table::Channels, &columns::CHANNELS)
            .unwrap();
        workbook
            .append_rows(Table::Channels, vec![channel("-1"), channel("-2"), channel("-3")])
            .unwrap();
        workbook
            .delete_rows(Table::Channels, vec![RowIndex(1)])
            .unwrap();
        workbook
            .update_cells(
                Table::Channels,
                vec![CellEdit::new(RowIndex(0), columns::ADDED_DATE, "2026-10-19T12:00:00Z")],
            )
            .unwrap();
        drop(workbook);

        let reopened = FileWorkbook::open(&path).unwrap();
        let rows = reopened.list_rows(Table::Channels).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.get(columns::CHANNEL_ID)).collect();
        assert_eq!(ids, ["-1", "-3"]);
        assert_eq!(rows[0].get(columns::ADDED_DATE), "2026-10-19T12:00:00Z");
        assert!(!dir.path().join("lakana.json.tmp").exists());
    }

    #[test]
    fn test_rejected_write_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lakana.json");
        let workbook = FileWorkbook::open(&path).unwrap();
        workbook
            .ensure_table(Table::Channels, &columns::CHANNELS)
            .unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = workbook
            .append_rows(Table::Channels, vec![Row::from([("bogus", "1")])])
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert!(workbook.list_rows(Table::Channels).unwrap().is_empty());
    }

    #[test]
    fn test_missing_worksheet_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let workbook = FileWorkbook::open(dir.path().join("new.json")).unwrap();
        assert!(matches!(
            workbook.list_rows(Table::Roles),
            Err(StoreError::Unavailable(_))
        ));
    }
}
