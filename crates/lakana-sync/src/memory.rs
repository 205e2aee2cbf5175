//! In-memory table store.
//!
//! [`SheetData`] holds one worksheet as header + string cells and implements
//! the header-addressed operations. [`MemoryTables`] wraps a set of them
//! behind [`RemoteTableClient`] and is what the tests run the engine against:
//! it can reorder headers, take edits "by a human" that bypass the engine,
//! count round trips and simulate an outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::table::{CellEdit, RemoteTableClient, Row, RowIndex, Table};

/// One worksheet: a header row plus data rows of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|&h| h.to_owned()).collect(),
            rows: Vec::new(),
        }
    }

    fn column(&self, table: Table, name: &str) -> StoreResult<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| StoreError::MissingColumn {
                table,
                column: name.to_owned(),
            })
    }

    /// Data rows keyed by header.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                let mut row = Row::new();
                for (i, header) in self.headers.iter().enumerate() {
                    if header.is_empty() {
                        continue;
                    }
                    row.set(header, cells.get(i).cloned().unwrap_or_default());
                }
                row
            })
            .collect()
    }

    /// Append rows. Nothing is written if any row names an unknown column.
    pub fn append(&mut self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        let mut encoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = vec![String::new(); self.headers.len()];
            for (column, value) in row.cells() {
                cells[self.column(table, column)?] = value.to_owned();
            }
            encoded.push(cells);
        }
        self.rows.extend(encoded);
        Ok(())
    }

    /// Apply cell edits. Nothing is written if any edit is out of range.
    pub fn update(&mut self, table: Table, edits: Vec<CellEdit>) -> StoreResult<()> {
        let mut resolved = Vec::with_capacity(edits.len());
        for edit in edits {
            if edit.row.0 >= self.rows.len() {
                return Err(StoreError::RowOutOfRange {
                    table,
                    row: edit.row.0,
                });
            }
            resolved.push((edit.row.0, self.column(table, &edit.column)?, edit.value));
        }

        let width = self.headers.len();
        for (row, column, value) in resolved {
            let cells = &mut self.rows[row];
            if cells.len() < width {
                cells.resize(width, String::new());
            }
            cells[column] = value;
        }
        Ok(())
    }

    /// Delete rows, highest index first so the others stay valid.
    pub fn delete(&mut self, table: Table, mut rows: Vec<RowIndex>) -> StoreResult<()> {
        rows.sort_unstable();
        rows.dedup();
        if let Some(last) = rows.last()
            && last.0 >= self.rows.len()
        {
            return Err(StoreError::RowOutOfRange { table, row: last.0 });
        }
        for row in rows.into_iter().rev() {
            self.rows.remove(row.0);
        }
        Ok(())
    }
}

/// [`RemoteTableClient`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryTables {
    sheets: Mutex<HashMap<Table, SheetData>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `table` with a custom header order.
    #[must_use]
    pub fn with_table(self, table: Table, headers: &[&str]) -> Self {
        self.sheets.lock().insert(table, SheetData::new(headers));
        self
    }

    /// Append rows as a human editing the sheet would: no call is counted and
    /// the outage switch is ignored. Creates the table with canonical headers
    /// if needed.
    ///
    /// # Panics
    /// Panics if a row names a column the table does not have.
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        let mut sheets = self.sheets.lock();
        let sheet = sheets
            .entry(table)
            .or_insert_with(|| SheetData::new(table.headers()));
        if let Err(e) = sheet.append(table, rows) {
            panic!("seeding {table}: {e}");
        }
    }

    /// Edit one cell behind the engine's back.
    ///
    /// # Panics
    /// Panics if the table, row or column does not exist.
    pub fn edit(&self, table: Table, row: RowIndex, column: &str, value: &str) {
        let mut sheets = self.sheets.lock();
        let Some(sheet) = sheets.get_mut(&table) else {
            panic!("no table {table}");
        };
        if let Err(e) = sheet.update(table, vec![CellEdit::new(row, column, value)]) {
            panic!("editing {table}: {e}");
        }
    }

    /// Current rows without going through the client interface.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.sheets
            .lock()
            .get(&table)
            .map(SheetData::to_rows)
            .unwrap_or_default()
    }

    /// Header row of `table`, if it exists.
    #[must_use]
    pub fn headers(&self, table: Table) -> Option<Vec<String>> {
        self.sheets.lock().get(&table).map(|s| s.headers.clone())
    }

    /// Make every call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of client calls served or refused so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_owned()));
        }
        Ok(())
    }

    fn with_sheet<T>(
        &self,
        table: Table,
        f: impl FnOnce(&mut SheetData) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.begin()?;
        let mut sheets = self.sheets.lock();
        let sheet = sheets
            .get_mut(&table)
            .ok_or_else(|| StoreError::Unavailable(format!("worksheet {table} not found")))?;
        f(sheet)
    }
}

impl RemoteTableClient for MemoryTables {
    fn ensure_table(&self, table: Table, headers: &[&str]) -> StoreResult<()> {
        self.begin()?;
        self.sheets
            .lock()
            .entry(table)
            .or_insert_with(|| SheetData::new(headers));
        Ok(())
    }

    fn list_rows(&self, table: Table) -> StoreResult<Vec<Row>> {
        self.with_sheet(table, |sheet| Ok(sheet.to_rows()))
    }

    fn append_rows(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        self.with_sheet(table, |sheet| sheet.append(table, rows))
    }

    fn update_cells(&self, table: Table, edits: Vec<CellEdit>) -> StoreResult<()> {
        self.with_sheet(table, |sheet| sheet.update(table, edits))
    }

    fn delete_rows(&self, table: Table, rows: Vec<RowIndex>) -> StoreResult<()> {
        self.with_sheet(table, |sheet| sheet.delete(table, rows))
    }
}
