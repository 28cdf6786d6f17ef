use chrono::NaiveDate;
use log::debug;

use crate::error::{Error, Result};
use crate::store::{DATE_COLUMN, RecordStore, StoreId};
use crate::table::Table;

/// Rows of a store recorded on `date`
///
/// DATE cells are reduced to a calendar date before comparing, so a
/// timestamp anywhere on that day matches. Cells that are not dates never
/// match. The result keeps the store's header and row order; no matches is an
/// empty table, not an error.
///
/// # Errors
/// * `Error::NotFound` if the store has never been written
/// * `Error::Schema` if the store has no `DATE` column
pub fn filter_by_date(store: &RecordStore, id: StoreId, date: NaiveDate) -> Result<Table> {
    let table = store.load_all(id)?;
    let idx = table.column_index(DATE_COLUMN).ok_or(Error::Schema {
        store: id,
        column: DATE_COLUMN,
    })?;

    let total = table.len();
    let rows: Vec<_> = table
        .rows
        .into_iter()
        .filter(|row| row.get(idx).and_then(|v| v.as_date()) == Some(date))
        .collect();

    debug!(
        "{}: {} of {total} rows dated {date}",
        id.file_name(),
        rows.len()
    );
    Ok(Table {
        columns: table.columns,
        rows,
    })
}
