use log::warn;

use crate::error::Error;
use crate::store::{RecordStore, SERIAL_COLUMN, StoreId};

/// Next serial number for a store: the largest existing serial plus one
///
/// Falls back to 1 whenever no trustworthy maximum exists: the file is missing
/// or unreadable, the `Serial Number` column is absent, a serial cell is not an
/// integer, or the store has no rows yet. Gaps are never refilled.
pub fn next_serial(store: &RecordStore, id: StoreId) -> u64 {
    let table = match store.load_all(id) {
        Ok(table) => table,
        Err(Error::NotFound(_)) => return 1,
        Err(e) => {
            warn!("{}: {e}; numbering restarts at 1", id.file_name());
            return 1;
        }
    };

    let Some(column) = table.column(SERIAL_COLUMN) else {
        warn!("{} has no {SERIAL_COLUMN} column; numbering restarts at 1", id.file_name());
        return 1;
    };

    let mut max: Option<i64> = None;
    for value in column {
        if value.is_empty() {
            continue;
        }
        match value.as_integer() {
            Some(n) => max = Some(max.map_or(n, |m| m.max(n))),
            None => {
                warn!(
                    "{} has a malformed serial {value:?}; numbering restarts at 1",
                    id.file_name()
                );
                return 1;
            }
        }
    }

    match max {
        Some(n) if n >= 1 => n as u64 + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saving::to_excel;
    use crate::table::{Table, Value};

    fn store_with_serials(serials: &[Value]) -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let mut table = Table::with_columns(StoreId::Qa.columns());
        for serial in serials {
            table.push_row(vec![(SERIAL_COLUMN.into(), serial.clone())]);
        }
        to_excel(&table, store.path(StoreId::Qa)).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_store_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_serial(&RecordStore::new(dir.path()), StoreId::Qa), 1);
    }

    #[test]
    fn empty_store_starts_at_one() {
        let (_dir, store) = store_with_serials(&[]);
        assert_eq!(next_serial(&store, StoreId::Qa), 1);
    }

    #[test]
    fn continues_after_the_maximum() {
        let serials = [Value::Number(3.0), Value::Number(7.0), Value::Number(5.0)];
        let (_dir, store) = store_with_serials(&serials);
        assert_eq!(next_serial(&store, StoreId::Qa), 8);
    }

    #[test]
    fn malformed_serial_restarts_numbering() {
        let serials = [Value::Number(3.0), Value::from("three")];
        let (_dir, store) = store_with_serials(&serials);
        assert_eq!(next_serial(&store, StoreId::Qa), 1);
    }

    #[test]
    fn missing_serial_column_restarts_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let mut table = Table::with_columns(&["DATE", "SHIFT"]);
        table.push_row(vec![("SHIFT".into(), "A".into())]);
        to_excel(&table, store.path(StoreId::Coloring)).unwrap();

        assert_eq!(next_serial(&store, StoreId::Coloring), 1);
    }

    #[test]
    fn corrupt_file_restarts_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        std::fs::write(store.path(StoreId::Washing), b"not a workbook").unwrap();

        assert_eq!(next_serial(&store, StoreId::Washing), 1);
    }
}
