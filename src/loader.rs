use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::NaiveTime;
use std::path::Path;

use crate::error::Result;
use crate::table::{Table, Value};

/// Load the first worksheet of an `.xlsx` file into a [`Table`]
///
/// The first row is taken as the header. Header cells that are blank get a
/// positional `Unnamed: N` name so every column stays addressable.
///
/// # Arguments
/// * `filepath` - Path to the workbook
///
/// # Returns
/// * `Result<Table>` - The header and data rows, or an error if the file cannot be parsed
///
/// # Examples
/// ```no_run
/// use shopfloor::loader::from_excel;
///
/// match from_excel("user_data.xlsx") {
///     Ok(table) => println!("{} registered users", table.len()),
///     Err(e) => eprintln!("Error loading workbook: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook(filepath)?;

    // A workbook without sheets reads as an empty, header-less table
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Table::default()),
    };

    let mut rows = range.rows();
    let columns = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(c, cell)| match cell {
                Data::Empty => format!("Unnamed: {}", c),
                other => other.to_string(),
            })
            .collect(),
        None => Vec::new(),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(Table { columns, rows })
}

// Convert a calamine cell into our value model
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Empty,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => Value::Text(s.clone()),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) if dt.time() == NaiveTime::MIN => Value::Date(dt.date()),
            Some(dt) => Value::DateTime(dt),
            None => Value::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saving::to_excel;
    use chrono::NaiveDate;

    #[test]
    fn reads_back_what_saving_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let mut table = Table::with_columns(&["Serial Number", "DATE", "SHIFT"]);
        table.push_row(vec![
            ("Serial Number".into(), Value::from(1u32)),
            ("DATE".into(), Value::Date(day)),
            ("SHIFT".into(), Value::from("A")),
        ]);
        to_excel(&table, &path).unwrap();

        let loaded = from_excel(&path).unwrap();
        assert_eq!(loaded.columns, table.columns);
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.rows[0][0].as_integer(), Some(1));
        assert_eq!(loaded.rows[0][1].as_date(), Some(day));
        assert_eq!(loaded.rows[0][2], Value::from("A"));
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");

        to_excel(&Table::with_columns(&["Name", "Email"]), &path).unwrap();

        let loaded = from_excel(&path).unwrap();
        assert_eq!(loaded.columns, vec!["Name", "Email"]);
        assert!(loaded.is_empty());
    }
}
