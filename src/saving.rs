use chrono::{Datelike, NaiveDate, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::table::{Table, Value};

/// Serialize a table into an in-memory `.xlsx` workbook
///
/// The header goes in row 0; dates are written as real Excel dates so other
/// spreadsheet tools (and the date filter) see them as dates, not text.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (c, name) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, name)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Empty => {}
                Value::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Value::Date(d) => {
                    worksheet.write_datetime_with_format(r, c, &excel_date(d)?, &date_format)?;
                }
                Value::DateTime(dt) => {
                    let stamp = excel_date(&dt.date())?.and_hms(
                        dt.hour() as u16,
                        dt.minute() as u8,
                        dt.second(),
                    )?;
                    worksheet.write_datetime_with_format(r, c, &stamp, &datetime_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn excel_date(d: &NaiveDate) -> Result<ExcelDateTime> {
    Ok(ExcelDateTime::from_ymd(
        d.year() as u16,
        d.month() as u8,
        d.day() as u8,
    )?)
}

/// Replace the workbook at `filename` with the contents of `table`
///
/// The new workbook is written to a temporary file next to the target and
/// renamed over it, so a failed write leaves the previous file intact.
pub fn to_excel(table: &Table, filename: impl AsRef<Path>) -> Result<()> {
    let path = filename.as_ref();
    let buffer = to_xlsx(table)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&buffer)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
