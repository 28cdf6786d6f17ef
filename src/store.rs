use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::loader;
use crate::saving;
use crate::table::{Row, Table};

pub const SERIAL_COLUMN: &str = "Serial Number";
pub const DATE_COLUMN: &str = "DATE";

const IDENTITY_COLUMNS: &[&str] = &["Name", "Username", "Email", "Phone Number"];

const COLORING_COLUMNS: &[&str] = &[
    "Serial Number",
    "DATE",
    "SHIFT",
    "JOB NO",
    "Part Number",
    "Grade",
    "Before QTY",
    "C57c",
    "C88",
    "C87a",
    "C87b",
    "Operator Name",
    "OK QTY",
    "NG Total (Auto)",
    "Day of week",
    "Unknown",
    "Line",
];

const QA_COLUMNS: &[&str] = &[
    "Serial Number",
    "DATE",
    "SHIFT",
    "JOB NO",
    "Part Name",
    "Supplier",
    "Location",
    "Machine No",
    "Program No",
    "OK QTY",
    "NG QTY",
    "Rework QTY",
    "Rejection Reason",
    "Operator Name",
];

const WASHING_COLUMNS: &[&str] = &[
    "Serial Number",
    "DATE",
    "SHIFT",
    "Part Name",
    "Washing Machine",
    "Wash Time",
    "Operator Name",
    "Wash QTY",
];

/// The four spreadsheet files the application owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreId {
    Identity,
    Coloring,
    Qa,
    Washing,
}

impl StoreId {
    /// The three production-record stores, in menu order
    pub const PRODUCTION: [StoreId; 3] = [StoreId::Coloring, StoreId::Qa, StoreId::Washing];

    pub fn file_name(self) -> &'static str {
        match self {
            StoreId::Identity => "user_data.xlsx",
            StoreId::Coloring => "Detect Record(Coloring).xlsx",
            StoreId::Qa => "Defect Record (QA).xlsx",
            StoreId::Washing => "History Record(Washing).xlsx",
        }
    }

    /// Column set a freshly created store starts with
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            StoreId::Identity => IDENTITY_COLUMNS,
            StoreId::Coloring => COLORING_COLUMNS,
            StoreId::Qa => QA_COLUMNS,
            StoreId::Washing => WASHING_COLUMNS,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StoreId::Identity => "User Data",
            StoreId::Coloring => "Detect Record (Coloring)",
            StoreId::Qa => "Defect Record (QA)",
            StoreId::Washing => "History Record (Washing)",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "identity" | "users" => Some(StoreId::Identity),
            "coloring" => Some(StoreId::Coloring),
            "qa" => Some(StoreId::Qa),
            "washing" => Some(StoreId::Washing),
            _ => None,
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Directory holding the spreadsheet files
///
/// Every operation goes through the whole file: loads read the full sheet and
/// appends rewrite it. Writers in other processes are not coordinated with.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RecordStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: StoreId) -> PathBuf {
        self.root.join(id.file_name())
    }

    pub fn exists(&self, id: StoreId) -> bool {
        self.path(id).is_file()
    }

    /// Read an entire store
    ///
    /// # Errors
    /// * `Error::NotFound` if the file has never been written
    /// * `Error::SheetRead` if the file exists but is not a readable workbook
    pub fn load_all(&self, id: StoreId) -> Result<Table> {
        let path = self.path(id);
        if !path.is_file() {
            return Err(Error::NotFound(id));
        }
        loader::from_excel(&path)
    }

    /// Append one record and rewrite the store
    ///
    /// A missing store starts as an empty table with the canonical columns.
    pub fn append(&self, id: StoreId, row: Row) -> Result<()> {
        let mut table = match self.load_all(id) {
            Ok(table) => table,
            Err(Error::NotFound(_)) => Table::with_columns(id.columns()),
            Err(e) => return Err(e),
        };

        table.push_row(row);
        saving::to_excel(&table, self.path(id))?;

        info!("appended row {} to {}", table.len(), id.file_name());
        Ok(())
    }
}
