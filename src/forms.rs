use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sequence::next_serial;
use crate::store::{DATE_COLUMN, RecordStore, SERIAL_COLUMN, StoreId};
use crate::table::{Row, Value};

pub const SHIFT_OPTIONS: &[&str] = &["A", "B", "C"];
pub const GRADE_OPTIONS: &[&str] = &["A", "B", "C", "D"];
pub const OPERATOR_NAME_OPTIONS: &[&str] = &["R.Dinesh", "Shrinnivisan", "Rambabu"];
pub const PART_NUMBER_OPTIONS: &[&str] = &["12345-74L10", "23456-85M20", "34567-96N30"];
pub const DAY_OF_WEEK_OPTIONS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Dropdown choices offered by the forms
#[derive(Debug, Clone, Serialize)]
pub struct Options {
    pub shift: &'static [&'static str],
    pub grade: &'static [&'static str],
    pub operator_name: &'static [&'static str],
    pub part_number: &'static [&'static str],
    pub day_of_week: &'static [&'static str],
}

pub fn options() -> Options {
    Options {
        shift: SHIFT_OPTIONS,
        grade: GRADE_OPTIONS,
        operator_name: OPERATOR_NAME_OPTIONS,
        part_number: PART_NUMBER_OPTIONS,
        day_of_week: DAY_OF_WEEK_OPTIONS,
    }
}

fn check_choice(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{field} must be one of {}",
            allowed.join(", ")
        )))
    }
}

fn day_label(day: Weekday) -> &'static str {
    DAY_OF_WEEK_OPTIONS[day.num_days_from_monday() as usize]
}

fn field(name: &str, value: impl Into<Value>) -> (String, Value) {
    (name.to_string(), value.into())
}

/// A production form that lands in one record store
///
/// Implementors supply their own columns; [`submit`] adds the serial number
/// and date in front.
pub trait ProductionForm {
    const STORE: StoreId;

    /// Reject selections outside the option lists
    fn validate(&self) -> Result<()>;

    /// Form-specific fields, in column order
    fn into_fields(self, submitted_at: NaiveDateTime) -> Row;
}

/// Detect Record (Coloring)
#[derive(Debug, Clone, Deserialize)]
pub struct ColoringForm {
    pub shift: String,
    #[serde(default)]
    pub job_no: String,
    pub part_number: String,
    pub grade: String,
    pub before_qty: u32,
    pub c57c: u32,
    pub c88: u32,
    pub c87a: u32,
    pub c87b: u32,
    pub operator_name: String,
    pub ok_qty: u32,
    /// Defaults to the sum of the four defect counts
    #[serde(default)]
    pub ng_total: Option<u32>,
    /// Defaults to the weekday of submission
    #[serde(default)]
    pub day_of_week: Option<String>,
    #[serde(default)]
    pub unknown: String,
    #[serde(default)]
    pub line: String,
}

impl ProductionForm for ColoringForm {
    const STORE: StoreId = StoreId::Coloring;

    fn validate(&self) -> Result<()> {
        check_choice("SHIFT", &self.shift, SHIFT_OPTIONS)?;
        check_choice("Part Number", &self.part_number, PART_NUMBER_OPTIONS)?;
        check_choice("Grade", &self.grade, GRADE_OPTIONS)?;
        check_choice("Operator Name", &self.operator_name, OPERATOR_NAME_OPTIONS)?;
        if let Some(day) = &self.day_of_week {
            check_choice("Day of week", day, DAY_OF_WEEK_OPTIONS)?;
        }
        Ok(())
    }

    fn into_fields(self, submitted_at: NaiveDateTime) -> Row {
        // Four u32 counts always fit in a u64
        let ng_total = self.ng_total.map(u64::from).unwrap_or_else(|| {
            [self.c57c, self.c88, self.c87a, self.c87b]
                .into_iter()
                .map(u64::from)
                .sum()
        });
        let day_of_week = self
            .day_of_week
            .unwrap_or_else(|| day_label(submitted_at.weekday()).to_string());

        vec![
            field("SHIFT", self.shift),
            field("JOB NO", self.job_no),
            field("Part Number", self.part_number),
            field("Grade", self.grade),
            field("Before QTY", self.before_qty),
            field("C57c", self.c57c),
            field("C88", self.c88),
            field("C87a", self.c87a),
            field("C87b", self.c87b),
            field("Operator Name", self.operator_name),
            field("OK QTY", self.ok_qty),
            field("NG Total (Auto)", ng_total),
            field("Day of week", day_of_week),
            field("Unknown", self.unknown),
            field("Line", self.line),
        ]
    }
}

/// Defect Record (QA)
#[derive(Debug, Clone, Deserialize)]
pub struct QaForm {
    pub shift: String,
    #[serde(default)]
    pub job_no: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub machine_no: String,
    #[serde(default)]
    pub program_no: String,
    pub ok_qty: u32,
    pub ng_qty: u32,
    pub rework_qty: u32,
    #[serde(default)]
    pub rejection_reason: String,
    pub operator_name: String,
}

impl ProductionForm for QaForm {
    const STORE: StoreId = StoreId::Qa;

    fn validate(&self) -> Result<()> {
        check_choice("SHIFT", &self.shift, SHIFT_OPTIONS)?;
        check_choice("Operator Name", &self.operator_name, OPERATOR_NAME_OPTIONS)
    }

    fn into_fields(self, _submitted_at: NaiveDateTime) -> Row {
        vec![
            field("SHIFT", self.shift),
            field("JOB NO", self.job_no),
            field("Part Name", self.part_name),
            field("Supplier", self.supplier),
            field("Location", self.location),
            field("Machine No", self.machine_no),
            field("Program No", self.program_no),
            field("OK QTY", self.ok_qty),
            field("NG QTY", self.ng_qty),
            field("Rework QTY", self.rework_qty),
            field("Rejection Reason", self.rejection_reason),
            field("Operator Name", self.operator_name),
        ]
    }
}

/// History Record (Washing)
#[derive(Debug, Clone, Deserialize)]
pub struct WashingForm {
    pub shift: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub washing_machine: String,
    /// Defaults to the time of submission
    #[serde(default)]
    pub wash_time: Option<NaiveTime>,
    pub operator_name: String,
    pub wash_qty: u32,
}

impl ProductionForm for WashingForm {
    const STORE: StoreId = StoreId::Washing;

    fn validate(&self) -> Result<()> {
        check_choice("SHIFT", &self.shift, SHIFT_OPTIONS)?;
        check_choice("Operator Name", &self.operator_name, OPERATOR_NAME_OPTIONS)
    }

    fn into_fields(self, submitted_at: NaiveDateTime) -> Row {
        let wash_time = self.wash_time.unwrap_or(submitted_at.time());

        vec![
            field("SHIFT", self.shift),
            field("Part Name", self.part_name),
            field("Washing Machine", self.washing_machine),
            field("Wash Time", wash_time.format("%H:%M:%S").to_string()),
            field("Operator Name", self.operator_name),
            field("Wash QTY", self.wash_qty),
        ]
    }
}

/// Result of a successful form submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub store: StoreId,
    pub serial: u64,
}

/// Validate a form, number it and append it to its store
///
/// The record is dated with `submitted_at`'s calendar date.
pub fn submit<F: ProductionForm>(
    store: &RecordStore,
    form: F,
    submitted_at: NaiveDateTime,
) -> Result<Submission> {
    form.validate()?;

    let serial = next_serial(store, F::STORE);
    let mut row = vec![
        field(SERIAL_COLUMN, serial),
        field(DATE_COLUMN, submitted_at.date()),
    ];
    row.extend(form.into_fields(submitted_at));
    store.append(F::STORE, row)?;

    info!("Data for {} has been saved, serial {serial}", F::STORE);
    Ok(Submission {
        store: F::STORE,
        serial,
    })
}
