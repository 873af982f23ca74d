//! Summary reports printed by the gateway while summary reporting (`PS=1`) is enabled.
//!
//! Each report is a single comma-separated line with a fixed sequence of fields.

use crate::frame::Malformed;
use alloc::{string::String, vec::Vec};

/// Names of the summary report fields, in the order they are reported.
pub static FIELDS: [&str; 25] = [
    "Status",
    "Control setpoint",
    "Remote parameter flags",
    "Maximum relative modulation level",
    "Boiler capacity and modulation limits",
    "Room setpoint",
    "Relative modulation level",
    "CH water pressure",
    "Room temperature",
    "Boiler water temperature",
    "DHW temperature",
    "Outside temperature",
    "Return water temperature",
    "DHW setpoint boundaries",
    "Max CH setpoint boundaries",
    "DHW setpoint",
    "Max CH water setpoint",
    "Burner starts",
    "CH pump starts",
    "DHW pump/valve starts",
    "DHW burner starts",
    "Burner operation hours",
    "CH pump operation hours",
    "DHW pump/valve operation hours",
    "DHW burner operation hours",
];

/// A single summary report.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct SummaryRecord {
    values: Vec<String>,
}

impl SummaryRecord {
    /// Parses a summary line, which must contain exactly one value per field.
    pub fn parse(line: &str) -> Result<Self, Malformed> {
        let values: Vec<String> = line.split(',').map(String::from).collect();

        if values.len() == FIELDS.len() {
            Ok(Self { values })
        } else {
            Err(Malformed::FieldCount(values.len()))
        }
    }

    /// Returns the value of the field with the specified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        FIELDS
            .iter()
            .position(|&field| field == name)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Returns an iterator over field names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        FIELDS
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// Returns the raw field values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }
}
