use std::{collections::HashSet, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, TableError};

/// Widest roster a single classroom may hold.
pub const MAX_CLASSROOM_STRENGTH: i64 = 1_000;

/// One closed interval of the roll-number space owned by a classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomRange {
    pub code: String,
    pub first_roll: i64,
    pub last_roll: i64,
}

impl ClassroomRange {
    pub fn new(code: &str, first_roll: i64, last_roll: i64) -> Self {
        Self {
            code: code.to_string(),
            first_roll,
            last_roll,
        }
    }

    pub fn contains(&self, roll: i64) -> bool {
        (self.first_roll..=self.last_roll).contains(&roll)
    }

    pub fn strength(&self) -> usize {
        (self.last_roll - self.first_roll + 1) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomAssignment {
    pub classroom_code: String,
    pub cohort_start_roll: i64,
}

#[derive(Debug, Clone)]
pub struct ClassroomTable {
    ranges: Vec<ClassroomRange>,
}

impl Default for ClassroomTable {
    fn default() -> Self {
        Self {
            ranges: vec![
                ClassroomRange::new("CSA", 1, 74),
                ClassroomRange::new("CSB", 75, 148),
                ClassroomRange::new("CSC", 149, 223),
            ],
        }
    }
}

impl ClassroomTable {
    pub fn new(ranges: Vec<ClassroomRange>) -> Result<Self, TableError> {
        let first = ranges.first().ok_or(TableError::Empty)?;
        let mut expected = first.first_roll;
        let mut codes = HashSet::new();

        for range in ranges.iter() {
            if range.first_roll < 1
                || range.first_roll > range.last_roll
                || range.last_roll - range.first_roll >= MAX_CLASSROOM_STRENGTH
            {
                return Err(TableError::BadRange {
                    code: range.code.clone(),
                    first: range.first_roll,
                    last: range.last_roll,
                });
            }
            if range.first_roll != expected {
                return Err(TableError::NotContiguous {
                    code: range.code.clone(),
                    first: range.first_roll,
                    expected,
                });
            }
            if range.code.trim().is_empty() || !codes.insert(range.code.clone()) {
                return Err(TableError::BadCode(range.code.clone()));
            }
            expected = range
                .last_roll
                .checked_add(1)
                .ok_or_else(|| TableError::BadRange {
                    code: range.code.clone(),
                    first: range.first_roll,
                    last: range.last_roll,
                })?;
        }

        Ok(Self { ranges })
    }

    /// Loads a table from a CSV with `code,first_roll,last_roll` columns.
    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open classroom table {}", path.display()))?;
        let mut ranges = Vec::new();

        for result in reader.deserialize::<ClassroomRange>() {
            let mut range = result?;
            range.code = range.code.trim().to_string();
            ranges.push(range);
        }

        Ok(Self::new(ranges)?)
    }

    pub fn find(&self, code: &str) -> Option<&ClassroomRange> {
        self.ranges
            .iter()
            .find(|range| range.code.eq_ignore_ascii_case(code.trim()))
    }

    pub fn resolve(&self, roll: i64) -> Result<ClassroomAssignment, AttendanceError> {
        self.ranges
            .iter()
            .find(|range| range.contains(roll))
            .map(|range| ClassroomAssignment {
                classroom_code: range.code.clone(),
                cohort_start_roll: range.first_roll,
            })
            .ok_or_else(|| AttendanceError::invalid_roll(roll))
    }

    pub fn resolve_str(&self, input: &str) -> Result<ClassroomAssignment, AttendanceError> {
        let roll = parse_roll(input).ok_or_else(|| AttendanceError::invalid_roll(input))?;
        self.resolve(roll)
    }
}

/// Accepts `"42"` and `"42.0"`; rejects blanks, fractions and non-numbers.
pub fn parse_roll(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(roll) = trimmed.parse::<i64>() {
        return Some(roll);
    }

    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}
