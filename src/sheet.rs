use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    attendance::{percentage, AttendanceStatus},
    classroom::ClassroomRange,
    error::AttendanceError,
    models::MarkRow,
};

/// Attendance captured for one classroom, subject and day. Every roll
/// starts absent.
#[derive(Debug, Clone)]
pub struct ClassSheet {
    pub classroom_code: String,
    pub subject: String,
    pub session_date: NaiveDate,
    start_roll: i64,
    marks: Vec<AttendanceStatus>,
}

impl ClassSheet {
    pub fn new(range: &ClassroomRange, subject: &str, session_date: NaiveDate) -> Self {
        Self {
            classroom_code: range.code.clone(),
            subject: subject.trim().to_string(),
            session_date,
            start_roll: range.first_roll,
            marks: vec![AttendanceStatus::Absent; range.strength()],
        }
    }

    fn index(&self, roll: i64) -> Result<usize, AttendanceError> {
        let offset = roll - self.start_roll;
        if offset < 0 || offset as usize >= self.marks.len() {
            return Err(AttendanceError::invalid_roll(roll));
        }
        Ok(offset as usize)
    }

    pub fn mark_present(&mut self, roll: i64) -> Result<(), AttendanceError> {
        let index = self.index(roll)?;
        self.marks[index] = AttendanceStatus::Present;
        Ok(())
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) {
        self.marks.iter_mut().for_each(|mark| *mark = status);
    }

    pub fn present_count(&self) -> usize {
        self.marks
            .iter()
            .filter(|mark| **mark == AttendanceStatus::Present)
            .count()
    }

    pub fn start_roll(&self) -> i64 {
        self.start_roll
    }

    pub fn strength(&self) -> usize {
        self.marks.len()
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.present_count(), self.marks.len())
    }

    /// `(roll, status)` pairs in roll order.
    pub fn marks(&self) -> impl Iterator<Item = (i64, AttendanceStatus)> + '_ {
        self.marks
            .iter()
            .enumerate()
            .map(|(offset, status)| (self.start_roll + offset as i64, *status))
    }
}

/// One stored capture read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistory {
    pub session_date: NaiveDate,
    pub present: Vec<i64>,
    pub absent: Vec<i64>,
}

impl SessionHistory {
    pub fn strength(&self) -> usize {
        self.present.len() + self.absent.len()
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.present.len(), self.strength())
    }
}

/// Groups stored marks into one entry per date, dates ascending and rolls
/// ascending within each list.
pub fn group_sessions(rows: &[MarkRow]) -> Vec<SessionHistory> {
    let mut by_date: BTreeMap<NaiveDate, SessionHistory> = BTreeMap::new();

    for row in rows {
        let entry = by_date
            .entry(row.session_date)
            .or_insert_with(|| SessionHistory {
                session_date: row.session_date,
                present: Vec::new(),
                absent: Vec::new(),
            });
        match row.status {
            AttendanceStatus::Present => entry.present.push(row.roll_number),
            AttendanceStatus::Absent => entry.absent.push(row.roll_number),
        }
    }

    let mut sessions: Vec<SessionHistory> = by_date.into_values().collect();
    for session in sessions.iter_mut() {
        session.present.sort_unstable();
        session.absent.sort_unstable();
    }
    sessions
}
