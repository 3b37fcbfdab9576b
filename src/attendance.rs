use serde::{Deserialize, Serialize};

/// Administrative bucket in upstream data; never a teachable subject.
pub const MAIN_SUBJECT: &str = "MAIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl From<String> for AttendanceStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => AttendanceStatus::Present,
            _ => AttendanceStatus::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default)]
    pub date: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    #[serde(alias = "subject")]
    pub subject_name: String,
    #[serde(default, alias = "attendance")]
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheet {
    #[serde(default, alias = "name")]
    pub student_name: Option<String>,
    #[serde(alias = "attendance_data")]
    pub subjects: Vec<SubjectAttendance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject_name: String,
    pub records: Vec<AttendanceRecord>,
    pub present_count: usize,
    pub total_count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub student_name: Option<String>,
    pub subjects: Vec<SubjectSummary>,
    pub overall_percentage: f64,
}

pub fn percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64 * 100.0
    }
}

pub fn present_count(records: &[AttendanceRecord]) -> usize {
    records
        .iter()
        .filter(|record| record.status == AttendanceStatus::Present)
        .count()
}

/// Overall percentage is weighted by record counts, not averaged per subject.
pub fn aggregate(sheet: &AttendanceSheet) -> AttendanceSummary {
    let subjects: Vec<SubjectSummary> = sheet
        .subjects
        .iter()
        .filter(|subject| subject.subject_name != MAIN_SUBJECT)
        .map(|subject| {
            let present = present_count(&subject.records);
            let total = subject.records.len();
            SubjectSummary {
                subject_name: subject.subject_name.clone(),
                records: subject.records.clone(),
                present_count: present,
                total_count: total,
                percentage: percentage(present, total),
            }
        })
        .collect();

    let (present, total) = subjects.iter().fold((0, 0), |(present, total), subject| {
        (present + subject.present_count, total + subject.total_count)
    });

    AttendanceSummary {
        student_name: sheet.student_name.clone(),
        subjects,
        overall_percentage: percentage(present, total),
    }
}
