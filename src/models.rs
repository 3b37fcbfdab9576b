use chrono::NaiveDate;
use uuid::Uuid;

use crate::attendance::AttendanceStatus;

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub roll_number: i64,
    pub full_name: String,
    pub email: String,
    pub college_id: String,
    pub classroom_code: String,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub roll_number: Option<i64>,
    pub college_id: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone)]
pub struct ImportRow {
    pub roll_number: i64,
    pub full_name: String,
    pub email: String,
    pub college_id: String,
    pub classroom_code: String,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub classroom_code: String,
    pub subject: String,
    pub session_date: NaiveDate,
    pub present_count: i64,
    pub strength: i64,
}

#[derive(Debug, Clone)]
pub struct MarkRow {
    pub session_date: NaiveDate,
    pub roll_number: i64,
    pub status: AttendanceStatus,
}
