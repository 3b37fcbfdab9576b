use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttendanceError {
    #[error("Invalid roll number: {0:?}")]
    InvalidRollNumber(String),

    #[error("Attendance source failed: {0}")]
    UpstreamFetchFailure(String),
}

impl AttendanceError {
    pub fn invalid_roll(input: impl ToString) -> Self {
        AttendanceError::InvalidRollNumber(input.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Classroom table has no ranges")]
    Empty,

    #[error("Classroom {code} has an invalid range {first}-{last}")]
    BadRange { code: String, first: i64, last: i64 },

    #[error("Classroom {code} starts at {first}, expected {expected}")]
    NotContiguous {
        code: String,
        first: i64,
        expected: i64,
    },

    #[error("Classroom code {0:?} is blank or duplicated")]
    BadCode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("User not found")]
    UserNotFound,

    #[error("No student record found")]
    NoStudentRecord,

    #[error("Invalid roll number")]
    RollMismatch,
}
