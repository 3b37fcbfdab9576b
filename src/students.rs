use std::io::Read;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::{
    classroom::{parse_roll, ClassroomTable},
    error::VerificationError,
    models::{ImportRow, StudentRecord, UserRecord},
};

pub const STUDENT_ROLE: &str = "Student";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "RollNo")]
    roll_no: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "CollegeId", default)]
    college_id: Option<String>,
}

/// Reads a roster export with `RollNo,Name,Email[,CollegeId]` columns. The
/// whole import is rejected on the first bad row.
pub fn read_roster<R: Read>(reader: R, table: &ClassroomTable) -> anyhow::Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: unreadable"))?;

        let roll_input = row.roll_no.trim();
        let full_name = row.name.trim().to_string();
        let email = row.email.trim().to_lowercase();
        if roll_input.is_empty() || full_name.is_empty() || email.is_empty() {
            bail!("row {line}: RollNo, Name, and Email are required fields");
        }

        let assignment = table
            .resolve_str(roll_input)
            .with_context(|| format!("row {line}"))?;
        let roll_number = parse_roll(roll_input)
            .with_context(|| format!("row {line}: invalid roll number {roll_input:?}"))?;

        rows.push(ImportRow {
            roll_number,
            full_name,
            email,
            college_id: row
                .college_id
                .map(|id| id.trim().to_string())
                .unwrap_or_default(),
            classroom_code: assignment.classroom_code,
        });
    }

    if rows.is_empty() {
        bail!("roster contains no student rows");
    }

    Ok(rows)
}

/// Picks the student record that proves `user` owns `roll`.
pub fn match_student<'a>(
    user: Option<&UserRecord>,
    students: &'a [StudentRecord],
    roll: &str,
) -> Result<&'a StudentRecord, VerificationError> {
    let user = user.ok_or(VerificationError::UserNotFound)?;
    if students.is_empty() {
        return Err(VerificationError::NoStudentRecord);
    }

    let roll = parse_roll(roll).ok_or(VerificationError::RollMismatch)?;
    students
        .iter()
        .find(|student| student.roll_number == roll && student.email == user.email)
        .ok_or(VerificationError::RollMismatch)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn user(email: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "sneha".to_string(),
            email: email.to_string(),
            role: "App-user".to_string(),
            roll_number: None,
            college_id: String::new(),
            is_verified: false,
        }
    }

    fn student(roll: i64, email: &str) -> StudentRecord {
        StudentRecord {
            roll_number: roll,
            full_name: "Sneha Patil".to_string(),
            email: email.to_string(),
            college_id: "VU4F2122031".to_string(),
            classroom_code: "CSA".to_string(),
        }
    }

    #[test]
    fn reads_and_normalizes_roster() {
        let csv = "RollNo,Name,Email,CollegeId\n\
                   12, Sneha Patil ,Sneha.Patil@Campus.edu,VU4F2122031\n\
                   150.0,Aditya Rao,aditya@campus.edu,\n";
        let rows = read_roster(csv.as_bytes(), &ClassroomTable::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].roll_number, 12);
        assert_eq!(rows[0].full_name, "Sneha Patil");
        assert_eq!(rows[0].email, "sneha.patil@campus.edu");
        assert_eq!(rows[0].classroom_code, "CSA");
        assert_eq!(rows[1].roll_number, 150);
        assert_eq!(rows[1].classroom_code, "CSC");
        assert_eq!(rows[1].college_id, "");
    }

    #[test]
    fn college_id_column_is_optional() {
        let csv = "RollNo,Name,Email\n80,Aditya Rao,aditya@campus.edu\n";
        let rows = read_roster(csv.as_bytes(), &ClassroomTable::default()).unwrap();
        assert_eq!(rows[0].classroom_code, "CSB");
    }

    #[test]
    fn rejects_bad_rows() {
        let table = ClassroomTable::default();
        let blank = "RollNo,Name,Email\n12,,a@campus.edu\n";
        let err = read_roster(blank.as_bytes(), &table).unwrap_err();
        assert!(err.to_string().contains("row 2"));

        let out_of_range = "RollNo,Name,Email\n12,A,a@campus.edu\n400,B,b@campus.edu\n";
        let err = read_roster(out_of_range.as_bytes(), &table).unwrap_err();
        assert!(err.to_string().contains("row 3"));

        let missing_column = "RollNo,Name\n12,A\n";
        assert!(read_roster(missing_column.as_bytes(), &table).is_err());

        let empty = "RollNo,Name,Email\n";
        assert!(read_roster(empty.as_bytes(), &table).is_err());
    }

    #[test]
    fn matches_on_email_and_roll() {
        let user = user("sneha@campus.edu");
        let students = vec![student(12, "sneha@campus.edu")];

        let found = match_student(Some(&user), &students, "12").unwrap();
        assert_eq!(found.roll_number, 12);
        assert_eq!(
            match_student(Some(&user), &students, "13").unwrap_err(),
            VerificationError::RollMismatch
        );
        assert_eq!(
            match_student(Some(&user), &students, "twelve").unwrap_err(),
            VerificationError::RollMismatch
        );
        assert_eq!(
            match_student(Some(&user), &[], "12").unwrap_err(),
            VerificationError::NoStudentRecord
        );
        assert_eq!(
            match_student(None, &students, "12").unwrap_err(),
            VerificationError::UserNotFound
        );
    }
}
