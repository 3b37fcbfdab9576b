use anyhow::Context;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    attendance::AttendanceStatus,
    models::{ImportRow, MarkRow, SessionSummary, StudentRecord, UserRecord},
    sheet::ClassSheet,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ImportRow {
            roll_number: 12,
            full_name: "Sneha Patil".to_string(),
            email: "sneha.patil@campus.edu".to_string(),
            college_id: "VU4F2122012".to_string(),
            classroom_code: "CSA".to_string(),
        },
        ImportRow {
            roll_number: 87,
            full_name: "Aditya Rao".to_string(),
            email: "aditya.rao@campus.edu".to_string(),
            college_id: "VU4F2122087".to_string(),
            classroom_code: "CSB".to_string(),
        },
        ImportRow {
            roll_number: 161,
            full_name: "Omkar Deshpande".to_string(),
            email: "omkar.deshpande@campus.edu".to_string(),
            college_id: "VU4F2122161".to_string(),
            classroom_code: "CSC".to_string(),
        },
    ];
    upsert_students(pool, &students).await?;

    let users = vec![
        (
            Uuid::parse_str("6f42be1a-b613-47f8-89b5-c377c5e296e5")?,
            "sneha",
            "sneha.patil@campus.edu",
        ),
        (
            Uuid::parse_str("dc8cf18e-8fef-446c-aed8-bf71ec5b7e78")?,
            "aditya",
            "aditya.rao@campus.edu",
        ),
        (
            Uuid::parse_str("2703c43d-70e1-49dc-9e5c-fe706a2c5772")?,
            "omkar",
            "omkar.deshpande@campus.edu",
        ),
    ];

    for (id, username, email) in users {
        sqlx::query(
            r#"
            INSERT INTO campus_attendance.users (id, username, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Inserts or refreshes students keyed on roll number. Returns rows touched.
pub async fn upsert_students(pool: &PgPool, rows: &[ImportRow]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut touched = 0usize;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO campus_attendance.students
            (id, roll_number, full_name, email, college_id, classroom_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (roll_number) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                college_id = EXCLUDED.college_id,
                classroom_code = EXCLUDED.classroom_code
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.roll_number)
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(&row.college_id)
        .bind(&row.classroom_code)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "could not import roll {} ({}); duplicate email?",
                row.roll_number, row.email
            )
        })?;

        touched += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(touched)
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: row.get("role"),
        roll_number: row.get("roll_number"),
        college_id: row.get("college_id"),
        is_verified: row.get("is_verified"),
    }
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<UserRecord>> {
    let row = sqlx::query(
        "SELECT id, username, email, role, roll_number, college_id, is_verified \
         FROM campus_attendance.users WHERE email = $1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn students_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        "SELECT roll_number, full_name, email, college_id, classroom_code \
         FROM campus_attendance.students WHERE email = $1 ORDER BY roll_number",
    )
    .bind(email.trim().to_lowercase())
    .fetch_all(pool)
    .await?;

    let mut students = Vec::new();
    for row in rows {
        students.push(StudentRecord {
            roll_number: row.get("roll_number"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            college_id: row.get("college_id"),
            classroom_code: row.get("classroom_code"),
        });
    }

    Ok(students)
}

pub async fn mark_user_verified(
    pool: &PgPool,
    user_id: Uuid,
    student: &StudentRecord,
    role: &str,
) -> anyhow::Result<UserRecord> {
    let row = sqlx::query(
        r#"
        UPDATE campus_attendance.users
        SET role = $2, roll_number = $3, college_id = $4, is_verified = true
        WHERE id = $1
        RETURNING id, username, email, role, roll_number, college_id, is_verified
        "#,
    )
    .bind(user_id)
    .bind(role)
    .bind(student.roll_number)
    .bind(&student.college_id)
    .fetch_one(pool)
    .await?;

    Ok(user_from_row(&row))
}

/// Stores a captured sheet, replacing any earlier capture of the same
/// classroom, subject and date.
pub async fn save_sheet(pool: &PgPool, sheet: &ClassSheet) -> anyhow::Result<SessionSummary> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM campus_attendance.class_sessions
        WHERE classroom_code = $1 AND subject = $2 AND session_date = $3
        "#,
    )
    .bind(&sheet.classroom_code)
    .bind(&sheet.subject)
    .bind(sheet.session_date)
    .execute(&mut *tx)
    .await?;

    let session_id = Uuid::new_v4();
    let present_count = sheet.present_count() as i64;
    let strength = sheet.strength() as i64;

    sqlx::query(
        r#"
        INSERT INTO campus_attendance.class_sessions
        (id, classroom_code, subject, session_date, start_roll, strength, present_count)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(session_id)
    .bind(&sheet.classroom_code)
    .bind(&sheet.subject)
    .bind(sheet.session_date)
    .bind(sheet.start_roll())
    .bind(strength)
    .bind(present_count)
    .execute(&mut *tx)
    .await?;

    for (roll, status) in sheet.marks() {
        let status = match status {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        };
        sqlx::query(
            r#"
            INSERT INTO campus_attendance.session_marks (session_id, roll_number, status)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(session_id)
        .bind(roll)
        .bind(status)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(SessionSummary {
        classroom_code: sheet.classroom_code.clone(),
        subject: sheet.subject.clone(),
        session_date: sheet.session_date,
        present_count,
        strength,
    })
}

/// Stored marks for one classroom and subject, dates and rolls ascending.
pub async fn fetch_marks(
    pool: &PgPool,
    classroom_code: &str,
    subject: &str,
) -> anyhow::Result<Vec<MarkRow>> {
    let rows = sqlx::query(
        "SELECT s.session_date, m.roll_number, m.status \
         FROM campus_attendance.class_sessions s \
         JOIN campus_attendance.session_marks m ON m.session_id = s.id \
         WHERE s.classroom_code = $1 AND s.subject = $2 \
         ORDER BY s.session_date, m.roll_number",
    )
    .bind(classroom_code)
    .bind(subject.trim())
    .fetch_all(pool)
    .await?;

    let mut marks = Vec::new();
    for row in rows {
        let status: String = row.get("status");
        marks.push(MarkRow {
            session_date: row.get("session_date"),
            roll_number: row.get("roll_number"),
            status: AttendanceStatus::from(status),
        });
    }

    Ok(marks)
}
