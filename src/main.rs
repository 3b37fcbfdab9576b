use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod attendance;
mod classroom;
mod config;
mod db;
mod error;
mod models;
mod report;
mod sheet;
mod students;
mod upstream;

use attendance::AttendanceStatus;
use classroom::ClassroomTable;
use config::Config;
use upstream::{fetch_summary, HttpAttendanceSource};

#[derive(Parser)]
#[command(name = "campus-attendance")]
#[command(about = "Roll resolution, attendance aggregation and student verification for the campus desk", long_about = None)]
struct Cli {
    /// CSV with code,first_roll,last_roll replacing the built-in classroom table
    #[arg(long, global = true)]
    classrooms: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small realistic roster
    Seed,
    /// Import students from a RollNo,Name,Email[,CollegeId] CSV
    ImportStudents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the classroom a roll number belongs to
    Resolve {
        #[arg(long)]
        roll: String,
    },
    /// Fetch and aggregate a student's attendance
    Attendance {
        #[arg(long)]
        roll: String,
        #[arg(long)]
        json: bool,
    },
    /// Verify an app user as the student owning a roll number
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        roll: String,
    },
    /// Capture a class attendance sheet; unlisted rolls are absent
    #[command(group(
        ArgGroup::new("marks")
            .args(["present", "all_present"])
            .multiple(false)
    ))]
    Mark {
        #[arg(long = "class")]
        classroom: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        present: Vec<i64>,
        #[arg(long)]
        all_present: bool,
    },
    /// List stored class sheets for a classroom and subject, one line per date
    Sessions {
        #[arg(long = "class")]
        classroom: String,
        #[arg(long)]
        subject: String,
    },
    /// Generate a markdown attendance report
    Report {
        #[arg(long)]
        roll: String,
        #[arg(long, default_value_t = report::DEFAULT_THRESHOLD)]
        threshold: f64,
        #[arg(long, default_value = "attendance.md")]
        out: PathBuf,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn source(config: &Config) -> anyhow::Result<HttpAttendanceSource> {
    HttpAttendanceSource::new(&config.source_url, config.source_timeout)
        .context("failed to build attendance source client")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let table = match cli.classrooms.as_deref() {
        Some(path) => ClassroomTable::from_csv(path)?,
        None => ClassroomTable::default(),
    };

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportStudents { csv } => {
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let rows = students::read_roster(file, &table)?;
            info!(rows = rows.len(), "Roster parsed");

            let pool = connect(&config).await?;
            let imported = db::upsert_students(&pool, &rows).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Resolve { roll } => {
            let assignment = table.resolve_str(&roll)?;
            println!("{}", serde_json::to_string_pretty(&assignment)?);
        }
        Commands::Attendance { roll, json } => {
            let source = source(&config)?;
            let (assignment, summary) = fetch_summary(&source, &table, &roll).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!(
                "{} ({}) overall {:.2}%",
                summary.student_name.as_deref().unwrap_or("Unknown student"),
                assignment.classroom_code,
                summary.overall_percentage
            );
            for subject in summary.subjects.iter() {
                println!(
                    "- {}: {:.2}% ({}/{})",
                    subject.subject_name,
                    subject.percentage,
                    subject.present_count,
                    subject.total_count
                );
            }
        }
        Commands::Verify { email, roll } => {
            let pool = connect(&config).await?;
            let user = db::find_user_by_email(&pool, &email).await?;
            let records = db::students_by_email(&pool, &email).await?;
            let student = students::match_student(user.as_ref(), &records, &roll)?;
            let user_id = user.as_ref().map(|u| u.id).context("user vanished")?;

            let updated =
                db::mark_user_verified(&pool, user_id, student, students::STUDENT_ROLE).await?;
            info!(
                username = %updated.username,
                roll = ?updated.roll_number,
                college_id = %updated.college_id,
                verified = updated.is_verified,
                "User verified"
            );
            println!(
                "Account verified successfully: {} ({}) is now {} (roll {}, classroom {}).",
                updated.username,
                student.full_name,
                updated.role,
                student.roll_number,
                student.classroom_code
            );

            // Verification stands even when the attendance source is down.
            let source = source(&config)?;
            match fetch_summary(&source, &table, &roll).await {
                Ok((_, summary)) => {
                    println!("Overall attendance: {:.2}%", summary.overall_percentage)
                }
                Err(e) => warn!("Error fetching attendance data: {e}"),
            }
        }
        Commands::Mark {
            classroom,
            subject,
            date,
            present,
            all_present,
        } => {
            let range = table
                .find(&classroom)
                .with_context(|| format!("unknown classroom {classroom}"))?;
            let session_date = date.unwrap_or_else(|| Utc::now().date_naive());
            let mut sheet = sheet::ClassSheet::new(range, &subject, session_date);

            if all_present {
                sheet.mark_all(AttendanceStatus::Present);
            }
            for roll in present {
                sheet.mark_present(roll)?;
            }

            let pool = connect(&config).await?;
            let saved = db::save_sheet(&pool, &sheet).await?;
            println!(
                "Saved {} {} on {}: {}/{} present ({:.2}%).",
                saved.classroom_code,
                saved.subject,
                saved.session_date,
                saved.present_count,
                saved.strength,
                sheet.percentage()
            );
        }
        Commands::Sessions { classroom, subject } => {
            let range = table
                .find(&classroom)
                .with_context(|| format!("unknown classroom {classroom}"))?;
            let pool = connect(&config).await?;
            let marks = db::fetch_marks(&pool, &range.code, &subject).await?;
            let sessions = sheet::group_sessions(&marks);

            if sessions.is_empty() {
                println!("No sheets captured for {} {}.", range.code, subject.trim());
                return Ok(());
            }

            for session in sessions.iter() {
                let absent: Vec<String> = session.absent.iter().map(|r| r.to_string()).collect();
                println!(
                    "- {}: {}/{} present ({:.2}%), absent: {}",
                    session.session_date,
                    session.present.len(),
                    session.strength(),
                    session.percentage(),
                    if absent.is_empty() {
                        "none".to_string()
                    } else {
                        absent.join(", ")
                    }
                );
            }
        }
        Commands::Report {
            roll,
            threshold,
            out,
        } => {
            let source = source(&config)?;
            let (assignment, summary) = fetch_summary(&source, &table, &roll).await?;
            let roll_number = classroom::parse_roll(&roll).context("invalid roll number")?;
            let report = report::build_report(roll_number, &assignment, &summary, threshold);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
