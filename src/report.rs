use std::fmt::Write;

use crate::{
    attendance::{AttendanceSummary, SubjectSummary},
    classroom::ClassroomAssignment,
};

pub const DEFAULT_THRESHOLD: f64 = 75.0;

pub fn below_threshold(summary: &AttendanceSummary, threshold: f64) -> Vec<&SubjectSummary> {
    summary
        .subjects
        .iter()
        .filter(|subject| subject.percentage < threshold)
        .collect()
}

pub fn build_report(
    roll: i64,
    assignment: &ClassroomAssignment,
    summary: &AttendanceSummary,
    threshold: f64,
) -> String {
    let mut output = String::new();
    let name = summary.student_name.as_deref().unwrap_or("Unknown student");

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "{} (roll {}, classroom {})",
        name, roll, assignment.classroom_code
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Overall attendance: {:.2}%", summary.overall_percentage);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if summary.subjects.is_empty() {
        let _ = writeln!(output, "No attendance recorded yet.");
    } else {
        let _ = writeln!(output, "| Subject | Present | Sessions | Attendance |");
        let _ = writeln!(output, "|---|---|---|---|");
        for subject in summary.subjects.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.2}% |",
                subject.subject_name, subject.present_count, subject.total_count, subject.percentage
            );
        }
    }

    let flagged = below_threshold(summary, threshold);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Below {:.0}%", threshold);

    if flagged.is_empty() {
        let _ = writeln!(output, "All subjects meet the threshold.");
    } else {
        for subject in flagged {
            let missed = subject.total_count - subject.present_count;
            let _ = writeln!(
                output,
                "- {}: {:.2}% ({} missed)",
                subject.subject_name, subject.percentage, missed
            );
        }
    }

    output
}
