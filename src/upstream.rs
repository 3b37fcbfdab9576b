use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    attendance::{aggregate, AttendanceSheet, AttendanceSummary},
    classroom::{ClassroomAssignment, ClassroomTable},
    error::AttendanceError,
};

/// Anything that can hand back the raw per-subject records for one roll.
pub trait AttendanceSource {
    async fn fetch(
        &self,
        assignment: &ClassroomAssignment,
        roll: i64,
    ) -> Result<AttendanceSheet, AttendanceError>;
}

/// Envelope fields checked before the body is read as a sheet.
#[derive(Debug, Default, Deserialize)]
struct SourceStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SourceStatus {
    /// A missing status flag is success unless the body carries an error.
    fn check(self) -> Result<(), AttendanceError> {
        match self.status.as_deref() {
            None => match self.error {
                Some(error) => Err(AttendanceError::UpstreamFetchFailure(error)),
                None => Ok(()),
            },
            Some(status) if status.eq_ignore_ascii_case("success") => Ok(()),
            Some(status) => Err(AttendanceError::UpstreamFetchFailure(
                self.message
                    .or(self.error)
                    .unwrap_or_else(|| format!("source reported status {status:?}")),
            )),
        }
    }
}

pub fn parse_source_body(body: &str) -> Result<AttendanceSheet, AttendanceError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AttendanceError::UpstreamFetchFailure(format!("malformed response: {e}")))?;

    SourceStatus::deserialize(&value)
        .unwrap_or_default()
        .check()?;

    AttendanceSheet::deserialize(&value).map_err(|e| {
        AttendanceError::UpstreamFetchFailure(format!("response has no attendance data: {e}"))
    })
}

pub struct HttpAttendanceSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAttendanceSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl AttendanceSource for HttpAttendanceSource {
    async fn fetch(
        &self,
        assignment: &ClassroomAssignment,
        roll: i64,
    ) -> Result<AttendanceSheet, AttendanceError> {
        let start_roll = assignment.cohort_start_roll.to_string();
        let roll = roll.to_string();
        debug!(
            class_code = %assignment.classroom_code,
            start_roll = %start_roll,
            roll = %roll,
            "Requesting attendance"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("mode", "fetch"),
                ("class_code", assignment.classroom_code.as_str()),
                ("start_roll", start_roll.as_str()),
                ("roll", roll.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AttendanceError::UpstreamFetchFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttendanceError::UpstreamFetchFailure(format!(
                "HTTP error! status: {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttendanceError::UpstreamFetchFailure(e.to_string()))?;

        parse_source_body(&body)
    }
}

/// Resolves the roll, fetches its records and aggregates them. An invalid
/// roll never reaches the source.
pub async fn fetch_summary<S: AttendanceSource>(
    source: &S,
    table: &ClassroomTable,
    roll_input: &str,
) -> Result<(ClassroomAssignment, AttendanceSummary), AttendanceError> {
    let assignment = table.resolve_str(roll_input)?;
    let roll = crate::classroom::parse_roll(roll_input)
        .ok_or_else(|| AttendanceError::invalid_roll(roll_input))?;

    let sheet = source.fetch(&assignment, roll).await?;
    let summary = aggregate(&sheet);
    info!(
        roll,
        classroom = %assignment.classroom_code,
        subjects = summary.subjects.len(),
        overall = summary.overall_percentage,
        "Attendance aggregated"
    );

    Ok((assignment, summary))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeSource {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AttendanceSource for FakeSource {
        async fn fetch(
            &self,
            assignment: &ClassroomAssignment,
            roll: i64,
        ) -> Result<AttendanceSheet, AttendanceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(roll >= assignment.cohort_start_roll);
            parse_source_body(self.body)
        }
    }

    const GOOD_BODY: &str = r#"{
        "status": "success",
        "name": "Omkar Deshpande",
        "attendance_data": [
            {"subject": "MAIN", "attendance": [{"date": "03/01", "status": "P"}]},
            {"subject": "CN", "attendance": [
                {"date": "03/01", "status": "P"},
                {"date": "04/01", "status": "P"},
                {"date": "05/01", "status": "A"},
                {"date": "06/01", "status": "P"}
            ]}
        ]
    }"#;

    #[tokio::test]
    async fn resolves_fetches_and_aggregates() {
        let source = FakeSource::new(GOOD_BODY);
        let table = ClassroomTable::default();
        let (assignment, summary) = fetch_summary(&source, &table, "80").await.unwrap();

        assert_eq!(assignment.classroom_code, "CSB");
        assert_eq!(assignment.cohort_start_roll, 75);
        assert_eq!(summary.subjects.len(), 1);
        assert!((summary.overall_percentage - 75.0).abs() < 1e-9);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_roll_skips_the_source() {
        let source = FakeSource::new(GOOD_BODY);
        let table = ClassroomTable::default();

        for input in ["0", "224", "abc"] {
            let result = fetch_summary(&source, &table, input).await;
            assert!(matches!(result, Err(AttendanceError::InvalidRollNumber(_))));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_status_propagates_message() {
        let source = FakeSource::new(r#"{"status": "error", "message": "Sheet CSA not found"}"#);
        let table = ClassroomTable::default();
        let result = fetch_summary(&source, &table, "5").await;
        assert_eq!(
            result.unwrap_err(),
            AttendanceError::UpstreamFetchFailure("Sheet CSA not found".to_string())
        );
    }

    #[test]
    fn failure_status_without_message() {
        let err = parse_source_body(r#"{"status": "failed"}"#).unwrap_err();
        assert!(matches!(err, AttendanceError::UpstreamFetchFailure(m) if m.contains("failed")));
    }

    #[test]
    fn missing_status_is_success() {
        let sheet = parse_source_body(r#"{"attendance_data": []}"#).unwrap();
        assert!(sheet.subjects.is_empty());
    }

    #[test]
    fn error_body_without_data_is_upstream_failure() {
        let err = parse_source_body(r#"{"error": "Roll 80 not found in sheet CSB"}"#).unwrap_err();
        assert_eq!(
            err,
            AttendanceError::UpstreamFetchFailure("Roll 80 not found in sheet CSB".to_string())
        );

        let err = parse_source_body(r#"{"name": "Omkar Deshpande"}"#).unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::UpstreamFetchFailure(m) if m.contains("attendance")
        ));
    }

    #[tokio::test]
    async fn error_body_never_yields_a_summary() {
        let source = FakeSource::new(r#"{"error": "Sheet unavailable"}"#);
        let table = ClassroomTable::default();
        let result = fetch_summary(&source, &table, "80").await;
        assert!(matches!(result, Err(AttendanceError::UpstreamFetchFailure(_))));
    }

    #[test]
    fn malformed_body_is_upstream_failure() {
        let err = parse_source_body("<html>Service unavailable</html>").unwrap_err();
        assert!(matches!(err, AttendanceError::UpstreamFetchFailure(_)));
    }

    /// Serves one canned HTTP response on a local port and hands back the
    /// request line it received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/exec", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            let head = String::from_utf8_lossy(&head).to_string();
            head.lines().next().unwrap_or_default().to_string()
        });

        (base_url, handle)
    }

    fn csb_assignment() -> ClassroomAssignment {
        ClassroomAssignment {
            classroom_code: "CSB".to_string(),
            cohort_start_roll: 75,
        }
    }

    #[tokio::test]
    async fn http_source_sends_fetch_query() {
        let (base_url, server) = serve_once("200 OK", GOOD_BODY).await;
        let source = HttpAttendanceSource::new(&base_url, Duration::from_secs(5)).unwrap();

        let sheet = source.fetch(&csb_assignment(), 80).await.unwrap();
        assert_eq!(sheet.student_name.as_deref(), Some("Omkar Deshpande"));
        assert_eq!(sheet.subjects.len(), 2);

        let request_line = server.await.unwrap();
        assert_eq!(
            request_line,
            "GET /exec?mode=fetch&class_code=CSB&start_roll=75&roll=80 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn http_source_rejects_non_success_status() {
        let (base_url, server) = serve_once("500 Internal Server Error", "{}").await;
        let source = HttpAttendanceSource::new(&base_url, Duration::from_secs(5)).unwrap();

        let err = source.fetch(&csb_assignment(), 80).await.unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::UpstreamFetchFailure(ref m) if m.starts_with("HTTP error! status: 500")
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn http_source_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let base_url = format!("http://{address}/exec");
        let source = HttpAttendanceSource::new(&base_url, Duration::from_secs(2)).unwrap();
        let err = source.fetch(&csb_assignment(), 80).await.unwrap_err();
        assert!(matches!(err, AttendanceError::UpstreamFetchFailure(_)));
    }
}
