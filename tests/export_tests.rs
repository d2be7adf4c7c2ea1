mod common;

use classroom::adapters::CourseOps;
use classroom::types::CreateCourse;
use common::{TestHarness, get_request};
use serde_json::json;

const BOM: char = '\u{FEFF}';

fn csv_text(body: &[u8]) -> String {
    String::from_utf8(body.to_vec()).expect("csv body is utf-8")
}

#[tokio::test]
async fn test_school_report_for_admin() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;
    h.db()
        .create_course(CreateCourse::new(
            &school.tenant_id,
            "=HYPERLINK(\"x\")",
            &school.teacher.id,
        ))
        .await
        .unwrap();

    let resp = h
        .send_raw(common::with_auth(
            get_request(
                "/api/export/school-report",
                &[("tenantId", school.tenant_id.as_str())],
            ),
            &school.admin.token,
        ))
        .await;

    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.header("content-type").map(String::as_str),
        Some("text/csv; charset=utf-8")
    );
    let disposition = resp.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"school-report-"));
    assert!(disposition.ends_with(".csv\""));

    let text = csv_text(&resp.body);
    assert!(text.starts_with(BOM));
    let lines: Vec<&str> = text.trim_start_matches(BOM).split('\n').collect();
    assert_eq!(lines[0], "Course Name,Teacher,Students,Status,Created,Updated");
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().any(|l| l.starts_with("Biology,teacher,1,active,")));
    // Formula-leading names are neutralised and, containing quotes, wrapped.
    assert!(
        lines
            .iter()
            .any(|l| l.starts_with("\"'=HYPERLINK(\"\"x\"\")\",teacher,0,active,"))
    );
}

#[tokio::test]
async fn test_school_report_parses_as_csv() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;
    h.db()
        .create_course(CreateCourse::new(
            &school.tenant_id,
            "Art, Design",
            &school.teacher.id,
        ))
        .await
        .unwrap();

    let resp = h
        .send_raw(common::with_auth(
            get_request(
                "/api/export/school-report",
                &[("tenantId", school.tenant_id.as_str())],
            ),
            &school.admin.token,
        ))
        .await;
    let text = csv_text(&resp.body);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.trim_start_matches(BOM).as_bytes());
    let mut names: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[0].to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Art, Design".to_string(), "Biology".to_string()]);
}

#[tokio::test]
async fn test_school_report_forbidden_for_teacher() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;

    let (status, body) = h
        .get(
            "/api/export/school-report",
            &[("tenantId", school.tenant_id.as_str())],
            &school.teacher.token,
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body, json!({ "error": "You do not administer this school" }));
}

#[tokio::test]
async fn test_export_failures_are_403() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;

    // No session.
    let (status, body) = h
        .send(get_request(
            "/api/export/school-report",
            &[("tenantId", school.tenant_id.as_str())],
        ))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Authentication required");

    // Missing parameter.
    let (status, body) = h
        .get("/api/export/progress-report", &[], &school.parent.token)
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "studentId is required");

    // Unknown student.
    let (status, body) = h
        .get(
            "/api/export/progress-report",
            &[("studentId", "ghost")],
            &school.parent.token,
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "Student not found");
}

#[tokio::test]
async fn test_progress_report_for_linked_parent() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;
    let graded = h.create_assignment(&school, "Lab report", 20.0).await;
    h.create_assignment(&school, "Poster", 10.0).await;

    let (status, _) = h
        .post(
            "/actions/grades/post",
            json!({ "assignmentId": graded, "studentId": school.student.id, "score": 17 }),
            &school.teacher.token,
        )
        .await;
    assert_eq!(status, 200);

    let resp = h
        .send_raw(common::with_auth(
            get_request(
                "/api/export/progress-report",
                &[("studentId", school.student.id.as_str())],
            ),
            &school.parent.token,
        ))
        .await;
    assert_eq!(resp.status, 200);

    let text = csv_text(&resp.body);
    let lines: Vec<&str> = text.trim_start_matches(BOM).split('\n').collect();
    assert_eq!(
        lines[0],
        "Assignment,Course,Score,Percentage,Letter Grade,Date"
    );
    assert!(lines[1].starts_with("Lab report,Biology,17,85,B,"));
    assert_eq!(lines[2], "Poster,Biology,,,,");
}

#[tokio::test]
async fn test_progress_report_for_student_self_and_not_others() {
    let h = TestHarness::new().await;
    let school = h.seed_school().await;

    let (status, _) = h
        .get(
            "/api/export/progress-report",
            &[("studentId", school.student.id.as_str())],
            &school.student.token,
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = h
        .get(
            "/api/export/progress-report",
            &[("studentId", school.student.id.as_str())],
            &school.outsider.token,
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"], "You are not linked to this student");
}
