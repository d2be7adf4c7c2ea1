//! Read-only report projections behind the CSV exports.

use chrono::{DateTime, Utc};

use crate::adapters::{AssignmentOps, CourseOps, GradeOps, IdentityProvider};
use crate::csv_export::CsvColumn;
use crate::error::AppResult;
use crate::grading::{letter_grade, percentage};
use crate::types::{ProgressReportRow, SchoolReportRow};

fn report_date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn school_report_columns() -> Vec<CsvColumn> {
    vec![
        CsvColumn::new("course_name", "Course Name"),
        CsvColumn::new("teacher", "Teacher"),
        CsvColumn::new("student_count", "Students"),
        CsvColumn::new("status", "Status"),
        CsvColumn::new("created_at", "Created"),
        CsvColumn::new("updated_at", "Updated"),
    ]
}

pub fn progress_report_columns() -> Vec<CsvColumn> {
    vec![
        CsvColumn::new("assignment", "Assignment"),
        CsvColumn::new("course", "Course"),
        CsvColumn::new("score", "Score"),
        CsvColumn::new("percentage", "Percentage"),
        CsvColumn::new("letter_grade", "Letter Grade"),
        CsvColumn::new("date", "Date"),
    ]
}

/// One row per course in the tenant, oldest course first.
///
/// The teacher column shows the teacher's display name, falling back to
/// their email, and is left empty when the identity provider no longer
/// knows the user.
pub async fn school_report<DB, IP>(
    database: &DB,
    identity: &IP,
    tenant_id: &str,
) -> AppResult<Vec<SchoolReportRow>>
where
    DB: CourseOps + ?Sized,
    IP: IdentityProvider + ?Sized,
{
    let courses = database.list_tenant_courses(tenant_id).await?;
    let mut rows = Vec::with_capacity(courses.len());

    for course in courses {
        let teacher = identity
            .get_user(&course.teacher_id)
            .await?
            .map(|user| user.name.unwrap_or(user.email))
            .unwrap_or_default();
        let student_count = database.count_course_students(&course.id).await?;

        rows.push(SchoolReportRow {
            course_name: course.name,
            teacher,
            student_count,
            status: course.status.to_string(),
            created_at: report_date(&course.created_at),
            updated_at: report_date(&course.updated_at),
        });
    }

    Ok(rows)
}

/// One row per assignment in every course the student is enrolled in.
/// Ungraded assignments keep empty score columns.
pub async fn progress_report<DB>(
    database: &DB,
    student_id: &str,
) -> AppResult<Vec<ProgressReportRow>>
where
    DB: CourseOps + AssignmentOps + GradeOps + ?Sized,
{
    let mut rows = Vec::new();

    for course in database.list_student_courses(student_id).await? {
        for assignment in database.list_course_assignments(&course.id).await? {
            let grade = database.get_grade(&assignment.id, student_id).await?;
            let pct = grade
                .as_ref()
                .and_then(|g| percentage(g.score, assignment.max_score));

            rows.push(ProgressReportRow {
                assignment: assignment.title,
                course: course.name.clone(),
                score: grade.as_ref().map(|g| g.score),
                percentage: pct,
                letter_grade: pct.map(|p| letter_grade(p).to_string()),
                date: grade.as_ref().map(|g| report_date(&g.updated_at)),
            });
        }
    }

    Ok(rows)
}
