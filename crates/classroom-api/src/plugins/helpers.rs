//! Access checks shared by the plugins.

use classroom_core::roles::Role;
use classroom_core::{
    AppContext, AppError, AppRequest, AppResult, Assignment, Course, DatabaseAdapter, User,
};

/// Required, non-empty query parameter.
pub fn required_query<'a>(req: &'a AppRequest, name: &str) -> AppResult<&'a str> {
    req.query_param(name)
        .ok_or_else(|| AppError::bad_request(format!("{} is required", name)))
}

/// Whether `user` administers `tenant_id`.
///
/// A `super_admin` role claim covers every tenant; otherwise an active
/// admin or super-admin membership in the tenant is required.
pub async fn is_tenant_admin<DB: DatabaseAdapter>(
    ctx: &AppContext<DB>,
    user: &User,
    tenant_id: &str,
) -> AppResult<bool> {
    if user.role.as_deref().and_then(Role::parse) == Some(Role::SuperAdmin) {
        return Ok(true);
    }

    Ok(ctx
        .database
        .get_membership(tenant_id, &user.id)
        .await?
        .filter(|m| m.is_active())
        .and_then(|m| Role::parse(&m.role))
        .is_some_and(|role| role.is_admin()))
}

/// Load a course the caller may manage: its teacher or an admin of its
/// tenant.
pub async fn require_course_staff<DB: DatabaseAdapter>(
    ctx: &AppContext<DB>,
    user: &User,
    course_id: &str,
) -> AppResult<Course> {
    let course = ctx
        .database
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;

    if course.teacher_id == user.id || is_tenant_admin(ctx, user, &course.tenant_id).await? {
        Ok(course)
    } else {
        Err(AppError::forbidden("You do not teach this course"))
    }
}

/// Whether `user` may read `student_id`'s records.
///
/// The student, a linked parent, a teacher of one of the student's courses,
/// or an admin of a tenant the student belongs to.
pub async fn can_view_student<DB: DatabaseAdapter>(
    ctx: &AppContext<DB>,
    user: &User,
    student_id: &str,
) -> AppResult<bool> {
    if user.id == student_id || ctx.database.is_parent_of(&user.id, student_id).await? {
        return Ok(true);
    }

    for course in ctx.database.list_student_courses(student_id).await? {
        if course.teacher_id == user.id || is_tenant_admin(ctx, user, &course.tenant_id).await? {
            return Ok(true);
        }
    }

    for membership in ctx.database.list_user_memberships(student_id).await? {
        if is_tenant_admin(ctx, user, &membership.tenant_id).await? {
            return Ok(true);
        }
    }

    Ok(false)
}

pub async fn load_assignment<DB: DatabaseAdapter>(
    ctx: &AppContext<DB>,
    assignment_id: &str,
) -> AppResult<Assignment> {
    ctx.database
        .get_assignment(assignment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Assignment not found"))
}

/// Fail unless `student_id` is enrolled in `course_id`.
pub async fn require_enrolled<DB: DatabaseAdapter>(
    ctx: &AppContext<DB>,
    course_id: &str,
    student_id: &str,
) -> AppResult<()> {
    if ctx.database.is_enrolled(course_id, student_id).await? {
        Ok(())
    } else {
        Err(AppError::forbidden("You are not enrolled in this course"))
    }
}

/// Cache tag covering every cached read of a course's assignments.
pub fn course_assignments_tag(course_id: &str) -> String {
    format!("course:{}:assignments", course_id)
}

/// Cache tag covering every cached read of a student's grades.
pub fn student_grades_tag(student_id: &str) -> String {
    format!("student:{}:grades", student_id)
}
