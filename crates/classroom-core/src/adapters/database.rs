pub use super::traits::{
    AssignmentOps, CourseOps, FileOps, GradeOps, MembershipOps, QuizOps, SubmissionOps,
};

/// Database adapter trait for persistence.
///
/// Combines all entity-specific operation traits. Any type that implements
/// all sub-traits (`MembershipOps`, `CourseOps`, etc.) automatically
/// implements `DatabaseAdapter` via the blanket impl.
///
/// Use the sub-traits directly when you only need a subset of operations
/// (e.g. the role resolver only reads memberships).
pub trait DatabaseAdapter:
    MembershipOps + CourseOps + AssignmentOps + GradeOps + QuizOps + SubmissionOps + FileOps
{
}

impl<T> DatabaseAdapter for T where
    T: MembershipOps + CourseOps + AssignmentOps + GradeOps + QuizOps + SubmissionOps + FileOps
{
}
