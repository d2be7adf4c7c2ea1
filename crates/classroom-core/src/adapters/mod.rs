pub mod database;
pub mod identity;
pub mod memory;
pub mod traits;

pub use database::DatabaseAdapter;
pub use identity::{IdentityProvider, MemoryIdentityProvider};
pub use memory::MemoryDatabaseAdapter;
pub use traits::{
    AssignmentOps, CourseOps, FileOps, GradeOps, MembershipOps, QuizOps, SubmissionOps,
};
