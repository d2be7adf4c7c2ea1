pub mod assignment;
pub mod export;
pub mod grade;
pub(crate) mod helpers;
pub mod quiz;
pub mod session;
pub mod submission;
pub mod upload;

pub use assignment::AssignmentPlugin;
pub use export::ExportPlugin;
pub use grade::GradePlugin;
pub use quiz::QuizPlugin;
pub use session::{SessionPlugin, SessionPluginConfig};
pub use submission::SubmissionPlugin;
pub use upload::UploadPlugin;
