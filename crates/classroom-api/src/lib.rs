//! # Classroom API
//!
//! Plugins for the classroom service: the session flows, the rate-limited
//! coursework actions and the CSV exports.

pub mod action;
pub mod plugins;

pub use action::{ActionCaller, ServerAction, identify_caller, run_action};
pub use plugins::{
    AssignmentPlugin, ExportPlugin, GradePlugin, QuizPlugin, SessionPlugin, SessionPluginConfig,
    SubmissionPlugin, UploadPlugin,
};
