mod app;

pub use app::{Classroom, ClassroomBuilder, TypedClassroomBuilder};
