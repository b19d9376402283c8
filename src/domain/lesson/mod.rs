pub mod model;
pub mod service;

pub use model::{LessonSummary, LessonWords};
pub use service::LessonService;
