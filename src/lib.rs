// Library surface for the CLI, integration tests and embedding.
pub mod app_dirs;
pub mod character;
pub mod config;
pub mod drawing;
pub mod engine;
pub mod error;
pub mod grading;
pub mod practice;
pub mod recognition;
pub mod util;

pub use character::{Character, Difficulty, TemplateStore};
pub use drawing::{DeviceType, DrawingData, Point, Stroke};
pub use engine::{AttemptReport, PracticeEngine};
pub use error::{Error, Result};
pub use grading::{GradeLevel, ScoreResult};
pub use recognition::Mode;
