pub mod db;
pub mod progress;
pub mod selector;
pub mod store;

pub use db::{PracticeDb, ProgressSummary};
pub use progress::{
    CharacterProgress, DifficultyProgress, PracticeRecord, ProgressTracker, MASTERY_MAX_IDLE_DAYS,
    MASTERY_MIN_ATTEMPTS, MASTERY_SCORE,
};
pub use selector::{AdaptiveSelector, PracticeAttempt, SelectionOptions, SelectionTuning};
pub use store::{KeyValueStore, MemoryBackend};

/// Storage key for the serialized selection weights
pub const WEIGHTS_KEY: &str = "selection_weights";
/// Storage key for the recently shown characters
pub const RECENT_KEY: &str = "recent_characters";
