use crate::character::{Character, Difficulty};
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Average score at or above which a character counts as mastered
pub const MASTERY_SCORE: f64 = 0.7;
/// Attempts needed before mastery is considered at all
pub const MASTERY_MIN_ATTEMPTS: usize = 3;
/// Mastery lapses when a character has not been practiced for this long
pub const MASTERY_MAX_IDLE_DAYS: f64 = 30.0;

/// One stored attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub character: String,
    pub score: f64,
    pub timestamp: DateTime<Local>,
}

/// Aggregate statistics for one character
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterProgress {
    pub attempts: usize,
    pub average_score: Option<f64>,
    pub last_practiced: Option<DateTime<Local>>,
}

impl CharacterProgress {
    /// Whole and fractional days since the latest attempt; `None` if never practiced
    pub fn days_since_last_practice(&self, now: DateTime<Local>) -> Option<f64> {
        self.last_practiced.map(|last| {
            let elapsed = now.signed_duration_since(last);
            (elapsed.num_seconds() as f64 / 86_400.0).max(0.0)
        })
    }

    pub fn is_mastered(&self, now: DateTime<Local>) -> bool {
        self.attempts >= MASTERY_MIN_ATTEMPTS
            && self.average_score.is_some_and(|avg| avg >= MASTERY_SCORE)
            && self
                .days_since_last_practice(now)
                .is_some_and(|days| days <= MASTERY_MAX_IDLE_DAYS)
    }
}

/// Mastery summary for one difficulty tier
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyProgress {
    pub difficulty: Difficulty,
    pub total: usize,
    pub mastered: usize,
}

impl DifficultyProgress {
    pub fn mastery_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.mastered as f64 / self.total as f64
        }
    }
}

/// Progress-tracking collaborator.
///
/// The engine forwards raw outcomes here and reads back aggregates; it never
/// owns the history itself.
pub trait ProgressTracker {
    fn record_character_practice(
        &mut self,
        character: &str,
        score: f64,
        timestamp: DateTime<Local>,
    ) -> Result<()>;

    fn get_character_progress(&self, character: &str) -> Result<CharacterProgress>;

    /// Mastery per tier over `characters`, easiest tier first
    fn get_progress_by_difficulty(
        &self,
        characters: &[Character],
        now: DateTime<Local>,
    ) -> Result<Vec<DifficultyProgress>> {
        let mut summary: Vec<DifficultyProgress> = Difficulty::ALL
            .iter()
            .map(|&difficulty| DifficultyProgress {
                difficulty,
                total: 0,
                mastered: 0,
            })
            .collect();

        for character in characters {
            let progress = self.get_character_progress(&character.glyph)?;
            if let Some(tier) = summary
                .iter_mut()
                .find(|t| t.difficulty == character.difficulty)
            {
                tier.total += 1;
                if progress.is_mastered(now) {
                    tier.mastered += 1;
                }
            }
        }

        Ok(summary)
    }
}
