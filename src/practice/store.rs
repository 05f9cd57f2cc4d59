use super::progress::{CharacterProgress, PracticeRecord, ProgressTracker};
use crate::error::Result;
use crate::util::mean;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashMap;

/// Opaque key-value storage collaborator
pub trait KeyValueStore {
    fn save_data(&mut self, key: &str, value: &Value) -> Result<()>;

    fn load_data(&self, key: &str) -> Result<Option<Value>>;
}

/// Non-persistent backend for tests and embedders that bring their own storage
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    history: HashMap<String, Vec<PracticeRecord>>,
    data: HashMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, character: &str) -> &[PracticeRecord] {
        self.history
            .get(character)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl ProgressTracker for MemoryBackend {
    fn record_character_practice(
        &mut self,
        character: &str,
        score: f64,
        timestamp: DateTime<Local>,
    ) -> Result<()> {
        self.history
            .entry(character.to_string())
            .or_default()
            .push(PracticeRecord {
                character: character.to_string(),
                score,
                timestamp,
            });
        Ok(())
    }

    fn get_character_progress(&self, character: &str) -> Result<CharacterProgress> {
        let records = self.history(character);
        let scores: Vec<f64> = records.iter().map(|r| r.score).collect();
        Ok(CharacterProgress {
            attempts: records.len(),
            average_score: mean(&scores),
            last_practiced: records.iter().map(|r| r.timestamp).max(),
        })
    }
}

impl KeyValueStore for MemoryBackend {
    fn save_data(&mut self, key: &str, value: &Value) -> Result<()> {
        self.data.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn load_data(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.get(key).cloned())
    }
}
