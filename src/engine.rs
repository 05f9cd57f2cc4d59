//! Entry points a UI or orchestration layer calls.
//!
//! [`PracticeEngine`] composes feature extraction, scoring, grading and
//! selection over one storage backend. None of the per-attempt calls fail:
//! storage problems are logged and the in-memory state carries on.

use crate::character::{Character, Difficulty, TemplateStore};
use crate::config::Config;
use crate::drawing::DrawingData;
use crate::error::Result;
use crate::grading::{self, Feedback, GradingEngine, ScoreResult};
use crate::practice::{
    AdaptiveSelector, DifficultyProgress, KeyValueStore, PracticeAttempt, ProgressTracker,
    SelectionOptions, RECENT_KEY, WEIGHTS_KEY,
};
use crate::recognition::{recognize, Mode, RecognitionResult, SimilarityScorer, StrokeFeatureExtractor};
use crate::util::unit;
use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Everything the learner is shown after an attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReport {
    pub feedback: Feedback,
    pub suggestion: String,
}

pub struct PracticeEngine<B> {
    config: Config,
    store: TemplateStore,
    extractor: StrokeFeatureExtractor,
    scorer: SimilarityScorer,
    grading: GradingEngine,
    selector: AdaptiveSelector,
    backend: B,
}

impl<B: ProgressTracker + KeyValueStore> PracticeEngine<B> {
    /// Engine over the built-in hiragana set, restoring saved selection state
    pub fn new(config: Config, backend: B) -> Result<Self> {
        let store = TemplateStore::builtin()?;
        let selector = AdaptiveSelector::new(&store, config.selection.clone());
        Self::assemble(config, store, selector, backend)
    }

    /// Same as [`PracticeEngine::new`] with a reproducible random source
    pub fn with_seed(config: Config, backend: B, seed: u64) -> Result<Self> {
        let store = TemplateStore::builtin()?;
        let selector = AdaptiveSelector::with_seed(&store, config.selection.clone(), seed);
        Self::assemble(config, store, selector, backend)
    }

    fn assemble(
        config: Config,
        store: TemplateStore,
        mut selector: AdaptiveSelector,
        backend: B,
    ) -> Result<Self> {
        if let Some(saved) = backend.load_data(WEIGHTS_KEY)? {
            match serde_json::from_value::<HashMap<String, f64>>(saved) {
                Ok(weights) => selector.restore_weights(weights),
                Err(e) => warn!(error = %e, "discarding unreadable selection weights"),
            }
        }
        if let Some(saved) = backend.load_data(RECENT_KEY)? {
            match serde_json::from_value::<Vec<String>>(saved) {
                Ok(recent) => selector.restore_recent(recent),
                Err(e) => warn!(error = %e, "discarding unreadable recent characters"),
            }
        }

        Ok(Self {
            extractor: StrokeFeatureExtractor::new(config.features.clone()),
            scorer: SimilarityScorer::new(config.scoring.weights.clone()),
            grading: GradingEngine::new(&config.scoring),
            config,
            store,
            selector,
            backend,
        })
    }

    /// Score one drawing against `target`.
    ///
    /// Unknown targets are scored against the generic baseline template.
    pub fn evaluate_attempt(&self, drawing: &DrawingData, target: &str, mode: Mode) -> ScoreResult {
        let Some(preprocessed) = self.extractor.preprocess(drawing) else {
            return self.grading.grade(&RecognitionResult::empty(), target, drawing);
        };

        let (template, known_target) = match self.store.get(target) {
            Some(template) => (template, true),
            None => {
                warn!(%target, "no template for target, scoring against baseline");
                (self.store.baseline(), false)
            }
        };

        let strategy = self.config.scoring.strategy(mode, &self.config.features);
        let recognition = recognize(
            &preprocessed,
            template,
            known_target,
            &self.scorer,
            strategy.as_ref(),
        );
        let result = self.grading.grade(&recognition, target, drawing);

        debug!(
            %target,
            %mode,
            level = %result.level,
            score = result.score,
            strokes = drawing.stroke_count(),
            "evaluated attempt"
        );
        result
    }

    /// Like [`evaluate_attempt`](Self::evaluate_attempt) for raw captured JSON.
    /// Input that does not parse gets the fixed per-mode fallback grade.
    pub fn evaluate_json(&self, json: &str, target: &str, mode: Mode) -> ScoreResult {
        match serde_json::from_str::<DrawingData>(json) {
            Ok(drawing) => self.evaluate_attempt(&drawing, target, mode),
            Err(e) => {
                warn!(%target, error = %e, "malformed drawing input");
                self.grading.fallback(mode, 0)
            }
        }
    }

    pub fn report(&self, result: &ScoreResult, target: &str) -> AttemptReport {
        AttemptReport {
            feedback: grading::feedback(result.level, target),
            suggestion: grading::suggestion(result, target),
        }
    }

    pub fn select_next_character(
        &mut self,
        exclude: Option<&str>,
        options: &SelectionOptions,
    ) -> Character {
        let character =
            self.selector
                .select_next(exclude, options, Some(&self.backend), Local::now());
        self.persist_recent();
        character
    }

    /// Feed a graded outcome back into the selection weights and the progress
    /// history.
    pub fn record_outcome(&mut self, character: &str, score: f64) {
        let score = unit(score);
        match self.store.character(character) {
            Some(c) => {
                self.selector.update_selection_weights(&PracticeAttempt {
                    character: c.glyph.clone(),
                    score,
                    difficulty: c.difficulty,
                });
                self.persist_weights();
            }
            None => warn!(%character, "outcome for unsupported character"),
        }

        if let Err(e) = self
            .backend
            .record_character_practice(character, score, Local::now())
        {
            warn!(%character, error = %e, "failed to record practice");
        }
    }

    pub fn progress_by_difficulty(&self) -> Result<Vec<DifficultyProgress>> {
        self.backend
            .get_progress_by_difficulty(self.store.characters(), Local::now())
    }

    /// Tier the learner should practice next; `easy` when progress is unavailable
    pub fn recommended_difficulty(&self) -> Difficulty {
        match self.progress_by_difficulty() {
            Ok(summary) => self.selector.get_recommended_difficulty(&summary),
            Err(e) => {
                warn!(error = %e, "progress unavailable for recommendation");
                Difficulty::Easy
            }
        }
    }

    fn persist_weights(&mut self) {
        let value = match serde_json::to_value(self.selector.weights()) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to encode selection weights");
                return;
            }
        };
        if let Err(e) = self.backend.save_data(WEIGHTS_KEY, &value) {
            warn!(error = %e, "failed to save selection weights");
        }
    }

    fn persist_recent(&mut self) {
        let recent: Vec<&str> = self.selector.recent().collect();
        let value = serde_json::Value::from(recent);
        if let Err(e) = self.backend.save_data(RECENT_KEY, &value) {
            warn!(error = %e, "failed to save recent characters");
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn selector(&self) -> &AdaptiveSelector {
        &self.selector
    }

    pub fn selection_weight(&self, glyph: &str) -> Option<f64> {
        self.selector.weight(glyph)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}
