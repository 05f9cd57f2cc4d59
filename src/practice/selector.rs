use super::progress::{CharacterProgress, DifficultyProgress, ProgressTracker};
use crate::character::{Character, Difficulty, TemplateStore};
use crate::util::unit;
use chrono::{DateTime, Local};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Constants for the weight update and the progress bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionTuning {
    pub initial_weight: f64,
    pub learning_rate: f64,
    /// Score at which a weight is left unchanged
    pub neutral_score: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub medium_boost: f64,
    pub hard_boost: f64,
    /// How many recently shown characters `avoid_recent` skips
    pub recent_window: usize,
    pub unpracticed_factor: f64,
    pub stale_after_days: f64,
    pub stale_bonus: f64,
    /// Tier mastery rate below which a tier is recommended
    pub recommend_mastery_rate: f64,
}

impl Default for SelectionTuning {
    fn default() -> Self {
        Self {
            initial_weight: 1.0,
            learning_rate: 0.5,
            neutral_score: 0.5,
            min_weight: 0.2,
            max_weight: 5.0,
            medium_boost: 1.1,
            hard_boost: 1.2,
            recent_window: 3,
            unpracticed_factor: 1.5,
            stale_after_days: 7.0,
            stale_bonus: 0.5,
            recommend_mastery_rate: 0.7,
        }
    }
}

impl SelectionTuning {
    fn boost(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => self.medium_boost,
            Difficulty::Hard => self.hard_boost,
        }
    }

    /// Multiplier applied on top of the stored weight when progress weighting is on
    pub fn progress_factor(&self, progress: &CharacterProgress, now: DateTime<Local>) -> f64 {
        let Some(days) = progress.days_since_last_practice(now) else {
            return self.unpracticed_factor;
        };
        let weakness = 0.5 + (1.0 - unit(progress.average_score.unwrap_or(0.0)));
        let staleness = if self.stale_after_days > 0.0 {
            1.0 + (days / self.stale_after_days).min(1.0) * self.stale_bonus
        } else {
            1.0
        };
        weakness * staleness
    }
}

/// Filters for one draw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionOptions {
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub avoid_recent: bool,
    pub use_progress_weighting: bool,
}

/// Graded attempt fed back into the weights
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeAttempt {
    pub character: String,
    pub score: f64,
    pub difficulty: Difficulty,
}

/// Owns the per-character selection weights and the recently shown list
pub struct AdaptiveSelector {
    characters: Vec<Character>,
    weights: HashMap<String, f64>,
    recent: VecDeque<String>,
    tuning: SelectionTuning,
    rng: StdRng,
}

impl AdaptiveSelector {
    pub fn new(store: &TemplateStore, tuning: SelectionTuning) -> Self {
        Self::with_rng(store, tuning, StdRng::from_entropy())
    }

    /// Deterministic selector for reproducible draws
    pub fn with_seed(store: &TemplateStore, tuning: SelectionTuning, seed: u64) -> Self {
        Self::with_rng(store, tuning, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: &TemplateStore, tuning: SelectionTuning, rng: StdRng) -> Self {
        let initial = tuning.initial_weight.clamp(tuning.min_weight, tuning.max_weight);
        let characters = store.characters().to_vec();
        let weights = characters
            .iter()
            .map(|c| (c.glyph.clone(), initial))
            .collect();
        Self {
            characters,
            weights,
            recent: VecDeque::new(),
            tuning,
            rng,
        }
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, glyph: &str) -> Option<f64> {
        self.weights.get(glyph).copied()
    }

    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    pub fn tuning(&self) -> &SelectionTuning {
        &self.tuning
    }

    /// Replace weights with previously saved ones. Unknown characters and
    /// non-finite values are ignored; the rest are clamped into range.
    pub fn restore_weights(&mut self, saved: HashMap<String, f64>) {
        for (glyph, weight) in saved {
            match self.weights.get_mut(&glyph) {
                Some(slot) if weight.is_finite() => {
                    *slot = weight.clamp(self.tuning.min_weight, self.tuning.max_weight);
                }
                _ => debug!(%glyph, weight, "ignoring saved selection weight"),
            }
        }
    }

    pub fn restore_recent(&mut self, saved: Vec<String>) {
        self.recent = saved
            .into_iter()
            .filter(|glyph| self.weights.contains_key(glyph))
            .collect();
        while self.recent.len() > self.tuning.recent_window {
            self.recent.pop_front();
        }
    }

    /// Draw the next practice character.
    ///
    /// Filters that match nothing fall back to the full set. `progress` is
    /// only consulted when `options.use_progress_weighting` is set.
    pub fn select_next(
        &mut self,
        exclude: Option<&str>,
        options: &SelectionOptions,
        progress: Option<&dyn ProgressTracker>,
        now: DateTime<Local>,
    ) -> Character {
        let pool = Self::candidate_pool(&self.characters, options);

        let narrowed: Vec<&Character> = pool
            .iter()
            .copied()
            .filter(|c| Some(c.glyph.as_str()) != exclude)
            .filter(|c| !(options.avoid_recent && self.recent.contains(&c.glyph)))
            .collect();
        let narrowed = if !narrowed.is_empty() {
            narrowed
        } else {
            let without_excluded: Vec<&Character> = pool
                .iter()
                .copied()
                .filter(|c| Some(c.glyph.as_str()) != exclude)
                .collect();
            if without_excluded.is_empty() {
                pool
            } else {
                without_excluded
            }
        };

        let weights: Vec<f64> = narrowed
            .iter()
            .map(|c| {
                let base = self.weights.get(&c.glyph).copied().unwrap_or(self.tuning.min_weight);
                let factor = match (options.use_progress_weighting, progress) {
                    (true, Some(tracker)) => match tracker.get_character_progress(&c.glyph) {
                        Ok(p) => self.tuning.progress_factor(&p, now),
                        Err(e) => {
                            warn!(glyph = %c.glyph, error = %e, "progress lookup failed");
                            1.0
                        }
                    },
                    _ => 1.0,
                };
                let weight = base * factor;
                if weight.is_finite() && weight > 0.0 {
                    weight
                } else {
                    0.0
                }
            })
            .collect();

        let index = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(e) => {
                debug!(error = %e, "falling back to uniform draw");
                self.rng.gen_range(0..narrowed.len())
            }
        };
        let chosen = narrowed[index].clone();
        debug!(glyph = %chosen.glyph, pool = narrowed.len(), "selected next character");

        self.remember(&chosen.glyph);
        chosen
    }

    fn candidate_pool<'a>(
        characters: &'a [Character],
        options: &SelectionOptions,
    ) -> Vec<&'a Character> {
        let filtered: Vec<&Character> = characters
            .iter()
            .filter(|c| options.difficulty.map_or(true, |d| c.difficulty == d))
            .filter(|c| {
                options
                    .category
                    .as_deref()
                    .map_or(true, |cat| c.category == cat)
            })
            .collect();

        if filtered.is_empty() {
            debug!(?options, "filters matched nothing, using all characters");
            characters.iter().collect()
        } else {
            filtered
        }
    }

    fn remember(&mut self, glyph: &str) {
        if self.tuning.recent_window == 0 {
            return;
        }
        self.recent.retain(|g| g != glyph);
        self.recent.push_back(glyph.to_string());
        while self.recent.len() > self.tuning.recent_window {
            self.recent.pop_front();
        }
    }

    /// Raise the weight of poorly written characters and lower it for good ones.
    ///
    /// Returns the new weight, or `None` for a character the selector does not know.
    pub fn update_selection_weights(&mut self, attempt: &PracticeAttempt) -> Option<f64> {
        let tuning = &self.tuning;
        let Some(weight) = self.weights.get_mut(&attempt.character) else {
            warn!(character = %attempt.character, "weight update for unknown character");
            return None;
        };

        let score = unit(attempt.score);
        let delta = tuning.learning_rate * (tuning.neutral_score - score) * 2.0;
        let delta = if delta > 0.0 {
            delta * tuning.boost(attempt.difficulty)
        } else {
            delta
        };
        let before = *weight;
        *weight = (before * (1.0 + delta)).clamp(tuning.min_weight, tuning.max_weight);

        debug!(
            character = %attempt.character,
            score,
            before,
            after = *weight,
            "updated selection weight"
        );
        Some(*weight)
    }

    /// First tier, easiest to hardest, whose mastery rate is still below the
    /// target. Tiers without characters are skipped.
    pub fn get_recommended_difficulty(&self, summary: &[DifficultyProgress]) -> Difficulty {
        let mut tiers: Vec<&DifficultyProgress> = summary.iter().filter(|t| t.total > 0).collect();
        tiers.sort_by_key(|t| t.difficulty);

        tiers
            .into_iter()
            .find(|t| t.mastery_rate() < self.tuning.recommend_mastery_rate)
            .map(|t| t.difficulty)
            .unwrap_or(Difficulty::Hard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::MemoryBackend;
    use chrono::Duration;
    use std::collections::HashSet;

    fn selector(seed: u64) -> AdaptiveSelector {
        let store = TemplateStore::builtin().unwrap();
        AdaptiveSelector::with_seed(&store, SelectionTuning::default(), seed)
    }

    fn attempt(character: &str, score: f64) -> PracticeAttempt {
        PracticeAttempt {
            character: character.to_string(),
            score,
            difficulty: Difficulty::Hard,
        }
    }

    #[test]
    fn weights_start_uniform() {
        let s = selector(1);
        assert_eq!(s.weights().len(), 46);
        assert!(s.weights().values().all(|&w| w == 1.0));
    }

    #[test]
    fn low_scores_raise_weight_and_high_scores_lower_it() {
        let mut s = selector(1);
        let first = s.update_selection_weights(&attempt("あ", 0.3)).unwrap();
        let second = s.update_selection_weights(&attempt("あ", 0.3)).unwrap();
        assert!(first > 1.0);
        assert!(second > first);

        let lowered = s.update_selection_weights(&attempt("い", 0.95)).unwrap();
        assert!(lowered < 1.0);

        let neutral = s.update_selection_weights(&attempt("う", 0.5)).unwrap();
        assert_eq!(neutral, 1.0);
    }

    #[test]
    fn update_is_monotonic_in_score() {
        let scores = [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0];
        let results: Vec<f64> = scores
            .iter()
            .map(|&score| {
                let mut s = selector(1);
                s.update_selection_weights(&attempt("か", score)).unwrap()
            })
            .collect();
        for pair in results.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn weights_stay_in_bounds() {
        let mut s = selector(1);
        for _ in 0..100 {
            s.update_selection_weights(&attempt("ぬ", 0.0));
            s.update_selection_weights(&attempt("の", 1.0));
        }
        assert_eq!(s.weight("ぬ"), Some(5.0));
        assert_eq!(s.weight("の"), Some(0.2));

        s.update_selection_weights(&attempt("の", f64::NAN));
        assert!(s.weight("の").unwrap() >= 0.2);
    }

    #[test]
    fn unknown_character_update_is_ignored() {
        let mut s = selector(1);
        assert_eq!(s.update_selection_weights(&attempt("A", 0.0)), None);
        assert_eq!(s.weights().len(), 46);
    }

    #[test]
    fn difficulty_filter_is_respected() {
        let mut s = selector(7);
        let options = SelectionOptions {
            difficulty: Some(Difficulty::Easy),
            ..Default::default()
        };
        for _ in 0..200 {
            let c = s.select_next(None, &options, None, Local::now());
            assert_eq!(c.difficulty, Difficulty::Easy);
        }
    }

    #[test]
    fn unknown_category_falls_back_to_all_characters() {
        let mut s = selector(7);
        let options = SelectionOptions {
            category: Some("no-such-row".to_string()),
            ..Default::default()
        };
        let seen: HashSet<String> = (0..300)
            .map(|_| s.select_next(None, &options, None, Local::now()).glyph)
            .collect();
        assert!(seen.len() > 10);
    }

    #[test]
    fn category_filter_narrows_pool() {
        let mut s = selector(3);
        let options = SelectionOptions {
            category: Some("ka-row".to_string()),
            ..Default::default()
        };
        for _ in 0..50 {
            let c = s.select_next(None, &options, None, Local::now());
            assert_eq!(c.category, "ka-row");
        }
    }

    #[test]
    fn exclude_and_avoid_recent() {
        let mut s = selector(11);
        let options = SelectionOptions {
            category: Some("ka-row".to_string()),
            avoid_recent: true,
            ..Default::default()
        };
        let mut previous: Vec<String> = Vec::new();
        for _ in 0..30 {
            let c = s.select_next(Some("か"), &options, None, Local::now());
            assert_ne!(c.glyph, "か");
            let window: Vec<&String> = previous.iter().rev().take(3).collect();
            assert!(!window.contains(&&c.glyph));
            previous.push(c.glyph);
        }
    }

    #[test]
    fn avoid_recent_never_empties_the_pool() {
        let mut s = selector(5);
        let options = SelectionOptions {
            category: Some("n".to_string()),
            avoid_recent: true,
            ..Default::default()
        };
        for _ in 0..5 {
            assert_eq!(s.select_next(None, &options, None, Local::now()).glyph, "ん");
        }
        // even when the only candidate is excluded
        let c = s.select_next(Some("ん"), &options, None, Local::now());
        assert_eq!(c.glyph, "ん");
    }

    #[test]
    fn heavy_weight_dominates_draws() {
        let mut s = selector(42);
        for _ in 0..20 {
            s.update_selection_weights(&attempt("ゆ", 0.0));
        }
        let hits = (0..1000)
            .filter(|_| {
                s.select_next(None, &SelectionOptions::default(), None, Local::now())
                    .glyph
                    == "ゆ"
            })
            .count();
        // 5.0 against 45 weights of 1.0 is ten percent of the mass
        assert!(hits > 50, "hits = {hits}");
    }

    #[test]
    fn progress_factor_prefers_unpracticed_weak_and_stale() {
        let tuning = SelectionTuning::default();
        let now = Local::now();
        let fresh_strong = CharacterProgress {
            attempts: 5,
            average_score: Some(0.9),
            last_practiced: Some(now),
        };
        let stale_weak = CharacterProgress {
            attempts: 5,
            average_score: Some(0.2),
            last_practiced: Some(now - Duration::days(10)),
        };
        let never = CharacterProgress::default();

        let strong = tuning.progress_factor(&fresh_strong, now);
        let weak = tuning.progress_factor(&stale_weak, now);
        assert!((strong - 0.6).abs() < 1e-9);
        assert!((weak - 1.95).abs() < 1e-9);
        assert_eq!(tuning.progress_factor(&never, now), 1.5);
    }

    #[test]
    fn progress_weighting_uses_tracker() {
        let store = TemplateStore::builtin().unwrap();
        let mut s = AdaptiveSelector::with_seed(&store, SelectionTuning::default(), 9);
        let mut backend = MemoryBackend::new();
        let now = Local::now();
        for c in store.characters() {
            if c.glyph != "め" {
                for _ in 0..3 {
                    backend
                        .record_character_practice(&c.glyph, 1.0, now)
                        .unwrap();
                }
            }
        }
        let options = SelectionOptions {
            use_progress_weighting: true,
            ..Default::default()
        };
        let hits = (0..600)
            .filter(|_| s.select_next(None, &options, Some(&backend), now).glyph == "め")
            .count();
        // 1.5 against 45 weights of 0.5 is six percent of the mass
        assert!(hits > 15, "hits = {hits}");
    }

    #[test]
    fn restore_ignores_unknown_and_clamps() {
        let mut s = selector(1);
        let saved = HashMap::from([
            ("あ".to_string(), 3.0),
            ("い".to_string(), 99.0),
            ("Z".to_string(), 2.0),
            ("う".to_string(), f64::NAN),
        ]);
        s.restore_weights(saved);
        assert_eq!(s.weight("あ"), Some(3.0));
        assert_eq!(s.weight("い"), Some(5.0));
        assert_eq!(s.weight("う"), Some(1.0));
        assert_eq!(s.weight("Z"), None);

        s.restore_recent(vec!["Z".into(), "あ".into(), "い".into(), "う".into(), "え".into()]);
        assert_eq!(s.recent().collect::<Vec<_>>(), vec!["い", "う", "え"]);
    }

    #[test]
    fn recommended_difficulty() {
        let s = selector(1);
        let tier = |difficulty, total, mastered| DifficultyProgress {
            difficulty,
            total,
            mastered,
        };

        let fresh = [
            tier(Difficulty::Easy, 12, 0),
            tier(Difficulty::Medium, 21, 0),
            tier(Difficulty::Hard, 13, 0),
        ];
        assert_eq!(s.get_recommended_difficulty(&fresh), Difficulty::Easy);

        let easy_done = [
            tier(Difficulty::Hard, 13, 0),
            tier(Difficulty::Easy, 12, 9),
            tier(Difficulty::Medium, 21, 10),
        ];
        assert_eq!(s.get_recommended_difficulty(&easy_done), Difficulty::Medium);

        let all_done = [
            tier(Difficulty::Easy, 12, 12),
            tier(Difficulty::Medium, 21, 15),
            tier(Difficulty::Hard, 13, 10),
        ];
        assert_eq!(s.get_recommended_difficulty(&all_done), Difficulty::Hard);
        assert_eq!(s.get_recommended_difficulty(&[]), Difficulty::Hard);
    }
}
