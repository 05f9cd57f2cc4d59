use crate::error::{Error, Result};
use crate::recognition::FeatureSet;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::collections::HashMap;
use std::str::FromStr;

static TEMPLATE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/templates");

const BUILTIN_SET: &str = "hiragana";

/// Difficulty tier of a character, ordered from easiest to hardest
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// A practicable character, shared by the template store, the selector and
/// the grading layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Character {
    pub glyph: String,
    pub romaji: String,
    pub difficulty: Difficulty,
    pub category: String,
}

/// Reference descriptor a drawing is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterTemplate {
    pub character: String,
    pub stroke_count: usize,
    pub features: FeatureSet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateEntry {
    character: String,
    romaji: String,
    category: String,
    difficulty: Difficulty,
    stroke_count: usize,
    features: FeatureSet,
}

#[derive(Deserialize)]
struct TemplateFile {
    name: String,
    characters: Vec<TemplateEntry>,
}

/// Static reference data: one template per supported character, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    pub name: String,
    characters: Vec<Character>,
    templates: HashMap<String, CharacterTemplate>,
    baseline: CharacterTemplate,
}

impl TemplateStore {
    /// Loads the embedded hiragana set
    pub fn builtin() -> Result<Self> {
        let file = TEMPLATE_DIR
            .get_file(format!("{BUILTIN_SET}.json"))
            .ok_or_else(|| Error::Template(format!("{BUILTIN_SET}.json not embedded")))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| Error::Template(format!("{BUILTIN_SET}.json is not utf-8")))?;
        Self::from_json(contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: TemplateFile = from_str(json)?;
        if file.characters.is_empty() {
            return Err(Error::Template(format!("set '{}' has no characters", file.name)));
        }

        let mut characters = Vec::with_capacity(file.characters.len());
        let mut templates = HashMap::with_capacity(file.characters.len());
        for entry in file.characters {
            if templates.contains_key(&entry.character) {
                return Err(Error::Template(format!(
                    "duplicate template for '{}'",
                    entry.character
                )));
            }
            characters.push(Character {
                glyph: entry.character.clone(),
                romaji: entry.romaji,
                difficulty: entry.difficulty,
                category: entry.category,
            });
            let mut features = entry.features;
            features.complexity = features.complexity.clamp(0.0, 1.0);
            templates.insert(
                entry.character.clone(),
                CharacterTemplate {
                    character: entry.character,
                    stroke_count: entry.stroke_count,
                    features,
                },
            );
        }

        Ok(Self {
            name: file.name,
            characters,
            templates,
            baseline: baseline_template(),
        })
    }

    pub fn get(&self, glyph: &str) -> Option<&CharacterTemplate> {
        self.templates.get(glyph)
    }

    /// Generic descriptor used when the target has no template of its own
    pub fn baseline(&self) -> &CharacterTemplate {
        &self.baseline
    }

    pub fn character(&self, glyph: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.glyph == glyph)
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

fn baseline_template() -> CharacterTemplate {
    CharacterTemplate {
        character: String::new(),
        stroke_count: 2,
        features: FeatureSet {
            has_horizontal_line: false,
            has_vertical_line: false,
            has_curve: true,
            complexity: 0.5,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_has_all_basic_hiragana() {
        let store = TemplateStore::builtin().unwrap();
        assert_eq!(store.name, "hiragana");
        assert_eq!(store.len(), 46);
        assert_eq!(store.characters()[0].glyph, "あ");
        assert_eq!(store.characters()[45].glyph, "ん");
    }

    #[test]
    fn builtin_templates_are_consistent() {
        let store = TemplateStore::builtin().unwrap();
        for character in store.characters() {
            let template = store.get(&character.glyph).unwrap();
            assert!(template.stroke_count >= 1, "{} has no strokes", character.glyph);
            assert!((0.0..=1.0).contains(&template.features.complexity));
        }

        let a = store.get("あ").unwrap();
        assert_eq!(a.stroke_count, 3);
        assert!(a.features.has_horizontal_line);
        assert!(a.features.has_vertical_line);
        assert!(a.features.has_curve);
    }

    #[test]
    fn every_difficulty_tier_is_populated() {
        let store = TemplateStore::builtin().unwrap();
        for tier in Difficulty::ALL {
            assert!(
                store.characters().iter().any(|c| c.difficulty == tier),
                "no characters in tier {tier}"
            );
        }
    }

    #[test]
    fn rejects_empty_and_duplicate_sets() {
        assert!(TemplateStore::from_json(r#"{"name":"x","characters":[]}"#).is_err());

        let dup = r#"{"name":"x","characters":[
            {"character":"か","romaji":"ka","category":"ka-row","difficulty":"easy","strokeCount":3,
             "features":{"hasHorizontalLine":true,"hasVerticalLine":true,"hasCurve":true,"complexity":0.7}},
            {"character":"か","romaji":"ka","category":"ka-row","difficulty":"easy","strokeCount":3,
             "features":{"hasHorizontalLine":true,"hasVerticalLine":true,"hasCurve":true,"complexity":0.7}}
        ]}"#;
        assert!(TemplateStore::from_json(dup).is_err());
    }

    #[test]
    fn difficulty_parsing_and_ordering() {
        assert_eq!("Medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert!("expert".parse::<Difficulty>().is_err());
        assert!(Difficulty::Easy < Difficulty::Hard);
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }

    #[test]
    fn unknown_glyph_has_no_template() {
        let store = TemplateStore::builtin().unwrap();
        assert!(store.get("A").is_none());
        assert_eq!(store.baseline().stroke_count, 2);
    }
}
