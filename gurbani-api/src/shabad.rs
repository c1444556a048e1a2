//! # Shabads
//!
//! A [`Shabad`] is one hymn/composition: metadata ([`ShabadInfo`]) and an ordered
//! sequence of [`Line`]s. Shabads are fetched wholesale and never mutated.
//!
//! ## Shabad methods on GurbaniClient
//!
//! - [shabad](GurbaniClient::shabad) - get a shabad by numeric id
//!
//! ```rust,no_run
//! use gurbani::prelude::*;
//! # async fn example(client: &GurbaniClient) -> Result<(), GurbaniError> {
//! let shabad = client.shabad(1).get().await?;
//! let first = &shabad.lines[0];
//! for word in first.words(VisraamSource::Sttm) {
//!     match word.visraam {
//!         Some(VisraamKind::Major) => print!("[{}] ", word.text),
//!         Some(VisraamKind::Minor) => print!("({}) ", word.text),
//!         None => print!("{} ", word.text),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Result, client::GurbaniClient, http_client::HttpRequest};

/// Source collection (granth) of a shabad
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Short id, for example "G" for Sri Guru Granth Sahib Ji
    pub id: String,
    #[serde(default)]
    pub english: String,
    #[serde(default)]
    pub unicode: String,
}

/// Author of a shabad
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Writer {
    pub id: u32,
    #[serde(default)]
    pub english: String,
}

/// Musical mode of a shabad
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Raag {
    pub id: u32,
    #[serde(default)]
    pub english: String,
    #[serde(default)]
    pub unicode: String,
}

/// Links to the logically previous and next shabads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    #[serde(default)]
    pub previous: Option<u32>,
    #[serde(default)]
    pub next: Option<u32>,
}

/// Shabad metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShabadInfo {
    pub shabad_id: u32,
    #[serde(default)]
    pub page_no: u32,
    pub source: SourceInfo,
    #[serde(default)]
    pub writer: Option<Writer>,
    #[serde(default)]
    pub raag: Option<Raag>,
    #[serde(default)]
    pub navigation: Navigation,
}

/// Strength of a visraam (pause) marker
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum VisraamKind {
    /// Short pause (yamki)
    #[serde(rename = "y")]
    Minor,
    /// Full pause
    #[serde(rename = "v")]
    Major,
}

/// Editorial source of visraam markings
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VisraamSource {
    #[default]
    Sttm,
    Igurbani,
}

/// A pause marker after the word at `position` (0-based word index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visraam {
    #[serde(rename = "p")]
    pub position: usize,
    #[serde(rename = "t")]
    pub kind: VisraamKind,
}

/// One line (verse) of a shabad
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// Stable external id of the verse
    #[serde(deserialize_with = "string_or_number")]
    pub verse_id: String,

    /// Ordinal position within the source
    #[serde(default)]
    pub line_no: u32,

    /// Primary script text (Gurmukhi unicode)
    #[serde(rename = "verse")]
    pub gurmukhi: String,

    /// Continuous-script rendering, if the api provides one
    #[serde(default)]
    pub larivaar: Option<String>,

    /// Transliterations keyed by script ("english", "hindi", "shahmukhi", ...)
    #[serde(default)]
    pub transliteration: BTreeMap<String, String>,

    /// Translations keyed by language ("en", "pu", "es"),
    /// then by translation source ("bdb", "ms", ...)
    #[serde(default)]
    pub translation: BTreeMap<String, BTreeMap<String, String>>,

    /// Pause markers keyed by visraam source ("sttm", "igurbani")
    #[serde(default)]
    pub visraam: BTreeMap<String, Vec<Visraam>>,
}

/// A word of a line, with the pause marker that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub visraam: Option<VisraamKind>,
}

impl Line {
    /// Returns the translation for language and source, for example `("en", "bdb")`
    pub fn translation(&self, language: &str, source: &str) -> Option<&str> {
        self.translation
            .get(language)
            .and_then(|by_source| by_source.get(source))
            .map(String::as_str)
    }

    /// Returns any translation in the language, preferring `source` if present
    pub fn translation_or_any(&self, language: &str, source: &str) -> Option<&str> {
        self.translation(language, source).or_else(|| {
            self.translation
                .get(language)
                .and_then(|by_source| by_source.values().next())
                .map(String::as_str)
        })
    }

    pub fn transliteration(&self, script: &str) -> Option<&str> {
        self.transliteration.get(script).map(String::as_str)
    }

    /// Splits the line into words, attaching the visraam marker (from `source`) that
    /// follows each word. If a position is marked more than once, the stronger marker wins.
    pub fn words(&self, source: VisraamSource) -> Vec<Word<'_>> {
        let markers = self.visraam.get(source.to_string().as_str());
        self.gurmukhi
            .split_whitespace()
            .enumerate()
            .map(|(position, text)| {
                let visraam = markers.and_then(|markers| {
                    markers
                        .iter()
                        .filter(|mark| mark.position == position)
                        .map(|mark| mark.kind)
                        .max_by_key(|kind| matches!(kind, VisraamKind::Major))
                });
                Word { text, visraam }
            })
            .collect()
    }

    /// Text for display. Larivaar joins the words without spaces, using the api's
    /// larivaar rendering when present.
    pub fn display_text(&self, larivaar: bool) -> String {
        if !larivaar {
            return self.gurmukhi.clone();
        }
        self.larivaar.clone().unwrap_or_else(|| {
            self.gurmukhi.split_whitespace().collect::<Vec<_>>().concat()
        })
    }
}

/// One shabad: metadata and ordered lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shabad {
    #[serde(rename = "shabadInfo")]
    pub info: ShabadInfo,
    #[serde(rename = "verses")]
    pub lines: Vec<Line>,
}

impl Shabad {
    pub fn id(&self) -> u32 {
        self.info.shabad_id
    }

    /// Returns the line at `index`
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Title of the shabad: the text of its first line
    pub fn title(&self) -> &str {
        self.lines.first().map_or("", |line| line.gurmukhi.as_str())
    }

    /// Index of the line with the given verse id
    pub fn position_of_verse(&self, verse_id: &str) -> Option<usize> {
        self.lines.iter().position(|line| line.verse_id == verse_id)
    }
}

// accept verse ids written as json numbers or strings
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Str(String),
        Num(u64),
    }
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(value) => value,
        StringOrNumber::Num(value) => value.to_string(),
    })
}

// ============================================================================
// REQUEST BUILDERS
// ============================================================================

/// Request builder for getting a single shabad
#[derive(Debug)]
pub struct ShabadRequest<'a> {
    client: &'a GurbaniClient,
    shabad_id: u32,
}

impl<'a> ShabadRequest<'a> {
    pub(crate) fn new(client: &'a GurbaniClient, shabad_id: u32) -> Self {
        Self { client, shabad_id }
    }

    /// Fetches the shabad.
    pub async fn get(self) -> Result<Shabad> {
        let req = HttpRequest::get(["shabad".to_string(), self.shabad_id.to_string()]);
        self.client.http().get_json(req, "Shabad").await
    }
}

impl GurbaniClient {
    /// Returns a request builder for fetching a shabad by id.
    pub fn shabad(&self, shabad_id: u32) -> ShabadRequest<'_> {
        ShabadRequest::new(self, shabad_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
          "shabadInfo": {
            "shabadId": 1,
            "pageNo": 1,
            "source": {
                "id": "G",
                "english": "Sri Guru Granth Sahib Ji",
                "unicode": "ਸ੍ਰੀ ਗੁਰੂ ਗ੍ਰੰਥ ਸਾਹਿਬ ਜੀ"
            },
            "writer": {"id": 1, "english": "Guru Nanak Dev Ji"},
            "raag": {"id": 1, "english": "Jap", "unicode": "ਜਪੁ"},
            "navigation": {"previous": null, "next": 2}
          },
          "verses": [
            {
              "verseId": 1,
              "lineNo": 1,
              "verse": "ੴ ਸਤਿ ਨਾਮੁ ਕਰਤਾ ਪੁਰਖੁ",
              "transliteration": {"english": "ik oankaar sat naam karataa purakh"},
              "translation": {"en": {"bdb": "One Universal Creator God."}},
              "visraam": {"sttm": [{"p": 2, "t": "y"}, {"p": 2, "t": "v"}, {"p": 4, "t": "y"}]}
            },
            {
              "verseId": "2",
              "lineNo": 2,
              "verse": "ਆਦਿ ਸਚੁ ਜੁਗਾਦਿ ਸਚੁ"
            }
          ]
        }"#
    }

    #[test]
    fn test_deserialize_shabad() {
        let shabad: Shabad = serde_json::from_str(sample_json()).expect("deserialize");
        assert_eq!(shabad.id(), 1);
        assert_eq!(shabad.info.source.id, "G");
        assert_eq!(shabad.info.navigation.previous, None);
        assert_eq!(shabad.info.navigation.next, Some(2));
        assert_eq!(shabad.lines.len(), 2);
        assert_eq!(shabad.lines[0].verse_id, "1");
        assert_eq!(shabad.lines[1].verse_id, "2");
        assert_eq!(shabad.title(), "ੴ ਸਤਿ ਨਾਮੁ ਕਰਤਾ ਪੁਰਖੁ");
        assert_eq!(
            shabad.lines[0].translation("en", "bdb"),
            Some("One Universal Creator God.")
        );
        assert_eq!(shabad.position_of_verse("2"), Some(1));
    }

    #[test]
    fn test_words_with_visraam() {
        let shabad: Shabad = serde_json::from_str(sample_json()).expect("deserialize");
        let words = shabad.lines[0].words(VisraamSource::Sttm);
        assert_eq!(words.len(), 5);
        assert_eq!(words[0].visraam, None);
        // stronger marker wins when a position is marked twice
        assert_eq!(words[2].visraam, Some(VisraamKind::Major));
        assert_eq!(words[4].visraam, Some(VisraamKind::Minor));

        let igurbani = shabad.lines[0].words(VisraamSource::Igurbani);
        assert!(igurbani.iter().all(|word| word.visraam.is_none()));
    }

    #[test]
    fn test_display_text_larivaar() {
        let shabad: Shabad = serde_json::from_str(sample_json()).expect("deserialize");
        let line = &shabad.lines[1];
        assert_eq!(line.display_text(false), "ਆਦਿ ਸਚੁ ਜੁਗਾਦਿ ਸਚੁ");
        assert_eq!(line.display_text(true), "ਆਦਿਸਚੁਜੁਗਾਦਿਸਚੁ");
    }

    #[test]
    fn test_translation_or_any() {
        let shabad: Shabad = serde_json::from_str(sample_json()).expect("deserialize");
        let line = &shabad.lines[0];
        assert_eq!(
            line.translation_or_any("en", "ms"),
            Some("One Universal Creator God.")
        );
        assert_eq!(line.translation_or_any("es", "sn"), None);
    }
}
