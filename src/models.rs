//! Core data models used throughout the search client.
//!
//! These types represent the requests, passages, and match evidence that
//! flow between the search server and the highlight engine. Wire shapes
//! follow the server's JSON; optional fields default rather than fail.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Language of the texts being compared. Drives orthographic normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Latin,
    Greek,
    English,
    Other,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "la" | "lat" | "latin" => Ok(Language::Latin),
            "grc" | "greek" => Ok(Language::Greek),
            "en" | "english" => Ok(Language::English),
            "other" => Ok(Language::Other),
            other => Err(format!(
                "Unknown language: '{}'. Use latin, greek, english, or other.",
                other
            )),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Latin => "latin",
            Language::Greek => "greek",
            Language::English => "english",
            Language::Other => "other",
        };
        f.write_str(name)
    }
}

/// How the server should match words between source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Lemma,
    Exact,
    Sound,
    Edit,
    Semantic,
    /// Cross-lingual semantic search. Answered with a single JSON body
    /// instead of the event stream.
    SemanticCross,
}

impl MatchType {
    pub fn is_streaming(&self) -> bool {
        !matches!(self, MatchType::SemanticCross)
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lemma" => Ok(MatchType::Lemma),
            "exact" => Ok(MatchType::Exact),
            "sound" => Ok(MatchType::Sound),
            "edit" => Ok(MatchType::Edit),
            "semantic" => Ok(MatchType::Semantic),
            "semantic_cross" | "semantic-cross" => Ok(MatchType::SemanticCross),
            other => Err(format!(
                "Unknown match type: '{}'. Use lemma, exact, sound, edit, semantic, or semantic_cross.",
                other
            )),
        }
    }
}

/// Parameters of one comparison. Consumed once by a search session.
///
/// `settings` is passed through to the server untouched (stoplist size,
/// minimum score, bigram/hapax switches and the like).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub source: String,
    pub target: String,
    pub language: Language,
    pub match_type: MatchType,
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl SearchRequest {
    pub fn new(source: impl Into<String>, target: impl Into<String>, language: Language) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            language,
            match_type: MatchType::Lemma,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// A span of text returned by the server.
///
/// `tokens`, when present, is the punctuation-free split of `text` that
/// `highlight_indices` indexes into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
    #[serde(
        default,
        rename = "highlightIndices",
        alias = "highlight_indices",
        skip_serializing_if = "Option::is_none"
    )]
    pub highlight_indices: Option<Vec<usize>>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: None,
            highlight_indices: None,
        }
    }
}

/// One piece of evidence the server offers for a match.
///
/// Items are partial: any subset of fields may be present. A `lemma` or
/// `display` containing `[`, `]` or `~` is n-gram notation, not a word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchEvidenceItem {
    #[serde(default, alias = "sourceWord", skip_serializing_if = "Option::is_none")]
    pub source_word: Option<String>,
    #[serde(default, alias = "targetWord", skip_serializing_if = "Option::is_none")]
    pub target_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// A ranked match: the matched passage plus whatever evidence came with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub passage: Passage,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub locus: Option<String>,
    #[serde(default, alias = "matchedWords")]
    pub matched_words: Vec<MatchEvidenceItem>,
    /// Paired passage on the target side, when the server sends pairs.
    #[serde(default)]
    pub target: Option<Passage>,
}

/// Payload of a `complete` event, and the body of the non-streaming endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<MatchResult>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    #[serde(default)]
    pub source_lines: Option<u64>,
    #[serde(default)]
    pub target_lines: Option<u64>,
    #[serde(default)]
    pub total_matches: Option<u64>,
}

impl SearchResults {
    /// Completion synthesized when a stream ends without a terminal event.
    pub fn empty() -> Self {
        Self {
            total_matches: Some(0),
            ..Self::default()
        }
    }

    pub fn total_matches(&self) -> u64 {
        self.total_matches.unwrap_or(self.results.len() as u64)
    }
}
