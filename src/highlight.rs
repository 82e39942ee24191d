//! Match highlight resolution.
//!
//! Given a passage and the evidence the server sent for a match, decide
//! which tokens of the passage are marked as matched. Evidence arrives in
//! several partial shapes, so resolution runs a fixed sequence of rules.
//! Each rule only adds tokens; a token keeps the first rule that matched it.
//!
//! | Priority | Rule | Evidence | Comparison |
//! |----------|------|----------|------------|
//! | 1 | [`HighlightRule::IndexExact`] | `tokens` + `highlightIndices` | by index, verbatim |
//! | 2 | [`HighlightRule::SurfaceForm`] | `source_word` / `target_word` | whole token |
//! | 2 | [`HighlightRule::Lemma`] | literal `lemma` / `display` | whole token |
//! | 3 | [`HighlightRule::Ngram`] | `[..]` / `~` notation | substring |
//! | 4 | [`HighlightRule::StemPrefix`] | semantic evidence + other passage | stem prefix |
//!
//! Tokens and candidates are compared by their [`normalize`]d form and by
//! that form with diacritics stripped.
//!
//! # Stem-prefix heuristic
//!
//! Semantic matches carry no word-level evidence, so rule 4 approximates
//! one: a token of at least four characters matches when some token of
//! the other passage (also at least four characters) starts with its first
//! `min(len - 1, 5)` characters. It only runs when an evidence item has a
//! `similarity` score or the lemma `"semantic"`.
//!
//! [`resolve`] is pure: it never mutates its inputs, and identical inputs
//! always give identical [`Highlights`].

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::{Language, MatchEvidenceItem, Passage};
use crate::normalize::{normalize, strip_diacritics, tokenize};

/// Lemma value that marks an evidence set as semantic.
pub const SEMANTIC_SENTINEL: &str = "semantic";

const MIN_NGRAM_CHARS: usize = 2;
const MIN_STEM_TOKEN_CHARS: usize = 4;
const MAX_STEM_CHARS: usize = 5;

/// Which rule justified a highlighted token. Ordered by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HighlightRule {
    IndexExact,
    SurfaceForm,
    Lemma,
    Ngram,
    StemPrefix,
}

impl HighlightRule {
    pub fn label(&self) -> &'static str {
        match self {
            HighlightRule::IndexExact => "index",
            HighlightRule::SurfaceForm => "surface",
            HighlightRule::Lemma => "lemma",
            HighlightRule::Ngram => "ngram",
            HighlightRule::StemPrefix => "stem",
        }
    }
}

/// Which side of a match a passage is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Side::Source),
            "target" => Ok(Side::Target),
            other => Err(format!("Unknown side: '{}'. Use source or target.", other)),
        }
    }
}

/// One highlighted token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HighlightSpan {
    /// Position in the passage's token sequence.
    pub index: usize,
    pub token: String,
    /// Byte range in the passage text, when the token could be located.
    pub range: Option<(usize, usize)>,
    pub rule: HighlightRule,
}

/// The set of highlighted tokens of one passage, keyed by token index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlights {
    spans: BTreeMap<usize, HighlightSpan>,
}

impl Highlights {
    fn insert(&mut self, span: HighlightSpan) {
        self.spans.entry(span.index).or_insert(span);
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Spans in token order.
    pub fn iter(&self) -> impl Iterator<Item = &HighlightSpan> {
        self.spans.values()
    }

    pub fn contains_index(&self, index: usize) -> bool {
        self.spans.contains_key(&index)
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.spans.values().any(|s| s.token == token)
    }

    pub fn rule_for(&self, index: usize) -> Option<HighlightRule> {
        self.spans.get(&index).map(|s| s.rule)
    }

    /// Highlighted token texts in token order.
    pub fn tokens(&self) -> Vec<&str> {
        self.spans.values().map(|s| s.token.as_str()).collect()
    }

    /// Wrap every located span of `text` in `open` / `close` markers.
    pub fn render(&self, text: &str, open: &str, close: &str) -> String {
        let mut ranges: Vec<(usize, usize)> = self
            .spans
            .values()
            .filter_map(|s| s.range)
            .filter(|&(start, end)| {
                start < end
                    && end <= text.len()
                    && text.is_char_boundary(start)
                    && text.is_char_boundary(end)
            })
            .collect();
        ranges.sort_unstable();

        let mut out = String::with_capacity(text.len() + ranges.len() * (open.len() + close.len()));
        let mut cursor = 0;
        for (start, end) in ranges {
            if start < cursor {
                continue;
            }
            out.push_str(&text[cursor..start]);
            out.push_str(open);
            out.push_str(&text[start..end]);
            out.push_str(close);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Compute the highlighted tokens of `passage`.
///
/// `side` picks which surface word of each evidence item applies to this
/// passage. `other` is the passage on the opposite side of the match; it is
/// only consulted by the stem-prefix heuristic.
pub fn resolve(
    passage: &Passage,
    evidence: &[MatchEvidenceItem],
    language: Language,
    side: Side,
    other: Option<&Passage>,
) -> Highlights {
    let tokens = passage_tokens(passage, language);
    let mut highlights = Highlights::default();

    // 1. index-exact
    if let (Some(server_tokens), Some(indices)) = (&passage.tokens, &passage.highlight_indices) {
        if !server_tokens.is_empty() {
            for &index in indices {
                if let Some(token) = tokens.get(index) {
                    highlights.insert(token.span(index, HighlightRule::IndexExact));
                }
            }
        }
    }

    // 2. surface / lemma, 3. n-gram
    let candidates = Candidates::collect(evidence, language, side);
    if !candidates.is_empty() {
        for (index, token) in tokens.iter().enumerate() {
            if let Some(rule) = candidates.match_token(&token.keys) {
                highlights.insert(token.span(index, rule));
            }
        }
    }

    // 4. stem-prefix heuristic
    if is_semantic(evidence) {
        if let Some(other) = other {
            let other_forms: Vec<String> = passage_tokens(other, language)
                .into_iter()
                .map(|t| t.normalized)
                .filter(|n| n.chars().count() >= MIN_STEM_TOKEN_CHARS)
                .collect();
            for (index, token) in tokens.iter().enumerate() {
                if let Some(stem) = stem_of(&token.normalized) {
                    if other_forms.iter().any(|o| o.starts_with(stem.as_str())) {
                        highlights.insert(token.span(index, HighlightRule::StemPrefix));
                    }
                }
            }
        }
    }

    highlights
}

/// Whether the evidence set comes from a semantic match.
pub fn is_semantic(evidence: &[MatchEvidenceItem]) -> bool {
    evidence
        .iter()
        .any(|e| e.similarity.is_some() || e.lemma.as_deref() == Some(SEMANTIC_SENTINEL))
}

/// Whether a lemma/display value is n-gram notation rather than a word.
pub fn is_ngram_notation(value: &str) -> bool {
    value.contains(['[', ']', '~'])
}

/// Split n-gram notation such as `"[φά], [εὐφρον]"` into normalized
/// fragments of at least two characters.
pub fn ngram_fragments(notation: &str, language: Language) -> Vec<String> {
    let mut fragments: Vec<String> = Vec::new();
    for piece in notation.split(|c: char| matches!(c, ' ' | '[' | ']' | ',' | '~')) {
        if piece.chars().count() < MIN_NGRAM_CHARS {
            continue;
        }
        let normalized = normalize(piece, language);
        if !fragments.contains(&normalized) {
            fragments.push(normalized);
        }
    }
    fragments
}

fn stem_of(normalized: &str) -> Option<String> {
    let len = normalized.chars().count();
    if len < MIN_STEM_TOKEN_CHARS {
        return None;
    }
    Some(normalized.chars().take((len - 1).min(MAX_STEM_CHARS)).collect())
}

/// Normalized form plus its diacritic-free variant, deduplicated.
fn comparison_keys(raw: &str, language: Language) -> Vec<String> {
    let normalized = normalize(raw.trim(), language);
    if normalized.is_empty() {
        return Vec::new();
    }
    let stripped = strip_diacritics(&normalized);
    if stripped == normalized {
        vec![normalized]
    } else {
        vec![normalized, stripped]
    }
}

struct PassageToken {
    text: String,
    range: Option<(usize, usize)>,
    normalized: String,
    keys: Vec<String>,
}

impl PassageToken {
    fn new(text: String, range: Option<(usize, usize)>, language: Language) -> Self {
        let normalized = normalize(&text, language);
        let keys = comparison_keys(&text, language);
        Self {
            text,
            range,
            normalized,
            keys,
        }
    }

    fn span(&self, index: usize, rule: HighlightRule) -> HighlightSpan {
        HighlightSpan {
            index,
            token: self.text.clone(),
            range: self.range,
            rule,
        }
    }
}

/// The passage's token sequence: the server's `tokens` when present,
/// otherwise words split from `text`.
fn passage_tokens(passage: &Passage, language: Language) -> Vec<PassageToken> {
    let words = tokenize(&passage.text);

    let server_tokens = match &passage.tokens {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => {
            return words
                .into_iter()
                .map(|w| PassageToken::new(w.text, Some((w.start, w.end)), language))
                .collect();
        }
    };

    // Locate each server token in the text, left to right. Server tokens
    // may already be normalized, so words are compared both ways before
    // falling back to a raw substring search.
    let mut cursor = 0;
    server_tokens
        .iter()
        .map(|token| {
            let mut range = None;
            if !token.is_empty() {
                let wanted = normalize(token, language);
                range = words
                    .iter()
                    .find(|w| {
                        w.start >= cursor
                            && (w.text == *token || normalize(&w.text, language) == wanted)
                    })
                    .map(|w| (w.start, w.end))
                    .or_else(|| {
                        passage
                            .text
                            .get(cursor..)
                            .and_then(|rest| rest.find(token.as_str()))
                            .map(|pos| (cursor + pos, cursor + pos + token.len()))
                    });
            }
            if let Some((_, end)) = range {
                cursor = end;
            }
            PassageToken::new(token.clone(), range, language)
        })
        .collect()
}

struct Candidates {
    literal: Vec<(Vec<String>, HighlightRule)>,
    ngrams: Vec<Vec<String>>,
}

impl Candidates {
    fn collect(evidence: &[MatchEvidenceItem], language: Language, side: Side) -> Self {
        let mut literal = Vec::new();
        let mut ngrams = Vec::new();

        for item in evidence {
            let word = match side {
                Side::Source => item.source_word.as_deref(),
                Side::Target => item.target_word.as_deref(),
            };
            if let Some(word) = word {
                let keys = comparison_keys(word, language);
                if !keys.is_empty() {
                    literal.push((keys, HighlightRule::SurfaceForm));
                }
            }

            for value in [item.lemma.as_deref(), item.display.as_deref()]
                .into_iter()
                .flatten()
            {
                if is_ngram_notation(value) {
                    for fragment in ngram_fragments(value, language) {
                        let keys = comparison_keys(&fragment, language);
                        if !keys.is_empty() {
                            ngrams.push(keys);
                        }
                    }
                } else if value != SEMANTIC_SENTINEL {
                    let keys = comparison_keys(value, language);
                    if !keys.is_empty() {
                        literal.push((keys, HighlightRule::Lemma));
                    }
                }
            }
        }

        Self { literal, ngrams }
    }

    fn is_empty(&self) -> bool {
        self.literal.is_empty() && self.ngrams.is_empty()
    }

    fn match_token(&self, token_keys: &[String]) -> Option<HighlightRule> {
        let literal = self
            .literal
            .iter()
            .filter(|(keys, _)| keys.iter().any(|k| token_keys.contains(k)))
            .map(|(_, rule)| *rule)
            .min();
        if literal.is_some() {
            return literal;
        }

        let ngram = self.ngrams.iter().any(|keys| {
            keys.iter()
                .any(|k| token_keys.iter().any(|t| t.contains(k.as_str())))
        });
        ngram.then_some(HighlightRule::Ngram)
    }
}
