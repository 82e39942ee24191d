//! Orthographic normalization for classical-language tokens.
//!
//! Every comparison between a passage token and a piece of match evidence
//! goes through [`normalize`], so that spelling conventions do not hide a
//! match:
//!
//! | Language | Rule |
//! |----------|------|
//! | Latin | lower-case, then `v` → `u` |
//! | Greek | lower-case, NFD, strip U+0300–U+036F, `ς` → `σ` |
//! | English / other | lower-case |
//!
//! [`to_display_form`] goes the other way for Greek and restores final
//! sigma for rendering. It is never used for comparison.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Language;

const COMBINING_START: char = '\u{0300}';
const COMBINING_END: char = '\u{036F}';

/// Map a raw token to its comparable canonical form. Idempotent.
pub fn normalize(token: &str, language: Language) -> String {
    let lower = token.to_lowercase();
    match language {
        Language::Latin => lower.replace('v', "u"),
        Language::Greek => strip_diacritics(&lower).replace('ς', "σ"),
        Language::English | Language::Other => lower,
    }
}

/// Decompose and drop the combining diacritical marks block.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd()
        .filter(|c| !(COMBINING_START..=COMBINING_END).contains(c))
        .collect()
}

/// Render word-final `σ` as `ς`.
///
/// A sigma is final when it follows a letter and precedes whitespace,
/// punctuation, or the end of the string.
pub fn to_display_form(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == 'σ' {
            let after_letter = i > 0 && is_word_char(chars[i - 1]);
            let at_boundary = match chars.get(i + 1) {
                None => true,
                Some(next) => next.is_whitespace() || is_punctuation(*next),
            };
            if after_letter && at_boundary {
                out.push('ς');
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// A word of passage text with its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split text into word tokens, dropping whitespace and punctuation.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if is_word_char(c) {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            tokens.push(Token {
                text: text[s..i].to_string(),
                start: s,
                end: i,
            });
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: text[s..].to_string(),
            start: s,
            end: text.len(),
        });
    }

    tokens
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_combining_mark(c)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '·' | '\u{037E}' | '’' | '‘' | '“' | '”' | '«' | '»' | '—'
        )
}
