//! Text analysis for the in-memory store.
//!
//! Reproduces the analyzers declared by the package index schema closely
//! enough that matching in [`MemoryStore`](crate::MemoryStore) behaves like
//! the real engine:
//!
//! - identifier analyzer: pattern tokenizer, word-delimiter filter, lowercase
//! - identifier keyword analyzer: the whole input as one lowercase token
//! - standard analyzer: Unicode word boundaries, lowercase
//!
//! The identifier tokenizer pattern and the word-delimiter flags are read
//! from the schema settings, so a custom schema changes matching here too.

use nusearch_core::schema::{ID_TOKENIZER, ID_TOKENIZER_PATTERN, ID_WORD_FILTER};
use nusearch_core::{Error, IndexSchema, Result};
use regex::Regex;
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

/// Word-delimiter token filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordDelimiter {
    /// Split `fooBar` into `foo`, `Bar`.
    pub split_on_case_change: bool,
    /// Split `log4net` into `log`, `4`, `net`.
    pub split_on_numerics: bool,
    /// Keep the unsplit token alongside its parts.
    pub preserve_original: bool,
    /// Emit alphabetic parts.
    pub generate_word_parts: bool,
    /// Emit numeric parts.
    pub generate_number_parts: bool,
}

impl Default for WordDelimiter {
    fn default() -> Self {
        Self {
            split_on_case_change: true,
            split_on_numerics: true,
            preserve_original: false,
            generate_word_parts: true,
            generate_number_parts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    Delimiter,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_uppercase() {
            Self::Upper
        } else if c.is_alphabetic() {
            Self::Lower
        } else if c.is_numeric() {
            Self::Digit
        } else {
            Self::Delimiter
        }
    }

    fn is_alpha(self) -> bool {
        matches!(self, Self::Lower | Self::Upper)
    }
}

impl WordDelimiter {
    fn from_settings(filter: Option<&Value>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str, default: bool| {
            filter
                .and_then(|f| f.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(default)
        };
        Self {
            split_on_case_change: flag("split_on_case_change", defaults.split_on_case_change),
            split_on_numerics: flag("split_on_numerics", defaults.split_on_numerics),
            preserve_original: flag("preserve_original", defaults.preserve_original),
            generate_word_parts: flag("generate_word_parts", defaults.generate_word_parts),
            generate_number_parts: flag("generate_number_parts", defaults.generate_number_parts),
        }
    }

    /// Apply the filter to one token.
    pub fn filter(&self, token: &str) -> Vec<String> {
        let parts = self.split(token);

        // A token that needs no splitting passes through untouched.
        if parts.len() == 1 && parts[0].1 == token {
            return vec![token.to_string()];
        }

        let mut out = Vec::with_capacity(parts.len() + 1);
        if self.preserve_original {
            out.push(token.to_string());
        }
        for (class, part) in parts {
            let wanted = match class {
                CharClass::Digit => self.generate_number_parts,
                _ => self.generate_word_parts,
            };
            if wanted {
                out.push(part.to_string());
            }
        }
        out
    }

    fn split<'a>(&self, token: &'a str) -> Vec<(CharClass, &'a str)> {
        let mut parts = Vec::new();
        let mut start: Option<(usize, CharClass)> = None;
        let mut last = CharClass::Delimiter;

        for (pos, c) in token.char_indices() {
            let class = CharClass::of(c);
            if class == CharClass::Delimiter {
                if let Some((begin, first)) = start.take() {
                    parts.push((first, &token[begin..pos]));
                }
                last = class;
                continue;
            }

            if let Some((begin, first)) = start {
                if self.is_break(last, class) {
                    parts.push((first, &token[begin..pos]));
                    start = Some((pos, class));
                }
            } else {
                start = Some((pos, class));
            }
            last = class;
        }
        if let Some((begin, first)) = start {
            parts.push((first, &token[begin..]));
        }
        parts
    }

    fn is_break(&self, last: CharClass, next: CharClass) -> bool {
        match (last, next) {
            (CharClass::Lower, CharClass::Upper) => self.split_on_case_change,
            (a, b) if a.is_alpha() && b.is_alpha() => false,
            (a, b) if a == b => false,
            _ => self.split_on_numerics,
        }
    }
}

/// One analyzer.
#[derive(Debug, Clone)]
pub enum Analyzer {
    /// Pattern tokenizer, word-delimiter filter, lowercase.
    Identifier {
        /// Token separator.
        pattern: Regex,
        /// Sub-word filter.
        words: WordDelimiter,
    },
    /// Whole input, lowercased.
    Keyword,
    /// Unicode words, lowercased.
    Standard,
}

impl Analyzer {
    /// Turn text into index terms.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        match self {
            Self::Identifier { pattern, words } => pattern
                .split(text)
                .filter(|token| !token.is_empty())
                .flat_map(|token| words.filter(token))
                .map(|term| term.to_lowercase())
                .collect(),
            Self::Keyword if text.is_empty() => Vec::new(),
            Self::Keyword => vec![text.to_lowercase()],
            Self::Standard => text.unicode_words().map(str::to_lowercase).collect(),
        }
    }
}

/// The analyzers of one index.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Analyzer of the `id` field.
    pub id: Analyzer,
    /// Analyzer of the `id.keyword` sub-field.
    pub id_keyword: Analyzer,
    /// Analyzer of plain text fields.
    pub standard: Analyzer,
}

impl Analysis {
    /// Build the analyzers declared by `schema`.
    pub fn from_schema(schema: &IndexSchema) -> Result<Self> {
        let analysis = schema.settings.get("analysis");
        let pattern = analysis
            .and_then(|a| a.pointer(&format!("/tokenizer/{ID_TOKENIZER}/pattern")))
            .and_then(Value::as_str)
            .unwrap_or(ID_TOKENIZER_PATTERN);
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid tokenizer pattern '{pattern}': {e}")))?;
        let words = WordDelimiter::from_settings(
            analysis.and_then(|a| a.pointer(&format!("/filter/{ID_WORD_FILTER}"))),
        );

        Ok(Self {
            id: Analyzer::Identifier { pattern, words },
            id_keyword: Analyzer::Keyword,
            standard: Analyzer::Standard,
        })
    }
}
