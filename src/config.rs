//! Configuration builders controlling log parsing and tokenizer training.

use serde::{Deserialize, Serialize};

use crate::error::{ChatprepError, Result};

/// Number of trailing lines read from each log file.
pub const DEFAULT_LINE_WINDOW: usize = 1_048_560;

/// System lines emitted by the exporter that never carry user content.
pub const DEFAULT_OMITTED_PHRASES: [&str; 5] = [
    "<media omitted>",
    "messages to this chat and calls are now secured with end-to-end encryption. tap for more info.",
    "you deleted this message",
    "this message was deleted",
    "missed voice call",
];

/// Order of the two leading date fields of a log line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DateOrder {
    /// `day/month/year`, the layout of most non-US exports.
    #[default]
    DayMonthYear,
    /// `month/day/year`, the US export layout.
    MonthDayYear,
}

/// Time zone in which the wall-clock timestamps of a log are interpreted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClockZone {
    /// The zone of the machine running the parser.
    #[default]
    Local,
    /// Coordinated universal time.
    Utc,
}

/// Settings for the single-line decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecoderConfig {
    /// Which of the two leading date fields is the day.
    pub date_order: DateOrder,
    /// Zone used to turn wall-clock fields into an absolute timestamp.
    pub clock_zone: ClockZone,
    /// Lowercase phrases that cause a line to be rejected outright.
    pub omitted_phrases: Vec<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            date_order: DateOrder::default(),
            clock_zone: ClockZone::default(),
            omitted_phrases: DEFAULT_OMITTED_PHRASES
                .iter()
                .map(|phrase| (*phrase).to_string())
                .collect(),
        }
    }
}

/// Configuration for reading and parsing chat logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    /// Worker count for chunked parsing and filtering; `None` uses the Rayon default.
    pub workers: Option<usize>,
    /// Only the last `line_window` lines of every file are considered.
    pub line_window: usize,
    /// Expands directory inputs into the files they contain.
    pub recursive: bool,
    /// Follows symlinks encountered during recursive expansion.
    pub follow_symlinks: bool,
    /// Line decoder settings.
    pub decoder: DecoderConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            workers: None,
            line_window: DEFAULT_LINE_WINDOW,
            recursive: false,
            follow_symlinks: false,
            decoder: DecoderConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Returns a builder initialised with [`ParserConfig::default`].
    #[must_use]
    pub fn builder() -> ParserBuilder {
        ParserBuilder::default()
    }

    /// Resolves the effective number of workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(rayon::current_num_threads).max(1)
    }

    /// Validates the invariants required for parsing.
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(ChatprepError::InvalidConfig(
                "workers must be greater than zero".into(),
            ));
        }
        if self.line_window == 0 {
            return Err(ChatprepError::InvalidConfig(
                "line_window must be greater than zero".into(),
            ));
        }
        if let Some(phrase) = self
            .decoder
            .omitted_phrases
            .iter()
            .find(|phrase| phrase.is_empty())
        {
            return Err(ChatprepError::InvalidConfig(format!(
                "omitted phrase {phrase:?} would reject every line"
            )));
        }
        Ok(())
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Default, Clone)]
pub struct ParserBuilder {
    cfg: ParserConfig,
}

impl ParserBuilder {
    /// Creates a builder with [`ParserConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed worker count.
    #[must_use]
    pub fn workers(mut self, value: usize) -> Self {
        self.cfg.workers = Some(value);
        self
    }

    /// Sets the trailing line window read from each file.
    #[must_use]
    pub fn line_window(mut self, value: usize) -> Self {
        self.cfg.line_window = value;
        self
    }

    /// Enables or disables recursive directory expansion.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks during directory expansion.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Sets the date field order.
    #[must_use]
    pub fn date_order(mut self, order: DateOrder) -> Self {
        self.cfg.decoder.date_order = order;
        self
    }

    /// Sets the clock zone used for timestamps.
    #[must_use]
    pub fn clock_zone(mut self, zone: ClockZone) -> Self {
        self.cfg.decoder.clock_zone = zone;
        self
    }

    /// Replaces the placeholder phrases that reject a line.
    #[must_use]
    pub fn omitted_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.decoder.omitted_phrases = phrases
            .into_iter()
            .map(|phrase| phrase.into().to_lowercase())
            .collect();
        self
    }

    /// Finalises the builder, returning a validated [`ParserConfig`].
    pub fn build(self) -> Result<ParserConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration for training a WordPiece tokenizer on a flattened corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenizerConfig {
    /// Minimum number of occurrences before a merge is learned.
    pub min_frequency: u64,
    /// Maximum number of distinct initial characters kept in the alphabet.
    pub limit_alphabet: usize,
    /// Target vocabulary size including special tokens.
    pub vocab_size: usize,
    /// Special tokens placed at the start of the vocabulary.
    pub special_tokens: Vec<String>,
    /// Shows the trainer's own progress bar.
    pub show_progress: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_frequency: 6,
            limit_alphabet: 150,
            vocab_size: 30_000,
            special_tokens: vec![
                "[PAD]".into(),
                "[UNK]".into(),
                "[CLS]".into(),
                "[SEP]".into(),
                "[MASK]".into(),
            ],
            show_progress: false,
        }
    }
}

impl TokenizerConfig {
    /// Returns a builder initialised with [`TokenizerConfig::default`].
    #[must_use]
    pub fn builder() -> TokenizerBuilder {
        TokenizerBuilder::default()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if self.min_frequency == 0 {
            return Err(ChatprepError::InvalidConfig(
                "min_frequency must be greater than zero".into(),
            ));
        }
        if self.limit_alphabet == 0 {
            return Err(ChatprepError::InvalidConfig(
                "limit_alphabet must be greater than zero".into(),
            ));
        }
        if self.vocab_size <= self.special_tokens.len() {
            return Err(ChatprepError::InvalidConfig(format!(
                "vocab_size ({}) must exceed the number of special tokens ({})",
                self.vocab_size,
                self.special_tokens.len()
            )));
        }
        if !self.special_tokens.iter().any(|token| token == "[UNK]") {
            return Err(ChatprepError::InvalidConfig(
                "special_tokens must include the [UNK] token".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`TokenizerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TokenizerBuilder {
    cfg: TokenizerConfig,
}

impl TokenizerBuilder {
    /// Creates a builder with [`TokenizerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum merge frequency.
    #[must_use]
    pub fn min_frequency(mut self, value: u64) -> Self {
        self.cfg.min_frequency = value;
        self
    }

    /// Sets the alphabet size limit.
    #[must_use]
    pub fn limit_alphabet(mut self, value: usize) -> Self {
        self.cfg.limit_alphabet = value;
        self
    }

    /// Sets the target vocabulary size.
    #[must_use]
    pub fn vocab_size(mut self, value: usize) -> Self {
        self.cfg.vocab_size = value;
        self
    }

    /// Overrides the special tokens.
    #[must_use]
    pub fn special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables the trainer progress bar.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`TokenizerConfig`].
    pub fn build(mut self) -> Result<TokenizerConfig> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.cfg
            .special_tokens
            .retain(|token| seen.insert(token.clone()));
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_builder_overrides_defaults() {
        let cfg = ParserConfig::builder()
            .workers(3)
            .line_window(64)
            .recursive(true)
            .date_order(DateOrder::MonthDayYear)
            .clock_zone(ClockZone::Utc)
            .build()
            .expect("config should be valid");
        assert_eq!(cfg.worker_count(), 3);
        assert_eq!(cfg.line_window, 64);
        assert!(cfg.recursive);
        assert_eq!(cfg.decoder.date_order, DateOrder::MonthDayYear);
        assert_eq!(cfg.decoder.clock_zone, ClockZone::Utc);
        assert_eq!(cfg.decoder.omitted_phrases.len(), DEFAULT_OMITTED_PHRASES.len());
    }

    #[test]
    fn parser_validate_rejects_zero_workers() {
        let err = ParserConfig::builder()
            .workers(0)
            .build()
            .expect_err("validation should fail");
        assert!(matches!(
            err,
            ChatprepError::InvalidConfig(message) if message.contains("workers")
        ));
    }

    #[test]
    fn parser_validate_rejects_empty_phrase() {
        let err = ParserConfig::builder()
            .omitted_phrases(["missed video call", ""])
            .build()
            .expect_err("validation should fail");
        assert!(matches!(err, ChatprepError::InvalidConfig(_)));
    }

    #[test]
    fn omitted_phrases_are_lowercased() {
        let cfg = ParserConfig::builder()
            .omitted_phrases(["Missed Video Call"])
            .build()
            .unwrap();
        assert_eq!(cfg.decoder.omitted_phrases, vec!["missed video call"]);
    }

    #[test]
    fn tokenizer_builder_deduplicates_special_tokens() {
        let cfg = TokenizerConfig::builder()
            .special_tokens(["[UNK]", "[PAD]", "[UNK]"])
            .min_frequency(2)
            .build()
            .expect("config should be valid");
        assert_eq!(cfg.special_tokens, vec!["[UNK]", "[PAD]"]);
        assert_eq!(cfg.min_frequency, 2);
    }

    #[test]
    fn tokenizer_validate_requires_unknown_token() {
        let err = TokenizerConfig::builder()
            .special_tokens(["[PAD]"])
            .build()
            .expect_err("validation should fail");
        assert!(matches!(
            err,
            ChatprepError::InvalidConfig(message) if message.contains("[UNK]")
        ));
    }
}
