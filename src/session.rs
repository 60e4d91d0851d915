//! Named corpora and tokenizers for driving the pipeline interactively.
//!
//! Every method corresponds to one command of an interactive front end: corpora and tokenizers
//! are registered under a name and later stages look them up by that name.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ParserConfig, TokenizerConfig};
use crate::corpus::{Corpus, FilterReport, ParseReport};
use crate::error::{ChatprepError, EntityKind, Result};
use crate::message::{ChatId, Message};
use crate::senders::SenderTable;
use crate::tokenizer::{ChatTokenizer, Encoded};

/// Registry of named corpora and tokenizers sharing one configuration.
#[derive(Debug, Default)]
pub struct Session {
    parser: ParserConfig,
    tokenizer: TokenizerConfig,
    corpora: BTreeMap<String, Corpus>,
    tokenizers: BTreeMap<String, ChatTokenizer>,
}

impl Session {
    /// Creates an empty session after validating both configurations.
    pub fn new(parser: ParserConfig, tokenizer: TokenizerConfig) -> Result<Self> {
        parser.validate()?;
        tokenizer.validate()?;
        Ok(Self {
            parser,
            tokenizer,
            corpora: BTreeMap::new(),
            tokenizers: BTreeMap::new(),
        })
    }

    /// Parser configuration used for every parse.
    #[must_use]
    pub fn parser_config(&self) -> &ParserConfig {
        &self.parser
    }

    /// Parses `inputs` into a fresh corpus stored as `name`, replacing any previous one.
    pub fn parse<P: AsRef<Path>>(&mut self, name: &str, inputs: &[P]) -> Result<ParseReport> {
        let mut corpus = Corpus::new();
        let report = corpus.parse_files(inputs, &self.parser)?;
        self.corpora.insert(name.to_owned(), corpus);
        Ok(report)
    }

    /// Parses `inputs` and appends them to the existing corpus `name`.
    pub fn append<P: AsRef<Path>>(&mut self, name: &str, inputs: &[P]) -> Result<ParseReport> {
        let parser = &self.parser;
        let corpus = self
            .corpora
            .get_mut(name)
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Corpus, name))?;
        corpus.parse_files(inputs, parser)
    }

    /// Encodes the senders of corpus `name`.
    pub fn encode_senders(&mut self, name: &str) -> Result<&SenderTable> {
        self.corpus_mut(name)?.encode_senders()
    }

    /// Removes messages with characters outside the `keep_count` most frequent ones.
    pub fn filter_rare(&mut self, name: &str, keep_count: usize) -> Result<FilterReport> {
        let workers = self.parser.worker_count();
        self.corpus_mut(name)?.filter_rare(keep_count, workers)
    }

    /// Normalizes the time base of corpus `name`, returning the applied delta.
    pub fn normalize_time(&mut self, name: &str, delta: Option<i64>) -> Result<i64> {
        self.corpus_mut(name)?.normalize_time(delta)
    }

    /// Looks up one message by chat id and line number.
    pub fn message(&self, name: &str, chat_id: ChatId, line_index: usize) -> Result<&Message> {
        self.corpus(name)?.find(chat_id, line_index)
    }

    /// Sender table of an encoded corpus.
    pub fn senders(&self, name: &str) -> Result<&SenderTable> {
        self.corpus(name)?.sender_table()
    }

    /// Looks up a corpus by name.
    pub fn corpus(&self, name: &str) -> Result<&Corpus> {
        self.corpora
            .get(name)
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Corpus, name))
    }

    fn corpus_mut(&mut self, name: &str) -> Result<&mut Corpus> {
        self.corpora
            .get_mut(name)
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Corpus, name))
    }

    /// Names of all registered corpora, sorted.
    pub fn corpora(&self) -> impl Iterator<Item = &str> + '_ {
        self.corpora.keys().map(String::as_str)
    }

    /// Trains a tokenizer on corpus `corpus_name` and registers it as `tokenizer_name`.
    pub fn train_tokenizer(
        &mut self,
        tokenizer_name: &str,
        corpus_name: &str,
    ) -> Result<&ChatTokenizer> {
        let corpus = self.corpus(corpus_name)?;
        let trained = ChatTokenizer::from_corpus(corpus, &self.tokenizer)?;
        self.tokenizers.insert(tokenizer_name.to_owned(), trained);
        self.tokenizer(tokenizer_name)
    }

    /// Looks up a tokenizer by name.
    pub fn tokenizer(&self, name: &str) -> Result<&ChatTokenizer> {
        self.tokenizers
            .get(name)
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Tokenizer, name))
    }

    /// Encodes `text` with tokenizer `name`.
    pub fn tokenize(&self, name: &str, text: &str) -> Result<Encoded> {
        self.tokenizer(name)?.encode(text)
    }

    /// Names of all registered tokenizers, sorted.
    pub fn tokenizers(&self) -> impl Iterator<Item = &str> + '_ {
        self.tokenizers.keys().map(String::as_str)
    }
}
