//! The ordered message store and the per-stage operations applied to it.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ParserConfig;
use crate::error::{ChatprepError, EntityKind, Result};
use crate::message::{ChatId, Message};
use crate::parser::ChunkedParser;
use crate::rare::{filter_messages, CharFrequencies};
use crate::senders::SenderTable;
use crate::timebase;

/// Expands the inputs into the list of paths to parse.
///
/// Directories are expanded to the files below them only when [`ParserConfig::recursive`] is
/// set; otherwise they are kept so that [`Corpus::parse_files`] can report them as skipped.
pub fn collect_inputs<P: AsRef<Path>>(inputs: &[P], cfg: &ParserConfig) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if cfg.recursive && path.is_dir() {
            let mut found = Vec::new();
            let walker = WalkDir::new(path).follow_links(cfg.follow_symlinks);
            for entry in walker {
                let entry = entry.map_err(|err| ChatprepError::Internal(err.to_string()))?;
                if entry.file_type().is_file() {
                    found.push(entry.path().to_path_buf());
                }
            }
            found.sort();
            paths.extend(found);
        } else {
            paths.push(path.to_path_buf());
        }
    }
    Ok(paths)
}

/// Why an input was not parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The path names a directory.
    Directory,
    /// The path does not exist.
    Missing,
    /// The file exists but could not be read.
    Unreadable(String),
}

/// An input that was skipped with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// The offending path.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Summary of one successfully parsed file.
///
/// Chat ids follow the position of the file in the input list; skipped inputs still use up
/// their id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Source path.
    pub path: PathBuf,
    /// Id assigned to the file's messages.
    pub chat_id: ChatId,
    /// Messages added to the corpus.
    pub messages: usize,
    /// Lines rejected by the decoder.
    pub rejected: usize,
    /// Lines not covered by the equal-size chunks.
    pub dropped: usize,
}

/// Outcome of a multi-file parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Files that contributed messages, in parse order.
    pub parsed: Vec<ParsedFile>,
    /// Inputs that were skipped.
    pub skipped: Vec<SkippedFile>,
}

impl ParseReport {
    /// Total number of messages added.
    #[must_use]
    pub fn messages(&self) -> usize {
        self.parsed.iter().map(|file| file.messages).sum()
    }
}

/// Result of a rare-character filtering pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    /// Characters that disqualified messages, most frequent first.
    pub rare_chars: Vec<char>,
    /// Messages removed because they contain a rare character.
    pub removed: usize,
    /// Trailing messages discarded because they fell outside the equal-size worker chunks.
    pub dropped: usize,
    /// Messages kept.
    pub kept: usize,
}

/// Ordered collection of messages from one or more parsed chat logs.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    messages: Vec<Message>,
    senders: Option<SenderTable>,
    time_delta: i64,
    next_chat_id: ChatId,
}

impl Corpus {
    /// Creates an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a corpus from already parsed messages.
    #[must_use]
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let next_chat_id = messages
            .iter()
            .map(|message| message.chat_id + 1)
            .max()
            .unwrap_or(0);
        Self {
            messages,
            next_chat_id,
            ..Self::default()
        }
    }

    /// Messages in corpus order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when the corpus holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Sum of all time shifts applied so far, in hours.
    #[must_use]
    pub fn time_delta(&self) -> i64 {
        self.time_delta
    }

    /// Number of chat ids handed out so far, including those of skipped inputs.
    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.next_chat_id as usize
    }

    /// The sender table, once senders were encoded.
    pub fn sender_table(&self) -> Result<&SenderTable> {
        self.senders
            .as_ref()
            .ok_or_else(|| {
                ChatprepError::not_found(EntityKind::SenderTable, "senders were never encoded")
            })
    }

    /// Returns `true` once senders were replaced by ids.
    #[must_use]
    pub fn senders_encoded(&self) -> bool {
        self.senders.is_some()
    }

    /// Finds the message parsed from `line_index` of chat `chat_id`.
    pub fn find(&self, chat_id: ChatId, line_index: usize) -> Result<&Message> {
        self.messages
            .iter()
            .find(|message| message.chat_id == chat_id && message.line_index == line_index)
            .ok_or_else(|| {
                ChatprepError::not_found(EntityKind::Message, format!("{chat_id}:{line_index}"))
            })
    }

    /// Concatenates every message body, in corpus order, without separators.
    #[must_use]
    pub fn flatten(&self) -> String {
        let capacity = self.messages.iter().map(|message| message.content.len()).sum();
        let mut text = String::with_capacity(capacity);
        for message in &self.messages {
            text.push_str(&message.content);
        }
        text
    }

    /// Parses one file and appends its messages under a fresh chat id.
    ///
    /// The id is used up even when the file cannot be read.
    pub fn parse_file<P: AsRef<Path>>(
        &mut self,
        parser: &ChunkedParser,
        path: P,
    ) -> Result<ParsedFile> {
        if self.senders_encoded() {
            return Err(ChatprepError::SendersEncoded);
        }
        let path = path.as_ref();
        let chat_id = self.next_chat_id;
        self.next_chat_id += 1;
        let parsed = parser.parse_file(path, chat_id)?;

        let mut messages = parsed.messages;
        if self.time_delta != 0 {
            timebase::shift(&mut messages, self.time_delta)?;
        }
        let summary = ParsedFile {
            path: path.to_path_buf(),
            chat_id,
            messages: messages.len(),
            rejected: parsed.rejected,
            dropped: parsed.dropped,
        };
        self.messages.extend(messages);
        debug!(
            "{}: chat {} added {} messages ({} rejected, {} dropped)",
            path.display(),
            chat_id,
            summary.messages,
            summary.rejected,
            summary.dropped
        );
        Ok(summary)
    }

    /// Parses several inputs in order, skipping unusable paths with a warning.
    pub fn parse_files<P: AsRef<Path>>(
        &mut self,
        inputs: &[P],
        cfg: &ParserConfig,
    ) -> Result<ParseReport> {
        if self.senders_encoded() {
            return Err(ChatprepError::SendersEncoded);
        }
        cfg.validate()?;
        let parser = ChunkedParser::new(cfg);
        let mut report = ParseReport::default();
        for path in collect_inputs(inputs, cfg)? {
            let reason = if path.is_dir() {
                Some(SkipReason::Directory)
            } else if !path.exists() {
                Some(SkipReason::Missing)
            } else {
                None
            };
            if let Some(reason) = reason {
                warn!("skipping {}: {:?}", path.display(), reason);
                self.next_chat_id += 1;
                report.skipped.push(SkippedFile { path, reason });
                continue;
            }
            match self.parse_file(&parser, &path) {
                Ok(parsed) => report.parsed.push(parsed),
                Err(ChatprepError::Io { source, .. }) => {
                    warn!("skipping {}: {source}", path.display());
                    report.skipped.push(SkippedFile {
                        path,
                        reason: SkipReason::Unreadable(source.to_string()),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        info!(
            "parsed {} files ({} skipped); corpus holds {} messages",
            report.parsed.len(),
            report.skipped.len(),
            self.messages.len()
        );
        Ok(report)
    }

    /// Replaces sender names with frequency-ranked ids and stores the table.
    pub fn encode_senders(&mut self) -> Result<&SenderTable> {
        if self.is_empty() {
            return Err(ChatprepError::empty_corpus("encode the senders of"));
        }
        if self.senders_encoded() {
            return Err(ChatprepError::SendersEncoded);
        }
        let table = SenderTable::rank(&self.messages)?;
        table.apply(&mut self.messages)?;
        info!("encoded {} senders", table.len());
        Ok(self.senders.insert(table))
    }

    /// Drops every message containing a character outside the `keep_count` most frequent ones.
    pub fn filter_rare(&mut self, keep_count: usize, workers: usize) -> Result<FilterReport> {
        if self.is_empty() {
            return Err(ChatprepError::empty_corpus("filter rare characters from"));
        }
        let rare = CharFrequencies::of_messages(&self.messages).rare_set(keep_count);

        let before = self.messages.len();
        let filtered = filter_messages(&self.messages, &rare, workers)?;
        self.messages = filtered.kept;
        let report = FilterReport {
            rare_chars: rare.chars().to_vec(),
            removed: before - filtered.dropped - self.messages.len(),
            dropped: filtered.dropped,
            kept: self.messages.len(),
        };
        info!(
            "{} rare characters removed {} of {} messages ({} remainder dropped)",
            report.rare_chars.len(),
            report.removed,
            before,
            report.dropped
        );
        Ok(report)
    }

    /// Shifts every timestamp by `delta` (default: the negated mean) and returns the delta used.
    pub fn normalize_time(&mut self, delta: Option<i64>) -> Result<i64> {
        if self.is_empty() {
            return Err(ChatprepError::empty_corpus("normalize the time base of"));
        }
        let delta = match delta {
            Some(delta) => delta,
            None => timebase::centering_delta(&self.messages)?,
        };
        let total = self
            .time_delta
            .checked_add(delta)
            .ok_or(ChatprepError::TimeOverflow { delta })?;
        timebase::shift(&mut self.messages, delta)?;
        self.time_delta = total;
        info!("shifted timestamps by {delta} hours (total {})", self.time_delta);
        Ok(delta)
    }
}
