//! Removal of messages containing rarely used characters.
//!
//! Filtering runs in two passes.  The first pass counts every character over the whole corpus
//! and freezes the resulting [`RareSet`]; only then are the messages split across workers for
//! the second, parallel pass.  The split follows the parser's rule: `len / workers` messages per
//! worker, and the trailing `len % workers` messages are not carried over.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::message::Message;
use crate::pool::{floor_chunks, WorkerPool};

/// Corpus-wide character counts ranked by descending frequency.
///
/// Characters with equal counts keep the order in which they first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharFrequencies {
    ranked: Vec<(char, usize)>,
}

impl CharFrequencies {
    /// Counts characters across `texts`, in iteration order.
    pub fn count<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ranked: Vec<(char, usize)> = Vec::new();
        let mut slots: FxHashMap<char, usize> = FxHashMap::default();
        for text in texts {
            for ch in text.chars() {
                let slot = *slots.entry(ch).or_insert_with(|| {
                    ranked.push((ch, 0));
                    ranked.len() - 1
                });
                ranked[slot].1 += 1;
            }
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        Self { ranked }
    }

    /// Counts the characters of every message body.
    pub fn of_messages(messages: &[Message]) -> Self {
        Self::count(messages.iter().map(|message| message.content.as_str()))
    }

    /// `(character, count)` pairs, most frequent first.
    #[must_use]
    pub fn ranked(&self) -> &[(char, usize)] {
        &self.ranked
    }

    /// Number of distinct characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Returns `true` when nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Every character ranked after the first `keep_count`.
    #[must_use]
    pub fn rare_set(&self, keep_count: usize) -> RareSet {
        let ranked: Vec<char> = self
            .ranked
            .iter()
            .skip(keep_count)
            .map(|&(ch, _)| ch)
            .collect();
        RareSet {
            lookup: ranked.iter().copied().collect(),
            ranked,
        }
    }
}

/// Frozen set of characters whose presence disqualifies a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RareSet {
    ranked: Vec<char>,
    lookup: FxHashSet<char>,
}

impl RareSet {
    /// Number of rare characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Returns `true` when no character is rare.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Rare characters, most frequent first.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.ranked
    }

    /// Returns `true` if `ch` is rare.
    #[must_use]
    pub fn contains(&self, ch: char) -> bool {
        self.lookup.contains(&ch)
    }

    /// Returns `true` if `text` contains at least one rare character.
    #[must_use]
    pub fn hits(&self, text: &str) -> bool {
        !self.lookup.is_empty() && text.chars().any(|ch| self.lookup.contains(&ch))
    }
}

/// Messages surviving a filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Messages without rare characters, in corpus order.
    pub kept: Vec<Message>,
    /// Trailing messages outside the equal-size chunks.
    pub dropped: usize,
}

/// Drops every message whose content hits `rare`, using `workers` equal-size contiguous chunks.
pub fn filter_messages(messages: &[Message], rare: &RareSet, workers: usize) -> Result<Filtered> {
    let pool = WorkerPool::new(workers)?;
    let (chunks, dropped) = floor_chunks(messages, pool.workers());
    if dropped > 0 {
        debug!("{dropped} remainder messages not covered by {} chunks", pool.workers());
    }
    let slots = pool.map_chunks(chunks, |worker, chunk| {
        let before = chunk.len();
        let kept: Vec<Message> = chunk
            .iter()
            .filter(|message| !rare.hits(&message.content))
            .cloned()
            .collect();
        debug!("worker {worker}: kept {} of {before} messages", kept.len());
        kept
    });
    Ok(Filtered {
        kept: slots.into_iter().flatten().collect(),
        dropped,
    })
}
