//! Frequency-ranked sender anonymisation.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{ChatprepError, EntityKind, Result};
use crate::message::{Message, Sender, SenderId};

/// Mapping between sender display names and dense integer ids.
///
/// Id `0` is the most active sender; senders with equal message counts keep the order in which
/// they first appear in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderTable {
    names: Vec<String>,
    counts: Vec<usize>,
    #[serde(skip)]
    ids: FxHashMap<String, SenderId>,
}

impl SenderTable {
    /// Ranks the senders of `messages` by descending message count.
    ///
    /// Fails with [`ChatprepError::SendersEncoded`] if any sender is already an id.
    pub fn rank(messages: &[Message]) -> Result<Self> {
        let mut first_seen: Vec<(&str, usize)> = Vec::new();
        let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
        for message in messages {
            let name = message.sender.name().ok_or(ChatprepError::SendersEncoded)?;
            let slot = *slots.entry(name).or_insert_with(|| {
                first_seen.push((name, 0));
                first_seen.len() - 1
            });
            first_seen[slot].1 += 1;
        }

        // Stable sort keeps first-appearance order among equal counts.
        first_seen.sort_by(|a, b| b.1.cmp(&a.1));

        let mut table = SenderTable::default();
        for (name, count) in first_seen {
            let id = SenderId::try_from(table.names.len())
                .map_err(|_| ChatprepError::Internal("sender count exceeds u32::MAX".into()))?;
            table.ids.insert(name.to_string(), id);
            table.names.push(name.to_string());
            table.counts.push(count);
        }
        Ok(table)
    }

    /// Number of distinct senders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` when no sender is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Sender names ordered by id.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Message counts ordered by id.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Looks up the id assigned to `name`.
    pub fn id_of(&self, name: &str) -> Result<SenderId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Sender, name))
    }

    /// Looks up the name behind `id`.
    pub fn name_of(&self, id: SenderId) -> Result<&str> {
        self.names
            .get(id as usize)
            .map(String::as_str)
            .ok_or_else(|| ChatprepError::not_found(EntityKind::Sender, id.to_string()))
    }

    /// Rewrites every named sender in `messages` to its id.
    pub fn apply(&self, messages: &mut [Message]) -> Result<()> {
        for message in messages.iter_mut() {
            let id = match &message.sender {
                Sender::Name(name) => self.id_of(name)?,
                Sender::Id(_) => return Err(ChatprepError::SendersEncoded),
            };
            message.sender = Sender::Id(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(senders: &[&str]) -> Vec<Message> {
        senders
            .iter()
            .enumerate()
            .map(|(idx, sender)| Message {
                time: 0,
                sender: Sender::Name((*sender).to_string()),
                content: String::new(),
                line_index: idx,
                chat_id: 0,
            })
            .collect()
    }

    #[test]
    fn ties_are_broken_by_first_appearance() {
        let mut corpus = messages(&[
            "c", "a", "b", "a", "b", "c", "a", "b", "a", "b", "c", "a", "b",
        ]);
        let table = SenderTable::rank(&corpus).unwrap();
        assert_eq!(table.names(), &["a", "b", "c"]);
        assert_eq!(table.counts(), &[5, 5, 3]);

        table.apply(&mut corpus).unwrap();
        assert_eq!(corpus[0].sender, Sender::Id(2));
        assert_eq!(corpus[1].sender, Sender::Id(0));
        assert_eq!(corpus[2].sender, Sender::Id(1));
    }

    #[test]
    fn first_appearance_wins_over_name_order() {
        let corpus = messages(&["zed", "amy", "zed", "amy"]);
        let table = SenderTable::rank(&corpus).unwrap();
        assert_eq!(table.id_of("zed").unwrap(), 0);
        assert_eq!(table.id_of("amy").unwrap(), 1);
    }

    #[test]
    fn rank_rejects_encoded_senders() {
        let mut corpus = messages(&["a", "b"]);
        corpus[1].sender = Sender::Id(0);
        assert!(matches!(
            SenderTable::rank(&corpus),
            Err(ChatprepError::SendersEncoded)
        ));
    }

    #[test]
    fn lookups_report_unknown_entities() {
        let table = SenderTable::rank(&messages(&["a"])).unwrap();
        assert_eq!(table.name_of(0).unwrap(), "a");
        assert!(matches!(
            table.name_of(9),
            Err(ChatprepError::NotFound { kind: EntityKind::Sender, .. })
        ));
        assert!(matches!(
            table.id_of("nobody"),
            Err(ChatprepError::NotFound { kind: EntityKind::Sender, .. })
        ));
    }
}
