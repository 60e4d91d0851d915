//! Typed chat message records produced by the parser.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ClockZone;

/// Identifies the parsed file (chat session) a message came from.
pub type ChatId = u32;
/// Dense integer assigned to a sender by the sender encoder.
pub type SenderId = u32;

/// Hour counts above this value are treated as absolute epoch hours when rendering.
const ABSOLUTE_HOUR_FLOOR: i64 = 2 << 16;

/// Sender of a message, either as parsed or after encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    /// Lowercase display name as it appears in the log.
    Name(String),
    /// Integer id assigned by [`crate::senders::SenderTable`].
    Id(SenderId),
}

impl Sender {
    /// Returns the display name if the sender has not been encoded yet.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Sender::Name(name) => Some(name),
            Sender::Id(_) => None,
        }
    }

    /// Returns the encoded id, if any.
    #[must_use]
    pub fn id(&self) -> Option<SenderId> {
        match self {
            Sender::Name(_) => None,
            Sender::Id(id) => Some(*id),
        }
    }

    /// Returns `true` once the sender was replaced by an id.
    #[must_use]
    pub fn is_encoded(&self) -> bool {
        matches!(self, Sender::Id(_))
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Name(name) => f.write_str(name),
            Sender::Id(id) => write!(f, "{id}"),
        }
    }
}

/// One parsed chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Hours since the Unix epoch, shifted by any applied normalization.
    pub time: i64,
    /// Who wrote the message.
    pub sender: Sender,
    /// Lowercase message body without the line terminator.
    pub content: String,
    /// Zero-based line position within the source file.
    pub line_index: usize,
    /// Source file identifier.
    pub chat_id: ChatId,
}

impl Message {
    /// Renders the message as `"{line}. {time} - {sender}: {content}"`.
    ///
    /// Absolute timestamps are shown as `dd/mm/yyyy, HH:MM` in `zone`; normalized (small) hour
    /// offsets are shown as plain integers.
    #[must_use]
    pub fn render(&self, zone: ClockZone) -> String {
        format!(
            "{}. {} - {}: {}",
            self.line_index,
            render_time(self.time, zone),
            self.sender,
            self.content
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(ClockZone::Local))
    }
}

fn render_time(hours: i64, zone: ClockZone) -> String {
    if hours <= ABSOLUTE_HOUR_FLOOR {
        return hours.to_string();
    }
    let Some(seconds) = hours.checked_mul(3600) else {
        return hours.to_string();
    };
    let utc: Option<DateTime<Utc>> = Utc.timestamp_opt(seconds, 0).single();
    match (utc, zone) {
        (Some(dt), ClockZone::Utc) => dt.format("%d/%m/%Y, %H:%M").to_string(),
        (Some(dt), ClockZone::Local) => dt
            .with_timezone(&Local)
            .format("%d/%m/%Y, %H:%M")
            .to_string(),
        (None, _) => hours.to_string(),
    }
}
