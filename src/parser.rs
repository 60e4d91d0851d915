//! Chunked parallel parsing of chat log files.
//!
//! A file's trailing window of lines is split into one contiguous chunk per worker.  Every worker
//! decodes its chunk in isolation and the per-worker buffers are concatenated in worker order,
//! which reproduces the file's line order without sorting.
//!
//! Two boundary behaviours are deliberate and observable:
//!
//! * only the last [`ParserConfig::line_window`] lines of a file are read, and
//! * when the line count is not a multiple of the worker count, the trailing
//!   `lines % workers` lines are not parsed.

use std::fs;
use std::path::Path;

use bstr::ByteSlice;
use log::debug;

use crate::config::ParserConfig;
use crate::decoder::{Decoded, LineDecoder};
use crate::error::{ChatprepError, Result};
use crate::message::{ChatId, Message, Sender};
use crate::pool::{floor_chunks, WorkerPool};

/// Trailing lines of a file together with the position of the first kept line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow {
    /// Zero-based line number of `lines[0]` within the file.
    pub first_line: usize,
    /// Lines with their terminators still attached.
    pub lines: Vec<String>,
}

/// Reads the last `cap` lines of `path`, decoding invalid UTF-8 lossily.
pub fn read_line_window<P: AsRef<Path>>(path: P, cap: usize) -> Result<LineWindow> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| ChatprepError::io(err, Some(path.to_path_buf())))?;
    let total = bytes.lines_with_terminator().count();
    let first_line = total.saturating_sub(cap);
    let lines = bytes
        .lines_with_terminator()
        .skip(first_line)
        .map(|line| line.to_str_lossy().into_owned())
        .collect();
    Ok(LineWindow { first_line, lines })
}

/// Messages decoded from one batch of lines.
#[derive(Debug, Clone, Default)]
pub struct ParsedLines {
    /// Accepted messages in line order.
    pub messages: Vec<Message>,
    /// Lines that were decoded but rejected.
    pub rejected: usize,
    /// Remainder lines that fell outside the equal-size chunks.
    pub dropped: usize,
}

/// Parallel parser that fans lines out over a fixed number of workers.
#[derive(Debug, Clone)]
pub struct ChunkedParser {
    decoder: LineDecoder,
    workers: usize,
    line_window: usize,
}

impl ChunkedParser {
    /// Creates a parser for the supplied configuration.
    #[must_use]
    pub fn new(cfg: &ParserConfig) -> Self {
        Self {
            decoder: LineDecoder::new(&cfg.decoder),
            workers: cfg.worker_count(),
            line_window: cfg.line_window,
        }
    }

    /// Number of workers (and therefore chunks) used per batch.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The decoder shared by all workers.
    #[must_use]
    pub fn decoder(&self) -> &LineDecoder {
        &self.decoder
    }

    /// Reads the trailing window of `path` and parses it.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P, chat_id: ChatId) -> Result<ParsedLines> {
        let path = path.as_ref();
        let window = read_line_window(path, self.line_window)?;
        debug!(
            "{}: read {} lines starting at line {}",
            path.display(),
            window.lines.len(),
            window.first_line
        );
        self.parse_lines(&window.lines, window.first_line, chat_id)
    }

    /// Parses `lines`, numbering them from `first_line`.
    pub fn parse_lines<S>(
        &self,
        lines: &[S],
        first_line: usize,
        chat_id: ChatId,
    ) -> Result<ParsedLines>
    where
        S: AsRef<str> + Sync,
    {
        let pool = WorkerPool::new(self.workers)?;
        let (chunks, dropped) = floor_chunks(lines, pool.workers());
        let chunk_size = chunks.first().map_or(0, |chunk| chunk.len());
        if dropped > 0 {
            debug!("{dropped} remainder lines not covered by {} chunks", pool.workers());
        }

        let decoder = &self.decoder;
        let slots = pool.map_chunks(chunks, |worker, chunk| {
            let offset = first_line + worker * chunk_size;
            decode_chunk(decoder, chunk, offset, chat_id)
        });

        let mut parsed = ParsedLines {
            messages: Vec::with_capacity(slots.iter().map(|(m, _)| m.len()).sum()),
            rejected: 0,
            dropped,
        };
        for (messages, rejected) in slots {
            parsed.messages.extend(messages);
            parsed.rejected += rejected;
        }
        Ok(parsed)
    }
}

fn decode_chunk<S: AsRef<str>>(
    decoder: &LineDecoder,
    chunk: &[S],
    offset: usize,
    chat_id: ChatId,
) -> (Vec<Message>, usize) {
    let mut messages = Vec::with_capacity(chunk.len());
    let mut rejected = 0usize;
    for (idx, line) in chunk.iter().enumerate() {
        match decoder.decode(line.as_ref()) {
            Decoded::Message(decoded) => messages.push(Message {
                time: decoded.time,
                sender: Sender::Name(decoded.sender),
                content: decoded.content,
                line_index: offset + idx,
                chat_id,
            }),
            Decoded::Rejected(_) => rejected += 1,
        }
    }
    (messages, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockZone;
    use tempfile::tempdir;

    fn parser(workers: usize) -> ChunkedParser {
        let cfg = ParserConfig::builder()
            .workers(workers)
            .clock_zone(ClockZone::Utc)
            .build()
            .unwrap();
        ChunkedParser::new(&cfg)
    }

    fn sample_lines(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                if i % 4 == 3 {
                    format!("continuation line {i}\n")
                } else {
                    format!(
                        "{}/3/21, 10:{:02} - user{}: message {i}\n",
                        i % 28 + 1,
                        i % 60,
                        i % 3
                    )
                }
            })
            .collect()
    }

    fn expected_indices(lines: &[String]) -> Vec<usize> {
        let decoder = parser(1).decoder().clone();
        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| decoder.decode(line).accepted().is_some())
            .map(|(idx, _)| idx)
            .collect()
    }

    #[test]
    fn worker_count_does_not_change_order() {
        let lines = sample_lines(24);
        let expected = expected_indices(&lines);
        for workers in [1, 2, 3, 4, 6, 8, 12, 24] {
            let parsed = parser(workers).parse_lines(&lines, 0, 0).unwrap();
            let indices: Vec<usize> = parsed.messages.iter().map(|m| m.line_index).collect();
            assert_eq!(indices, expected, "workers = {workers}");
            assert_eq!(parsed.dropped, 0);
            assert_eq!(parsed.rejected, 6);
        }
    }

    #[test]
    fn remainder_lines_are_dropped() {
        let lines = sample_lines(10);
        let parsed = parser(4).parse_lines(&lines, 0, 0).unwrap();
        assert_eq!(parsed.dropped, 2);
        assert!(parsed.messages.iter().all(|m| m.line_index < 8));
        let indices: Vec<usize> = parsed.messages.iter().map(|m| m.line_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn messages_carry_chat_id_and_offset() {
        let lines = sample_lines(4);
        let parsed = parser(2).parse_lines(&lines, 100, 7).unwrap();
        assert!(parsed.messages.iter().all(|m| m.chat_id == 7));
        assert_eq!(parsed.messages[0].line_index, 100);
        assert_eq!(parsed.messages[0].sender, Sender::Name("user0".into()));
        assert_eq!(parsed.messages[0].content, "message 0");
    }

    #[test]
    fn line_window_keeps_only_trailing_lines() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("chat.txt");
        fs::write(&file, sample_lines(12).concat()).expect("write log");

        let window = read_line_window(&file, 5).expect("read window");
        assert_eq!(window.first_line, 7);
        assert_eq!(window.lines.len(), 5);

        let cfg = ParserConfig::builder()
            .workers(1)
            .line_window(5)
            .clock_zone(ClockZone::Utc)
            .build()
            .unwrap();
        let parsed = ChunkedParser::new(&cfg).parse_file(&file, 0).unwrap();
        let indices: Vec<usize> = parsed.messages.iter().map(|m| m.line_index).collect();
        assert_eq!(indices, vec![8, 9, 10]);
        assert!(parsed
            .messages
            .iter()
            .all(|m| m.content != "message 0" && m.content != "message 6"));
    }

    #[test]
    fn window_larger_than_file_reads_everything() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("chat.txt");
        fs::write(&file, "a\nb\nc").expect("write log");
        let window = read_line_window(&file, 100).unwrap();
        assert_eq!(window.first_line, 0);
        assert_eq!(window.lines, vec!["a\n", "b\n", "c"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().expect("tempdir");
        let err = parser(1)
            .parse_file(dir.path().join("missing.txt"), 0)
            .expect_err("missing file");
        assert!(matches!(err, ChatprepError::Io { .. }));
    }
}
