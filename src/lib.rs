//! Chat-export log parsing and corpus preparation library and CLI.
//!
//! The crate turns plain-text chat exports (one `"d/m/y, h:mm am - sender: text"` line per
//! message) into an ordered, analysis-ready [`Corpus`].  Parsing fans a file's trailing window of
//! lines out over a fixed pool of workers; afterwards the corpus can be refined in place by
//! encoding senders as frequency-ranked ids, dropping messages that contain rarely used
//! characters, and shifting timestamps so their mean sits at zero.  The result can feed a
//! WordPiece [`ChatTokenizer`] trained with the Hugging Face `tokenizers` crate.
//!
//! ```no_run
//! use chatprep::{ChatTokenizer, Corpus, ParserConfig, TokenizerConfig};
//!
//! # fn main() -> chatprep::Result<()> {
//! let parser_cfg = ParserConfig::builder().workers(4).build()?;
//! let mut corpus = Corpus::new();
//! corpus.parse_files(&["/path/to/chat.txt"], &parser_cfg)?;
//! corpus.encode_senders()?;
//! corpus.filter_rare(100, parser_cfg.worker_count())?;
//! corpus.normalize_time(None)?;
//! let tokenizer = ChatTokenizer::from_corpus(&corpus, &TokenizerConfig::default())?;
//! tokenizer.save("tokenizer.json", false)?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `chatprep = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod corpus;
pub mod decoder;
pub mod error;
pub mod message;
pub mod parser;
mod pool;
pub mod rare;
pub mod senders;
pub mod session;
pub mod timebase;
pub mod tokenizer;

pub use config::{
    ClockZone, DateOrder, DecoderConfig, ParserBuilder, ParserConfig, TokenizerBuilder,
    TokenizerConfig,
};
pub use corpus::{Corpus, FilterReport, ParseReport};
pub use decoder::{Decoded, LineDecoder, Rejection};
pub use error::{ChatprepError, Result};
pub use message::{ChatId, Message, Sender, SenderId};
pub use parser::ChunkedParser;
pub use senders::SenderTable;
pub use session::Session;
pub use tokenizer::{ChatTokenizer, Encoded};
