//! WordPiece tokenizer training on a flattened corpus, built on the `tokenizers` crate.

use std::io::Write;
use std::path::Path;

use log::info;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::{WordPiece, WordPieceTrainer};
use tokenizers::models::TrainerWrapper;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::{AddedToken, Tokenizer};

use crate::config::TokenizerConfig;
use crate::corpus::Corpus;
use crate::error::{ChatprepError, Result};

/// Token ids and strings produced by [`ChatTokenizer::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Vocabulary ids.
    pub ids: Vec<u32>,
    /// Token strings aligned with `ids`.
    pub tokens: Vec<String>,
}

/// Thin wrapper around a trained `tokenizers::Tokenizer`.
#[derive(Debug, Clone)]
pub struct ChatTokenizer {
    inner: Tokenizer,
}

impl ChatTokenizer {
    /// Trains a tokenizer on the flattened contents of `corpus`.
    pub fn from_corpus(corpus: &Corpus, cfg: &TokenizerConfig) -> Result<Self> {
        if corpus.is_empty() {
            return Err(ChatprepError::empty_corpus("train a tokenizer on"));
        }
        Self::train(&corpus.flatten(), cfg)
    }

    /// Trains a tokenizer on `text`.
    ///
    /// The text is staged in a named temporary file that is removed when training returns,
    /// whether or not it succeeded.
    pub fn train(text: &str, cfg: &TokenizerConfig) -> Result<Self> {
        if text.is_empty() {
            return Err(ChatprepError::empty_corpus("train a tokenizer on"));
        }
        cfg.validate()?;

        let mut staging = tempfile::Builder::new()
            .prefix("chatprep-")
            .suffix(".txt")
            .tempfile()
            .map_err(|err| ChatprepError::io(err, None))?;
        staging
            .write_all(text.as_bytes())
            .and_then(|()| staging.flush())
            .map_err(|err| ChatprepError::io(err, Some(staging.path().to_path_buf())))?;
        let staged = staging.path().to_string_lossy().into_owned();

        let mut trainer: TrainerWrapper = WordPieceTrainer::builder()
            .min_frequency(cfg.min_frequency)
            .limit_alphabet(cfg.limit_alphabet)
            .vocab_size(cfg.vocab_size)
            .show_progress(cfg.show_progress)
            .special_tokens(
                cfg.special_tokens
                    .iter()
                    .map(|token| AddedToken::from(token.clone(), true))
                    .collect(),
            )
            .build()
            .into();

        let model = WordPiece::builder()
            .unk_token("[UNK]".into())
            .build()
            .map_err(|err| ChatprepError::Tokenizers(err.to_string()))?;
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
        tokenizer.with_decoder(Some(WordPieceDecoder::default()));
        tokenizer.train_from_files(&mut trainer, vec![staged])?;

        let trained = Self { inner: tokenizer };
        info!(
            "trained WordPiece tokenizer on {} bytes; vocab size {}",
            text.len(),
            trained.vocab_size()
        );
        Ok(trained)
    }

    /// Loads a tokenizer previously written by [`ChatTokenizer::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChatprepError::io(
                std::io::Error::new(std::io::ErrorKind::NotFound, "tokenizer file not found"),
                Some(path.to_path_buf()),
            ));
        }
        let inner = Tokenizer::from_file(path)?;
        Ok(Self { inner })
    }

    /// Writes the tokenizer as `tokenizer.json`-compatible JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P, pretty: bool) -> Result<()> {
        self.inner.save(path.as_ref(), pretty)?;
        Ok(())
    }

    /// Encodes `text` without adding special tokens.
    pub fn encode(&self, text: &str) -> Result<Encoded> {
        let encoding = self.inner.encode(text, false)?;
        Ok(Encoded {
            ids: encoding.get_ids().to_vec(),
            tokens: encoding.get_tokens().to_vec(),
        })
    }

    /// Vocabulary size including special tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}
