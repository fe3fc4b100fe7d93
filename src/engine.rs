//! The public engine: token-level advance, the admissible-token filter with
//! its state cache, and logits masking.
use std::fmt::Debug;
use std::sync::Arc;

use ahash::AHashMap;
use fixedbitset::FixedBitSet;
use thiserror::Error;

use crate::config::{Config, EngineConfig};
use crate::grammar::{GrammarError, GrammarStore};
use crate::recognizer::{EarleyItem, Recognizer};
use crate::utils::{self, ByteSet};
use crate::vocabulary::Vocabulary;

/// The result of feeding input to the engine.
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvanceResult {
    /// The input was consumed and the engine awaits more.
    Accepted,
    /// The input completed the grammar; generation should stop.
    Exhausted,
    /// The input is inconsistent with the grammar; the engine state is
    /// unchanged.
    Rejected,
}

/// The error type of [`Engine::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AdvanceError {
    /// The token id does not exist in the vocabulary.
    #[error("Token id {0} does not exist in the vocabulary.")]
    UnknownTokenId(u32),
}

/// The error type of [`Engine::mask_logits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MaskLogitsError {
    /// The logits array length does not match the vocabulary size.
    #[error("The logits array length does not match the vocabulary size.")]
    InvalidLogitsLength,
}

/// The error type of [`Engine::update_logits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum UpdateLogitsError {
    /// The token id does not exist in the vocabulary.
    #[error("Token id {0} does not exist in the vocabulary.")]
    UnknownTokenId(u32),
    /// The logits array length does not match the vocabulary size.
    #[error("The logits array length does not match the vocabulary size.")]
    InvalidLogitsLength,
}

/// A grammar-constrained token generation engine.
///
/// The engine recognizes byte strings against a context-free grammar and, at
/// every step, computes the set of vocabulary tokens whose bytes keep the
/// input recognizable. The grammar is shared immutably; everything mutable is
/// owned, so `Clone` forks the generation state.
#[derive(Clone)]
pub struct Engine {
    vocabulary: Arc<Vocabulary>,
    grammar: Arc<GrammarStore>,
    recognizer: Recognizer,
    config: EngineConfig,
    allowed_first_bytes: ByteSet,
    allowed_token_ids: FixedBitSet,
    /// Admissible sets keyed by the compacted recognizer columns.
    cache: AHashMap<Vec<Vec<EarleyItem>>, FixedBitSet>,
}

impl Engine {
    /// Creates an engine from grammar text. The grammar is parsed, normalized
    /// and compiled once; share the result of [`Engine::grammar`] with
    /// [`Engine::from_grammar`] to reuse it.
    pub fn new(
        grammar_source: &str,
        vocabulary: Arc<Vocabulary>,
        config: Config,
    ) -> Result<Self, GrammarError> {
        let grammar = Arc::new(GrammarStore::new(grammar_source, &config)?);
        Ok(Self::from_grammar(grammar, vocabulary, config.engine_config))
    }

    /// Creates an engine from an already compiled grammar.
    pub fn from_grammar(
        grammar: Arc<GrammarStore>,
        vocabulary: Arc<Vocabulary>,
        config: EngineConfig,
    ) -> Self {
        let recognizer = Recognizer::new(Arc::clone(&grammar), config.compaction_enabled);
        let allowed_token_ids = FixedBitSet::with_capacity(vocabulary.vocab_size());
        Self {
            vocabulary,
            grammar,
            recognizer,
            config,
            allowed_first_bytes: utils::byte_set(),
            allowed_token_ids,
            cache: AHashMap::default(),
        }
    }

    /// Feeds one vocabulary token.
    ///
    /// On `Rejected` (including any token fed after `Exhausted`) the engine
    /// state is untouched.
    pub fn advance(&mut self, token_id: u32) -> Result<AdvanceResult, AdvanceError> {
        let vocabulary = Arc::clone(&self.vocabulary);
        let token = vocabulary
            .token(token_id)
            .ok_or(AdvanceError::UnknownTokenId(token_id))?;
        Ok(self.advance_bytes(&token.0))
    }

    /// Feeds raw bytes as one token for budget purposes.
    pub fn advance_bytes(&mut self, bytes: &[u8]) -> AdvanceResult {
        if self.recognizer.is_finished() {
            return AdvanceResult::Rejected;
        }
        let checkpoint = self.recognizer.len();
        for (position, &byte) in bytes.iter().enumerate() {
            if !self
                .recognizer
                .accept_byte(checkpoint, position == 0, true, byte)
            {
                return AdvanceResult::Rejected;
            }
        }
        self.recognizer.commit();
        if self.recognizer.is_finished() {
            AdvanceResult::Exhausted
        } else {
            AdvanceResult::Accepted
        }
    }

    /// Computes the set of admissible tokens for the current state into
    /// [`Engine::allowed_token_ids`].
    ///
    /// Candidates are prefiltered by their first byte, then each surviving
    /// token is simulated byte by byte on the recognizer and rolled back.
    pub fn compute_allowed_token_ids(&mut self) {
        self.allowed_token_ids.clear();
        if self.recognizer.is_finished() {
            return;
        }
        if self.config.cache_enabled {
            if let Some(cached) = self.cache.get(self.recognizer.columns()) {
                self.allowed_token_ids.union_with(cached);
                return;
            }
        }
        let vocabulary = Arc::clone(&self.vocabulary);
        let checkpoint = self.recognizer.len();
        self.recognizer
            .collect_allowed_first_bytes(&mut self.allowed_first_bytes);
        for byte in self.allowed_first_bytes.ones() {
            for token_id in vocabulary.tokens_with_first_byte(byte as u8).ones() {
                let Some(token) = vocabulary.token(token_id as u32) else {
                    continue;
                };
                let mut admissible = true;
                for (position, &token_byte) in token.0.iter().enumerate() {
                    if !self
                        .recognizer
                        .accept_byte(checkpoint, position == 0, false, token_byte)
                    {
                        // accept_byte already rolled back.
                        admissible = false;
                        break;
                    }
                }
                if admissible {
                    self.allowed_token_ids.insert(token_id);
                    self.recognizer.revert_to(checkpoint);
                }
            }
        }
        self.recognizer.commit();
        if self.config.cache_enabled {
            self.cache
                .insert(self.recognizer.columns().clone(), self.allowed_token_ids.clone());
        }
    }

    /// The admissible set last computed by
    /// [`Engine::compute_allowed_token_ids`].
    pub fn allowed_token_ids(&self) -> &FixedBitSet {
        &self.allowed_token_ids
    }

    /// Sets the logits of all tokens outside the last computed admissible set
    /// to negative infinity.
    pub fn mask_logits(&self, logits: &mut [f32]) -> Result<(), MaskLogitsError> {
        if logits.len() != self.vocabulary.vocab_size() {
            return Err(MaskLogitsError::InvalidLogitsLength);
        }
        for (token_id, logit) in logits.iter_mut().enumerate() {
            if !self.allowed_token_ids.contains(token_id) {
                *logit = f32::NEG_INFINITY;
            }
        }
        Ok(())
    }

    /// Feeds one token and, when it is accepted, recomputes the admissible
    /// set and masks `logits` in place. On `Exhausted` and `Rejected` the
    /// logits are untouched.
    pub fn update_logits(
        &mut self,
        token_id: u32,
        logits: &mut [f32],
    ) -> Result<AdvanceResult, UpdateLogitsError> {
        if logits.len() != self.vocabulary.vocab_size() {
            return Err(UpdateLogitsError::InvalidLogitsLength);
        }
        let result = match self.advance(token_id) {
            Ok(result) => result,
            Err(AdvanceError::UnknownTokenId(id)) => {
                return Err(UpdateLogitsError::UnknownTokenId(id))
            }
        };
        if result == AdvanceResult::Accepted {
            self.compute_allowed_token_ids();
            // Length was checked above; the mask cannot fail.
            let _ = self.mask_logits(logits);
        }
        Ok(result)
    }

    /// Whether the grammar has been fully satisfied.
    pub fn is_finished(&self) -> bool {
        self.recognizer.is_finished()
    }

    /// Returns the engine to its initial state. The admissible-set cache is
    /// preserved; it only ever depends on recognizer states, not history.
    pub fn reset(&mut self) {
        self.recognizer.reset();
        self.allowed_first_bytes.clear();
        self.allowed_token_ids.clear();
    }

    /// The shared vocabulary.
    pub fn vocab(&self) -> Arc<Vocabulary> {
        Arc::clone(&self.vocabulary)
    }

    /// The shared compiled grammar.
    pub fn grammar(&self) -> Arc<GrammarStore> {
        Arc::clone(&self.grammar)
    }

    /// Cumulative Earley item operations, for scaling diagnostics.
    pub fn item_operations(&self) -> u64 {
        self.recognizer.item_operations()
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let allowed: Vec<String> = self
            .allowed_token_ids
            .ones()
            .map(|token_id| {
                self.vocabulary
                    .token_string(token_id as u32)
                    .unwrap_or("<unknown>")
                    .to_string()
            })
            .collect();
        f.debug_struct("Engine")
            .field("grammar", &self.grammar)
            .field("recognizer", &self.recognizer)
            .field("config", &self.config)
            .field(
                "allowed_first_bytes",
                &utils::get_display_form_from_bitset(&self.allowed_first_bytes),
            )
            .field("allowed_tokens", &allowed)
            .field("cached_states", &self.cache.len())
            .finish()
    }
}
