//! The vocabulary of a language model.
use std::fmt::Debug;

use ahash::AHashMap;
use fixedbitset::FixedBitSet;
use serde::Deserialize;
use thiserror::Error;

/// The token in a language model's vocabulary, as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Token(
    /// The token's bytes.
    pub Box<[u8]>,
);

/// The maximum number of token ids a vocabulary may span.
pub const MAX_TOKEN_ID: usize = 0x1000000;

/// The error when creating a [`Vocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CreateVocabularyError {
    /// The vocabulary spans more token ids than supported.
    #[error("The vocabulary spans {0} token ids, while the maximum is {1}.")]
    VocabularyTooLarge(usize, usize),
}

/// The vocabulary of a language model: a map between token ids, the tokens'
/// raw bytes and their string representations.
#[derive(Clone, PartialEq)]
pub struct Vocabulary {
    token_to_id: AHashMap<Token, u32>,
    id_to_token: AHashMap<u32, Token>,
    id_to_token_string: AHashMap<u32, String>,
    /// Indexed by the token's first byte; each bucket is a bit set of ids.
    first_byte_to_token_ids: Vec<FixedBitSet>,
    vocab_size: usize,
}

impl Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("vocab_size", &self.vocab_size)
            .field(
                "id_to_token",
                &crate::utils::get_deterministic_display_form_from_hash_map(
                    &self.id_to_token,
                    |(k, v)| (*k, v.clone()),
                ),
            )
            .field(
                "id_to_token_string",
                &crate::utils::get_deterministic_display_form_from_hash_map(
                    &self.id_to_token_string,
                    |(k, v)| (*k, v.clone()),
                ),
            )
            .finish()
    }
}

impl Vocabulary {
    /// Creates a new instance of [`Vocabulary`].
    ///
    /// # Arguments
    ///
    /// * `id_to_token` - a map from token id to the token's bytes.
    /// * `id_to_token_string` - a map from token id to the token's string
    ///   representation. This is not always the UTF-8 decoding of the bytes:
    ///   tokenizers routinely map unprintable bytes to placeholder glyphs.
    pub fn new(
        id_to_token: AHashMap<u32, Token>,
        id_to_token_string: AHashMap<u32, String>,
    ) -> Result<Self, CreateVocabularyError> {
        let vocab_size = id_to_token
            .keys()
            .max()
            .map(|&x| x as usize + 1)
            .unwrap_or(0);
        if vocab_size > MAX_TOKEN_ID {
            return Err(CreateVocabularyError::VocabularyTooLarge(
                vocab_size,
                MAX_TOKEN_ID,
            ));
        }
        let mut token_to_id = AHashMap::with_capacity(id_to_token.len());
        let mut first_byte_to_token_ids =
            vec![FixedBitSet::with_capacity(vocab_size); u8::MAX as usize + 1];
        let mut byte_appears = [false; u8::MAX as usize + 1];
        for (&token_id, token) in id_to_token.iter() {
            match token.0.first() {
                Some(&first_byte) => {
                    first_byte_to_token_ids[first_byte as usize].insert(token_id as usize);
                    for &byte in token.0.iter() {
                        byte_appears[byte as usize] = true;
                    }
                }
                None => {
                    log::warn!(
                        "Token id {token_id} corresponds to an empty token. \
                        The empty token will never be masked out."
                    );
                }
            }
            if let Some(old_id) = token_to_id.insert(token.clone(), token_id) {
                log::warn!(
                    "Token ids {old_id} and {token_id} both correspond to token {:?}. \
                    Only token id {token_id} will be returned by token_id().",
                    token
                );
            }
        }
        // Bytes 0xF8..=0xFF never occur in UTF-8, so only check below them.
        for byte in 0..=0xF7usize {
            if !byte_appears[byte] {
                log::warn!(
                    "Byte 0x{byte:02X} does not occur in any token. \
                    Grammars that require it will reject every token."
                );
            }
        }
        Ok(Self {
            token_to_id,
            id_to_token,
            id_to_token_string,
            first_byte_to_token_ids,
            vocab_size,
        })
    }

    /// The number of token ids the vocabulary spans, including gaps. In other
    /// words, the maximum token id plus one.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Retrieves the token bytes associated with the given token id.
    pub fn token(&self, token_id: u32) -> Option<&Token> {
        self.id_to_token.get(&token_id)
    }

    /// Retrieves the token string associated with the given token id.
    pub fn token_string(&self, token_id: u32) -> Option<&str> {
        self.id_to_token_string.get(&token_id).map(|x| x.as_str())
    }

    /// Retrieves the token id associated with the given token bytes.
    pub fn token_id(&self, token: &Token) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// The ids of all nonempty tokens whose first byte is `byte`.
    pub(crate) fn tokens_with_first_byte(&self, byte: u8) -> &FixedBitSet {
        &self.first_byte_to_token_ids[byte as usize]
    }
}
