//! A grammar-constrained token generation engine.
//!
//! The engine recognizes byte strings against a context-free grammar written
//! in an EBNF superset and, after every accepted token, computes the set of
//! vocabulary tokens that keep the input recognizable, as a bit mask over
//! the language model's logits.
//!
//! # Grammar syntax
//!
//! Rules are `LHS ::= RHS;`. The right hand side supports:
//!
//! * `'...'` and `"..."` byte-string literals with `\n`, `\r`, `\t`, `\\`,
//!   `\'`, `\"`, `\xHH` and `\uHHHH` escapes; `''` denotes ε.
//! * `#'regex'` regular expressions, matched anchored at the current
//!   position.
//! * Nonterminal references by name, `( group )`, `|` alternation, postfix
//!   `?`, `*`, `+`, and `(* comments *)`.
//! * `except!('lit' | 'lit2'[, n])`: any byte string that does not contain a
//!   forbidden literal, optionally capped to `n` vocabulary tokens.
//! * `any!`: exactly one arbitrary vocabulary token.
//!
//! The grammar is normalized before execution: operators expand away,
//! ε and unit productions are eliminated and useless rules are dropped. One
//! consequence is that recognition is eager: the engine reports exhaustion
//! the moment the start nonterminal completes, so a grammar like
//! `start ::= 'a' | 'a' 'b';` stops at `"a"`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ahash::AHashMap;
//! use earleymask::{AdvanceResult, Config, Engine, Token, Vocabulary};
//!
//! let mut id_to_token = AHashMap::default();
//! let mut id_to_token_string = AHashMap::default();
//! for (id, text) in [(0u32, "a"), (1, "b")] {
//!     id_to_token.insert(id, Token(text.as_bytes().to_vec().into_boxed_slice()));
//!     id_to_token_string.insert(id, text.to_string());
//! }
//! let vocabulary = Arc::new(Vocabulary::new(id_to_token, id_to_token_string)?);
//! let mut engine = Engine::new("start ::= 'ab';", vocabulary, Config::default())?;
//!
//! engine.compute_allowed_token_ids();
//! let allowed: Vec<usize> = engine.allowed_token_ids().ones().collect();
//! assert_eq!(allowed, vec![0]);
//!
//! assert_eq!(engine.advance(0)?, AdvanceResult::Accepted);
//! assert_eq!(engine.advance(1)?, AdvanceResult::Exhausted);
//! assert!(engine.is_finished());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

mod automata;
pub mod config;
pub mod engine;
pub mod grammar;
mod normalizer;
mod parser;
mod recognizer;
mod utils;
pub mod vocabulary;

pub use config::{Config, EngineConfig, Fsa, RegexConfig};
pub use engine::{AdvanceError, AdvanceResult, Engine, MaskLogitsError, UpdateLogitsError};
pub use grammar::{GrammarError, GrammarStore};
pub use vocabulary::{CreateVocabularyError, Token, Vocabulary};
