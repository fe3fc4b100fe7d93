//! Configuration of the engine.
use regex_automata::dfa::dense;
use regex_automata::dfa::StartKind;
use serde::{Deserialize, Serialize};

/// The configuration of the [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Config {
    /// The configuration of regular expression and exclusion automata.
    pub regex_config: RegexConfig,
    /// The configuration of the engine itself.
    pub engine_config: EngineConfig,
    /// The start nonterminal of the grammar. The default is `start`.
    pub start_nonterminal: String,
}

/// The type of finite state automaton backing regexes and exclusions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Fsa {
    /// A fully built dense DFA. Fastest to run, potentially memory hungry to
    /// build for pathological patterns.
    Dfa,
}

/// The configuration of automaton compilation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RegexConfig {
    /// The maximum memory usage in bytes allowed for one automaton's
    /// transition table. `None` means no limit.
    pub max_memory_usage: Option<usize>,
    /// The automaton representation to build.
    pub fsa_type: Fsa,
}

/// The runtime configuration of the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// Whether the engine caches computed admissible token sets keyed by the
    /// recognizer state. The cache only helps when the recognizer revisits
    /// states, which compaction makes much more likely.
    pub cache_enabled: bool,
    /// Whether the engine compacts committed Earley columns. Compaction bounds
    /// memory on long inputs and canonicalizes states for the cache.
    pub compaction_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regex_config: RegexConfig {
                max_memory_usage: None,
                fsa_type: Fsa::Dfa,
            },
            engine_config: EngineConfig {
                cache_enabled: true,
                compaction_enabled: true,
            },
            start_nonterminal: "start".to_string(),
        }
    }
}

impl RegexConfig {
    pub(crate) fn dense_config(&self) -> dense::Config {
        match self.fsa_type {
            Fsa::Dfa => dense::Config::new()
                .start_kind(StartKind::Both)
                .dfa_size_limit(self.max_memory_usage),
        }
    }
}
