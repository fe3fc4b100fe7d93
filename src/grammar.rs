//! The immutable grammar representation the recognizer runs on.
use std::fmt::{Debug, Write as _};

use thiserror::Error;

use crate::automata::CompiledAutomaton;
use crate::config::Config;
use crate::normalizer::{self, NormalSymbol};
use crate::parser;

/// The error type for grammar construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The grammar text does not parse. The payload is a rendered trace.
    #[error("The grammar does not parse:\n{0}")]
    Parse(String),
    /// A rule references a nonterminal that no rule defines.
    #[error("The nonterminal `{0}` is referenced but never defined.")]
    UndefinedNonterminal(String),
    /// The configured start nonterminal does not exist.
    #[error("The start nonterminal `{0}` is not defined by any rule.")]
    UndefinedStartNonterminal(String),
    /// The start nonterminal cannot derive any byte string.
    #[error("The nonterminal `{0}` cannot derive any byte string, so the grammar rejects every input.")]
    UnproductiveNonterminal(String),
    /// An `except!` pattern contains a construct other than literals,
    /// alternation, concatenation and references to such patterns.
    #[error("The except! pattern in rule `{0}` does not reduce to a finite set of literals.")]
    ExclusionNotLiteral(String),
    /// An `except!` pattern references a nonterminal that recursively
    /// references itself.
    #[error("The except! pattern in rule `{0}` recurses through nonterminal `{1}`.")]
    RecursiveExclusion(String, String),
    /// An `except!` pattern contains the empty literal, which would forbid
    /// every input.
    #[error("The except! pattern in rule `{0}` contains an empty literal.")]
    EmptyExclusionLiteral(String),
    /// An `except!` token bound is outside `1..=254`.
    #[error("The except! bound {1} in rule `{0}` is outside the supported range 1..=254.")]
    InvalidExclusionBound(String, u32),
    /// A regex failed to compile into a DFA.
    #[error("The pattern `{0}` failed to compile: {1}")]
    InvalidRegex(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NonterminalId(pub(crate) u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TerminalId(pub(crate) u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct AutomatonId(pub(crate) u32);

/// The token budget value meaning "no bound".
pub(crate) const UNBOUNDED_BUDGET: u8 = u8::MAX;

/// One position in a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Symbol {
    Terminal(TerminalId),
    Nonterminal(NonterminalId),
    Regex(AutomatonId),
    Exclusion {
        automaton: AutomatonId,
        /// Initial token budget; [`UNBOUNDED_BUDGET`] when the bound is absent.
        budget: u8,
    },
}

/// An immutable, normalized grammar: rules indexed
/// `[nonterminal][production][position]`, plus the interned terminal and
/// automaton tables. Shared between engines behind an `Arc`.
#[derive(Clone)]
pub struct GrammarStore {
    start: NonterminalId,
    rules: Vec<Vec<Box<[Symbol]>>>,
    names: Vec<String>,
    terminals: Vec<Box<[u8]>>,
    regexes: Vec<CompiledAutomaton>,
    exclusions: Vec<CompiledAutomaton>,
}

impl GrammarStore {
    /// Parses, normalizes and compiles a grammar.
    pub fn new(source: &str, config: &Config) -> Result<Self, GrammarError> {
        let raw_rules = parser::parse(source)?;
        let normalized = normalizer::normalize(raw_rules, &config.start_nonterminal)?;
        let regexes = normalized
            .regexes
            .iter()
            .map(|pattern| CompiledAutomaton::regex(pattern, &config.regex_config))
            .collect::<Result<Vec<_>, _>>()?;
        let exclusions = normalized
            .exclusions
            .iter()
            .map(|literals| CompiledAutomaton::exclusion(literals, &config.regex_config))
            .collect::<Result<Vec<_>, _>>()?;
        let rules = normalized
            .rules
            .into_iter()
            .map(|rule| {
                rule.into_iter()
                    .map(|production| {
                        production
                            .into_iter()
                            .map(|symbol| match symbol {
                                NormalSymbol::Terminal(t) => Symbol::Terminal(TerminalId(t as u32)),
                                NormalSymbol::Nonterminal(n) => {
                                    Symbol::Nonterminal(NonterminalId(n as u32))
                                }
                                NormalSymbol::Regex(r) => Symbol::Regex(AutomatonId(r as u32)),
                                NormalSymbol::Exclusion {
                                    pattern,
                                    max_tokens,
                                } => Symbol::Exclusion {
                                    automaton: AutomatonId(pattern as u32),
                                    budget: max_tokens
                                        .map(|n| n.get())
                                        .unwrap_or(UNBOUNDED_BUDGET),
                                },
                            })
                            .collect::<Box<[Symbol]>>()
                    })
                    .collect()
            })
            .collect();
        Ok(Self {
            start: NonterminalId(0),
            rules,
            names: normalized.names,
            terminals: normalized
                .terminals
                .into_iter()
                .map(Vec::into_boxed_slice)
                .collect(),
            regexes,
            exclusions,
        })
    }

    /// The number of nonterminals after normalization.
    pub fn nonterminal_count(&self) -> usize {
        self.rules.len()
    }

    /// The name of a nonterminal. Fresh nonterminals introduced by operator
    /// expansion have synthesized `__`-prefixed names.
    pub(crate) fn nonterminal_name(&self, nonterminal: NonterminalId) -> &str {
        &self.names[nonterminal.0 as usize]
    }

    pub(crate) fn start_nonterminal(&self) -> NonterminalId {
        self.start
    }

    pub(crate) fn productions(&self, nonterminal: NonterminalId) -> &[Box<[Symbol]>] {
        &self.rules[nonterminal.0 as usize]
    }

    pub(crate) fn production_len(&self, nonterminal: NonterminalId, production: u32) -> usize {
        self.rules[nonterminal.0 as usize][production as usize].len()
    }

    pub(crate) fn symbol(&self, nonterminal: NonterminalId, production: u32, dot: u32) -> Symbol {
        self.rules[nonterminal.0 as usize][production as usize][dot as usize]
    }

    pub(crate) fn terminal(&self, terminal: TerminalId) -> &[u8] {
        &self.terminals[terminal.0 as usize]
    }

    pub(crate) fn regex(&self, automaton: AutomatonId) -> &CompiledAutomaton {
        &self.regexes[automaton.0 as usize]
    }

    pub(crate) fn exclusion(&self, automaton: AutomatonId) -> &CompiledAutomaton {
        &self.exclusions[automaton.0 as usize]
    }

    pub(crate) fn symbol_display(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Terminal(t) => format!("'{}'", String::from_utf8_lossy(self.terminal(t))),
            Symbol::Nonterminal(n) => self.nonterminal_name(n).to_string(),
            Symbol::Regex(r) => format!("#'{}'", self.regex(r).pattern()),
            Symbol::Exclusion { automaton, budget } => {
                let pattern = self.exclusion(automaton).pattern();
                if budget == UNBOUNDED_BUDGET {
                    format!("except!(#'{pattern}')")
                } else {
                    format!("except!(#'{pattern}', {budget})")
                }
            }
        }
    }
}

impl Debug for GrammarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (id, rule) in self.rules.iter().enumerate() {
            let mut line = String::new();
            write!(line, "{} ::= ", self.names[id])?;
            for (i, production) in rule.iter().enumerate() {
                if i > 0 {
                    line.push_str(" | ");
                }
                for (j, &symbol) in production.iter().enumerate() {
                    if j > 0 {
                        line.push(' ');
                    }
                    line.push_str(&self.symbol_display(symbol));
                }
            }
            line.push(';');
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
