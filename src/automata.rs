//! Compilation of regex terminals and exclusion scanners into dense DFAs,
//! with precomputed start states and per-state first-byte tables.
use ahash::{AHashMap, AHashSet};
use regex_automata::dfa::dense;
use regex_automata::dfa::Automaton;
use regex_automata::util::primitives::StateID;
use regex_automata::util::start;
use regex_automata::util::syntax;
use regex_automata::Anchored;

use crate::config::RegexConfig;
use crate::grammar::GrammarError;
use crate::utils::{self, dispatch_by_dfa_state_status, ByteSet};

/// How a transition classifies for the symbol kind the automaton backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
    /// A regex just matched the bytes consumed so far, or an exclusion
    /// scanner just found a forbidden literal.
    Accept,
    /// The automaton can never match from here on.
    Reject,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutomatonKind {
    /// Anchored; a dead transition kills the item.
    Regex,
    /// Unanchored forbidden-literal scanner; an accepting transition kills
    /// the item, a dead transition means the literals can no longer occur.
    Exclusion,
}

/// A compiled automaton together with its pattern (for display), its start
/// state and a first-byte table for every reachable state.
#[derive(Debug, Clone)]
pub(crate) struct CompiledAutomaton {
    pattern: String,
    dfa: dense::DFA<Vec<u32>>,
    start: StateID,
    /// Keyed by packed state id; the bytes an item in that state survives.
    first_bytes: AHashMap<u32, ByteSet>,
}

pub(crate) fn pack_state(state: StateID) -> u32 {
    state.as_usize() as u32
}

pub(crate) fn unpack_state(bits: u32) -> StateID {
    StateID::new_unchecked(bits as usize)
}

impl CompiledAutomaton {
    /// Compiles an anchored DFA for a regex terminal.
    pub(crate) fn regex(pattern: &str, config: &RegexConfig) -> Result<Self, GrammarError> {
        let dfa = dense::Builder::new()
            .configure(config.dense_config())
            .build(pattern)
            .map_err(|e| GrammarError::InvalidRegex(pattern.to_string(), e.to_string()))?;
        let start = dfa
            .start_state(&start::Config::new().anchored(Anchored::Yes))
            .map_err(|e| GrammarError::InvalidRegex(pattern.to_string(), e.to_string()))?;
        let first_bytes = explore(&dfa, start, AutomatonKind::Regex);
        Ok(Self {
            pattern: pattern.to_string(),
            dfa,
            start,
            first_bytes,
        })
    }

    /// Compiles an unanchored scanner that matches whenever any of the
    /// forbidden literals ends at the current byte. Zero literals yield a
    /// scanner that never matches, which is what `any!` wants.
    pub(crate) fn exclusion(
        literals: &[Vec<u8>],
        config: &RegexConfig,
    ) -> Result<Self, GrammarError> {
        let patterns: Vec<String> = literals.iter().map(|l| escape_bytes(l)).collect();
        let pattern = patterns.join("|");
        // Byte-exact matching: no Unicode classes, and literals may contain
        // arbitrary bytes.
        let dfa = dense::Builder::new()
            .configure(config.dense_config())
            .syntax(syntax::Config::new().unicode(false).utf8(false))
            .build_many(&patterns)
            .map_err(|e| GrammarError::InvalidRegex(pattern.clone(), e.to_string()))?;
        let start = dfa
            .start_state(&start::Config::new().anchored(Anchored::No))
            .map_err(|e| GrammarError::InvalidRegex(pattern.clone(), e.to_string()))?;
        let first_bytes = explore(&dfa, start, AutomatonKind::Exclusion);
        Ok(Self {
            pattern,
            dfa,
            start,
            first_bytes,
        })
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn start_bits(&self) -> u32 {
        pack_state(self.start)
    }

    /// Runs one byte and classifies the resulting state.
    pub(crate) fn step(&self, state: u32, byte: u8) -> (u32, ScanOutcome) {
        let dfa = &self.dfa;
        let next = dfa.next_state(unpack_state(state), byte);
        let bits = pack_state(next);
        let outcome = dispatch_by_dfa_state_status!(
            next,
            dfa,
            accept => { ScanOutcome::Accept },
            reject => { ScanOutcome::Reject },
            in_progress => {
                // Dense DFAs delay match signaling by one transition: the
                // state entered after a completed match is neither a match
                // at end of input nor a dead state. A state no byte survives
                // is as final as a dead one.
                if self
                    .first_bytes
                    .get(&bits)
                    .map_or(true, |bytes| bytes.count_ones(..) == 0)
                {
                    ScanOutcome::Reject
                } else {
                    ScanOutcome::InProgress
                }
            }
        );
        (bits, outcome)
    }

    /// The bytes an item sitting in `state` survives scanning.
    pub(crate) fn first_bytes(&self, state: u32) -> Option<&ByteSet> {
        self.first_bytes.get(&state)
    }
}

/// Enumerates every state reachable from the start by byte transitions and
/// records, per state, the surviving bytes. For a regex a byte survives iff
/// its successor can still produce a match, which takes a liveness fixpoint:
/// dense DFAs delay match signaling by one transition, so the successor of a
/// completed match carries neither the dead nor the end-of-input match flag
/// and only reachability rules it out.
fn explore(
    dfa: &dense::DFA<Vec<u32>>,
    start: StateID,
    kind: AutomatonKind,
) -> AHashMap<u32, ByteSet> {
    let mut transitions: AHashMap<u32, Vec<StateID>> = AHashMap::default();
    let mut stack = vec![start];
    while let Some(state) = stack.pop() {
        if transitions.contains_key(&pack_state(state)) {
            continue;
        }
        let targets: Vec<StateID> = (0..=u8::MAX)
            .map(|byte| dfa.next_state(state, byte))
            .collect();
        for &target in &targets {
            if !transitions.contains_key(&pack_state(target)) {
                stack.push(target);
            }
        }
        transitions.insert(pack_state(state), targets);
    }
    let accepts = |state: StateID| {
        dispatch_by_dfa_state_status!(
            state,
            dfa,
            accept => { true },
            reject => { false },
            in_progress => { false }
        )
    };
    // Matches at end of input, plus (for a regex) every state from which
    // some byte string reaches one.
    let live = match kind {
        AutomatonKind::Regex => {
            let mut live: AHashSet<u32> = transitions
                .keys()
                .copied()
                .filter(|&bits| accepts(unpack_state(bits)))
                .collect();
            loop {
                let mut grew = false;
                for (&bits, targets) in transitions.iter() {
                    if live.contains(&bits) {
                        continue;
                    }
                    if targets
                        .iter()
                        .any(|&target| live.contains(&pack_state(target)))
                    {
                        live.insert(bits);
                        grew = true;
                    }
                }
                if !grew {
                    break;
                }
            }
            live
        }
        AutomatonKind::Exclusion => AHashSet::default(),
    };
    let mut first_bytes = AHashMap::with_capacity(transitions.len());
    for (&bits, targets) in transitions.iter() {
        let mut allowed = utils::byte_set();
        for (byte, &target) in targets.iter().enumerate() {
            let survives = match kind {
                AutomatonKind::Regex => live.contains(&pack_state(target)),
                AutomatonKind::Exclusion => !accepts(target),
            };
            if survives {
                allowed.insert(byte);
            }
        }
        first_bytes.insert(bits, allowed);
    }
    first_bytes
}

/// Escapes a byte string into a regex that matches exactly those bytes.
fn escape_bytes(bytes: &[u8]) -> String {
    let mut pattern = String::with_capacity(bytes.len() * 4);
    for &byte in bytes {
        pattern.push_str(&format!("\\x{byte:02X}"));
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Fsa, RegexConfig};

    fn config() -> RegexConfig {
        RegexConfig {
            max_memory_usage: None,
            fsa_type: Fsa::Dfa,
        }
    }

    fn run(automaton: &CompiledAutomaton, input: &[u8]) -> ScanOutcome {
        let mut state = automaton.start_bits();
        let mut outcome = ScanOutcome::InProgress;
        for &byte in input {
            let (next, o) = automaton.step(state, byte);
            state = next;
            outcome = o;
            if outcome == ScanOutcome::Reject {
                break;
            }
        }
        outcome
    }

    #[test]
    fn regex_is_anchored() {
        let automaton = CompiledAutomaton::regex("[0-9]+", &config()).unwrap();
        assert_eq!(run(&automaton, b"42"), ScanOutcome::Accept);
        assert_eq!(run(&automaton, b"x4"), ScanOutcome::Reject);
        let first = automaton.first_bytes(automaton.start_bits()).unwrap();
        assert!(first.contains(b'7' as usize));
        assert!(!first.contains(b'x' as usize));
    }

    #[test]
    fn bytes_after_a_final_match_kill_the_regex() {
        let automaton = CompiledAutomaton::regex("[0-9]+", &config()).unwrap();
        // The 'x' transition enters the delayed-match successor, which is
        // neither a match at end of input nor a dead state; no byte survives
        // it, so it must classify as a rejection.
        assert_eq!(run(&automaton, b"12x"), ScanOutcome::Reject);
        let (state, outcome) = automaton.step(automaton.start_bits(), b'1');
        assert_eq!(outcome, ScanOutcome::Accept);
        let first = automaton.first_bytes(state).unwrap();
        assert!(first.contains(b'7' as usize));
        assert!(!first.contains(b'x' as usize));
    }

    #[test]
    fn exclusion_matches_anywhere() {
        let automaton = CompiledAutomaton::exclusion(&[b"\n\n".to_vec()], &config()).unwrap();
        assert_eq!(run(&automaton, b"abc\n"), ScanOutcome::InProgress);
        assert_eq!(run(&automaton, b"abc\n\n"), ScanOutcome::Accept);
    }

    #[test]
    fn empty_exclusion_never_matches() {
        let automaton = CompiledAutomaton::exclusion(&[], &config()).unwrap();
        for byte in 0..=u8::MAX {
            let (_, outcome) = automaton.step(automaton.start_bits(), byte);
            assert_ne!(outcome, ScanOutcome::Accept);
        }
        let first = automaton.first_bytes(automaton.start_bits()).unwrap();
        assert_eq!(first.count_ones(..), 256);
    }

    #[test]
    fn exclusion_literals_are_byte_exact() {
        let automaton =
            CompiledAutomaton::exclusion(&[vec![0xFF, 0x00], b"ab".to_vec()], &config()).unwrap();
        assert_eq!(run(&automaton, &[0x61, 0xFF, 0x00]), ScanOutcome::Accept);
        assert_eq!(run(&automaton, b"ab"), ScanOutcome::Accept);
        assert_eq!(run(&automaton, b"aa"), ScanOutcome::InProgress);
    }

    #[test]
    fn malformed_regex_is_reported() {
        assert!(matches!(
            CompiledAutomaton::regex("[", &config()),
            Err(GrammarError::InvalidRegex(_, _))
        ));
    }
}
