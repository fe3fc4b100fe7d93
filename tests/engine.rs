use std::sync::Arc;

use ahash::AHashMap;
use earleymask::{AdvanceError, AdvanceResult, Config, Engine, Token, UpdateLogitsError, Vocabulary};

fn vocabulary(tokens: &[&str]) -> Arc<Vocabulary> {
    let mut id_to_token = AHashMap::default();
    let mut id_to_token_string = AHashMap::default();
    for (id, text) in tokens.iter().enumerate() {
        id_to_token.insert(id as u32, Token(text.as_bytes().to_vec().into_boxed_slice()));
        id_to_token_string.insert(id as u32, text.to_string());
    }
    Arc::new(Vocabulary::new(id_to_token, id_to_token_string).unwrap())
}

fn make_engine(grammar: &str, tokens: &[&str]) -> Engine {
    Engine::new(grammar, vocabulary(tokens), Config::default()).unwrap()
}

fn token_id(engine: &Engine, text: &str) -> u32 {
    engine
        .vocab()
        .token_id(&Token(text.as_bytes().to_vec().into_boxed_slice()))
        .unwrap()
}

fn advance_str(engine: &mut Engine, text: &str) -> AdvanceResult {
    let id = token_id(engine, text);
    engine.advance(id).unwrap()
}

fn allowed_strings(engine: &mut Engine) -> Vec<String> {
    engine.compute_allowed_token_ids();
    let vocabulary = engine.vocab();
    let mut allowed: Vec<String> = engine
        .allowed_token_ids()
        .ones()
        .map(|id| vocabulary.token_string(id as u32).unwrap().to_string())
        .collect();
    allowed.sort();
    allowed
}

#[test]
fn single_terminal() {
    let mut engine = make_engine("start ::= 'aa';", &["a", "b"]);
    assert_eq!(allowed_strings(&mut engine), vec!["a"]);
    assert_eq!(advance_str(&mut engine, "b"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "a"), AdvanceResult::Accepted);
    assert_eq!(allowed_strings(&mut engine), vec!["a"]);
    assert_eq!(advance_str(&mut engine, "a"), AdvanceResult::Exhausted);
    assert!(engine.is_finished());
    assert_eq!(advance_str(&mut engine, "a"), AdvanceResult::Rejected);
    assert!(allowed_strings(&mut engine).is_empty());
}

#[test]
fn single_regex() {
    let mut engine = make_engine("start ::= #'[0-9]+' '\\n';", &["12", "1", "23", "\n", "x"]);
    assert_eq!(allowed_strings(&mut engine), vec!["1", "12", "23"]);
    assert_eq!(advance_str(&mut engine, "12"), AdvanceResult::Accepted);
    assert_eq!(allowed_strings(&mut engine), vec!["\n", "1", "12", "23"]);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn multi_byte_tokens_roll_back_atomically() {
    let mut engine = make_engine("start ::= 'abc';", &["ab", "ax", "c"]);
    // "ax" fails on its second byte; the first byte must not stick.
    assert_eq!(advance_str(&mut engine, "ax"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "ab"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "c"), AdvanceResult::Exhausted);
}

#[test]
fn advance_bytes_drives_raw_text() {
    let mut engine = make_engine("start ::= 'abc';", &["a"]);
    assert_eq!(engine.advance_bytes(b"ab"), AdvanceResult::Accepted);
    assert_eq!(engine.advance_bytes(b"x"), AdvanceResult::Rejected);
    assert_eq!(engine.advance_bytes(b"c"), AdvanceResult::Exhausted);
    assert_eq!(engine.advance_bytes(b"c"), AdvanceResult::Rejected);
}

#[test]
fn left_recursion_finishes_eagerly() {
    let mut engine = make_engine("start ::= 'bb' | start 'bb';", &["bb"]);
    // The first completion of `start` at origin 0 exhausts the grammar.
    assert_eq!(advance_str(&mut engine, "bb"), AdvanceResult::Exhausted);
    assert_eq!(advance_str(&mut engine, "bb"), AdvanceResult::Rejected);
}

#[test]
fn right_recursion() {
    let mut engine = make_engine("start ::= c '\\n'; c ::= 'c' | 'c' c;", &["c", "\n"]);
    for _ in 0..10 {
        assert_eq!(advance_str(&mut engine, "c"), AdvanceResult::Accepted);
    }
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn indirect_right_recursion() {
    let mut engine = make_engine(
        "start ::= a '\\n'; a ::= 'x' | 'x' b; b ::= 'y' | 'y' a;",
        &["x", "y", "\n"],
    );
    for _ in 0..5 {
        assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Accepted);
        assert_eq!(advance_str(&mut engine, "y"), AdvanceResult::Accepted);
    }
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn right_recursion_scales_linearly() {
    let ops_for = |count: usize| {
        let mut engine = make_engine("start ::= c '\\n'; c ::= 'c' | 'c' c;", &["c", "\n"]);
        for _ in 0..count {
            assert_eq!(advance_str(&mut engine, "c"), AdvanceResult::Accepted);
        }
        engine.item_operations()
    };
    let small = ops_for(50);
    let large = ops_for(100);
    // Quadratic growth would put the ratio near 4.
    assert!(
        large < small * 3,
        "item operations grew superlinearly: {small} -> {large}"
    );
}

#[test]
fn middle_recursion() {
    let mut engine = make_engine("start ::= ('{' start '}')?;", &["{", "}"]);
    for _ in 0..5 {
        assert_eq!(advance_str(&mut engine, "{"), AdvanceResult::Accepted);
    }
    for _ in 0..4 {
        assert_eq!(advance_str(&mut engine, "}"), AdvanceResult::Accepted);
    }
    assert_eq!(advance_str(&mut engine, "}"), AdvanceResult::Exhausted);
}

#[test]
fn operator_expansion_reduces_to_repetition() {
    // B+ over an optional C is C* as written; the eager normal form stops at
    // the first complete derivation, i.e. the language is x+.
    let config = Config {
        start_nonterminal: "A".to_string(),
        ..Config::default()
    };
    let vocabulary = vocabulary(&["x", "y"]);
    let mut engine = Engine::new(
        "A ::= B+; B ::= C?; C ::= 'x';",
        Arc::clone(&vocabulary),
        config.clone(),
    )
    .unwrap();
    assert_eq!(allowed_strings(&mut engine), vec!["x"]);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Exhausted);
    let mut engine = Engine::new("A ::= B+; B ::= C?; C ::= 'x';", vocabulary, config).unwrap();
    assert_eq!(advance_str(&mut engine, "y"), AdvanceResult::Rejected);
}

#[test]
fn regex_match_does_not_admit_unrelated_bytes() {
    // After a complete regex match, a byte the regex cannot extend with must
    // reject rather than leave the match's successor state lingering.
    let mut engine = make_engine("start ::= #'[0-9]+' '\\n';", &["12", "x", "\n"]);
    assert_eq!(advance_str(&mut engine, "12"), AdvanceResult::Accepted);
    assert_eq!(allowed_strings(&mut engine), vec!["\n", "12"]);
    assert_eq!(engine.advance_bytes(b"x"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn exclusion_scans_free_text_until_the_terminator() {
    let grammar = "start ::= except!('\\n\\n') '\\n\\n';";
    let tokens = &["114", "514", "\n\n", "\n"];

    let mut engine = make_engine(grammar, tokens);
    assert_eq!(advance_str(&mut engine, "114"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "514"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "\n\n"), AdvanceResult::Exhausted);

    // A partial body leaves the engine waiting for more input.
    let mut engine = make_engine(grammar, tokens);
    assert_eq!(advance_str(&mut engine, "114"), AdvanceResult::Accepted);
    assert!(!engine.is_finished());

    // The forbidden pair inside the body ends the derivation at the first
    // occurrence, so a continuation is rejected.
    let mut engine = make_engine(grammar, tokens);
    assert_eq!(advance_str(&mut engine, "114"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "\n\n"), AdvanceResult::Exhausted);
    assert_eq!(advance_str(&mut engine, "514"), AdvanceResult::Rejected);
}

#[test]
fn exclusion_splits_the_forbidden_pair_across_tokens() {
    let mut engine = make_engine("start ::= except!('\\n\\n') 'x';", &["a\n", "\na", "x", "\n"]);
    assert_eq!(advance_str(&mut engine, "a\n"), AdvanceResult::Accepted);
    // The pair completes across the token boundary.
    assert_eq!(advance_str(&mut engine, "\na"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Exhausted);
}

#[test]
fn any_token_accepts_exactly_one_token() {
    let grammar = "start ::= any! '\\n';";
    let tokens = &["hello", "x", "\n"];

    let mut engine = make_engine(grammar, tokens);
    assert_eq!(allowed_strings(&mut engine), vec!["\n", "hello", "x"]);
    assert_eq!(advance_str(&mut engine, "hello"), AdvanceResult::Accepted);
    // The budget is spent: only the terminator remains.
    assert_eq!(allowed_strings(&mut engine), vec!["\n"]);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn exclusion_token_budget_is_enforced() {
    let grammar = "start ::= except!('q', 2) 'q';";
    let tokens = &["ab", "q"];

    let mut engine = make_engine(grammar, tokens);
    assert_eq!(advance_str(&mut engine, "ab"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "ab"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "ab"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "q"), AdvanceResult::Exhausted);

    // The budget counts tokens, not bytes: one long token spends one unit.
    let mut engine = make_engine(grammar, &["abcdef", "q"]);
    assert_eq!(advance_str(&mut engine, "abcdef"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "abcdef"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "abcdef"), AdvanceResult::Rejected);
    assert_eq!(advance_str(&mut engine, "q"), AdvanceResult::Exhausted);
}

fn run_and_collect(mut engine: Engine, inputs: &[&str]) -> Vec<Vec<String>> {
    let mut states = vec![allowed_strings(&mut engine)];
    for input in inputs {
        assert_ne!(advance_str(&mut engine, input), AdvanceResult::Rejected);
        states.push(allowed_strings(&mut engine));
    }
    states
}

#[test]
fn cache_and_compaction_do_not_change_results() {
    // run_and_collect recomputes the admissible set after every advance, so
    // every scenario interleaves filter probing with committed tokens.
    let scenarios: &[(&str, &[&str], &[&str])] = &[
        (
            "start ::= #'[0-9]+' '\\n';",
            &["1", "23", "\n", "x"],
            &["1", "23", "1", "1"],
        ),
        // Indirect right recursion: the Leo fold drops bridged columns, the
        // configurations with compaction off are the reference.
        (
            "start ::= a '\\n'; a ::= 'x' | 'x' b; b ::= 'y' | 'y' a;",
            &["x", "y", "\n"],
            &["x", "y", "x", "y", "x"],
        ),
    ];
    for &(grammar, tokens, inputs) in scenarios {
        let mut expected = None;
        for cache_enabled in [false, true] {
            for compaction_enabled in [false, true] {
                let config = Config {
                    engine_config: earleymask::EngineConfig {
                        cache_enabled,
                        compaction_enabled,
                    },
                    ..Config::default()
                };
                let engine = Engine::new(grammar, vocabulary(tokens), config).unwrap();
                let states = run_and_collect(engine, inputs);
                match &expected {
                    None => expected = Some(states),
                    Some(expected) => assert_eq!(
                        &states, expected,
                        "divergence on {grammar:?} with \
                        cache={cache_enabled} compaction={compaction_enabled}"
                    ),
                }
            }
        }
    }
}

#[test]
fn computing_the_filter_between_advances_keeps_right_recursion_alive() {
    // Trial tokens must leave no trace: their rollback may not tear down
    // Leo entries the committed, compacted columns still rely on.
    let grammar = "start ::= a '\\n'; a ::= 'x' | 'x' b; b ::= 'y' | 'y' a;";
    let mut engine = make_engine(grammar, &["x", "y", "\n"]);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "y"), AdvanceResult::Accepted);
    assert_eq!(allowed_strings(&mut engine), vec!["\n", "x"]);
    assert_eq!(advance_str(&mut engine, "x"), AdvanceResult::Accepted);
    assert_eq!(allowed_strings(&mut engine), vec!["\n", "y"]);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}

#[test]
fn cached_and_recomputed_sets_agree_on_repeated_states() {
    // Identical recognizer states recur at every step of this loop, so the
    // cache path and the recompute path must keep returning the same set.
    let grammar = "start ::= c '\\n'; c ::= 'c' | 'c' c;";
    let mut engine = make_engine(grammar, &["c", "\n"]);
    let mut previous = None;
    for _ in 0..6 {
        assert_eq!(advance_str(&mut engine, "c"), AdvanceResult::Accepted);
        let allowed = allowed_strings(&mut engine);
        if let Some(previous) = &previous {
            assert_eq!(&allowed, previous);
        }
        previous = Some(allowed);
    }
}

#[test]
fn clones_diverge_independently() {
    let mut engine = make_engine("start ::= 'a' 'b' | 'a' 'c' 'd';", &["a", "b", "c", "d"]);
    assert_eq!(advance_str(&mut engine, "a"), AdvanceResult::Accepted);
    let mut fork = engine.clone();
    assert_eq!(advance_str(&mut engine, "b"), AdvanceResult::Exhausted);
    assert!(!fork.is_finished());
    assert_eq!(advance_str(&mut fork, "c"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut fork, "d"), AdvanceResult::Exhausted);
}

#[test]
fn reset_allows_reuse() {
    let mut engine = make_engine("start ::= except!('\\n\\n') '\\n\\n';", &["114", "\n\n"]);
    for _ in 0..3 {
        assert_eq!(advance_str(&mut engine, "114"), AdvanceResult::Accepted);
        assert_eq!(advance_str(&mut engine, "\n\n"), AdvanceResult::Exhausted);
        engine.reset();
        assert!(!engine.is_finished());
    }
}

#[test]
fn update_logits_masks_disallowed_tokens() {
    let mut engine = make_engine("start ::= 'a' 'b';", &["a", "b"]);
    let mut logits = vec![0.0f32; 2];
    let a = token_id(&engine, "a");
    let b = token_id(&engine, "b");
    assert_eq!(
        engine.update_logits(a, &mut logits).unwrap(),
        AdvanceResult::Accepted
    );
    assert_eq!(logits[a as usize], f32::NEG_INFINITY);
    assert_eq!(logits[b as usize], 0.0);

    let mut short = vec![0.0f32; 1];
    assert_eq!(
        engine.update_logits(b, &mut short),
        Err(UpdateLogitsError::InvalidLogitsLength)
    );
    // Exhaustion leaves the logits untouched.
    let mut logits = vec![1.0f32; 2];
    assert_eq!(
        engine.update_logits(b, &mut logits).unwrap(),
        AdvanceResult::Exhausted
    );
    assert_eq!(logits, vec![1.0, 1.0]);
}

#[test]
fn unknown_token_ids_are_errors() {
    let mut engine = make_engine("start ::= 'a';", &["a"]);
    assert_eq!(engine.advance(42), Err(AdvanceError::UnknownTokenId(42)));
    let mut logits = vec![0.0f32; 1];
    assert_eq!(
        engine.update_logits(42, &mut logits),
        Err(UpdateLogitsError::UnknownTokenId(42))
    );
}

#[test]
fn empty_tokens_are_accepted_as_no_ops() {
    let mut engine = make_engine("start ::= 'ab';", &["", "ab"]);
    let empty = token_id(&engine, "");
    assert_eq!(engine.advance(empty).unwrap(), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "ab"), AdvanceResult::Exhausted);
}

#[test]
fn operator_grammar_agrees_with_its_expansion() {
    // The same language, written with operators and as explicit recursion.
    // Both engines must agree on every byte and on every admissible set.
    let sugared = "start ::= ('a' | 'b')* 'c';";
    let explicit = "start ::= 'c' | body 'c'; body ::= 'a' | 'b' | body 'a' | body 'b';";
    let tokens = &["a", "b", "c"];
    let mut inputs: Vec<Vec<u8>> = vec![Vec::new()];
    for _ in 0..4 {
        inputs = inputs
            .iter()
            .flat_map(|input| {
                b"abc".iter().map(move |&byte| {
                    let mut grown = input.clone();
                    grown.push(byte);
                    grown
                })
            })
            .collect();
    }
    for input in inputs {
        let mut left = make_engine(sugared, tokens);
        let mut right = make_engine(explicit, tokens);
        for &byte in &input {
            let l = left.advance_bytes(&[byte]);
            let r = right.advance_bytes(&[byte]);
            assert_eq!(l, r, "results diverge on {input:?}");
            if l != AdvanceResult::Accepted {
                break;
            }
            assert_eq!(
                allowed_strings(&mut left),
                allowed_strings(&mut right),
                "admissible sets diverge on {input:?}"
            );
        }
    }
}

#[test]
fn nested_grammars_mix_regexes_and_structure() {
    // A linked-list-like shape: cells of digits separated by arrows.
    let grammar = "start ::= cell '\\n'; cell ::= #'[0-9]+' | #'[0-9]+' '->' cell;";
    let mut engine = make_engine(grammar, &["1", "->", "\n"]);
    for _ in 0..4 {
        assert_eq!(advance_str(&mut engine, "1"), AdvanceResult::Accepted);
        assert_eq!(advance_str(&mut engine, "->"), AdvanceResult::Accepted);
    }
    assert_eq!(advance_str(&mut engine, "1"), AdvanceResult::Accepted);
    assert_eq!(advance_str(&mut engine, "\n"), AdvanceResult::Exhausted);
}
