//! Rewrites the parsed syntax tree into the normal form the recognizer
//! consumes: two-level rules whose productions are flat sequences of
//! terminals, nonterminals, regexes and exclusions, with no ε productions,
//! no unit productions and no unreachable or unproductive rules.
use ahash::{AHashMap, AHashSet};
use std::num::NonZeroU8;
use string_interner::{DefaultStringInterner, DefaultSymbol, Symbol as _};

use crate::grammar::GrammarError;
use crate::parser::{Expr, RawRule};

/// The largest `max_tokens` bound `except!` supports.
pub(crate) const MAX_EXCLUSION_TOKENS: u32 = 254;

/// A symbol of the normalized grammar. Indices point into the tables of
/// [`NormalizedGrammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NormalSymbol {
    Terminal(usize),
    Nonterminal(usize),
    Regex(usize),
    Exclusion {
        pattern: usize,
        max_tokens: Option<NonZeroU8>,
    },
}

/// The output of normalization, with densely renumbered nonterminals and
/// interned terminal, regex and exclusion tables. Nonterminal 0 is the start.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedGrammar {
    pub(crate) names: Vec<String>,
    pub(crate) rules: Vec<Vec<Vec<NormalSymbol>>>,
    pub(crate) terminals: Vec<Vec<u8>>,
    pub(crate) regexes: Vec<String>,
    /// Each entry is a sorted, deduplicated set of forbidden literals.
    pub(crate) exclusions: Vec<Vec<Vec<u8>>>,
}

/// A symbol of the working grammar during normalization. Terminals and
/// regexes are kept inline so structural comparison of productions is plain
/// equality; exclusion literal sets are interned up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum WSym {
    Terminal(Vec<u8>),
    Nonterminal(usize),
    Regex(String),
    Exclusion {
        pattern: usize,
        max_tokens: Option<NonZeroU8>,
    },
}

type Production = Vec<WSym>;
type Rules = Vec<Vec<Production>>;

struct Workspace {
    interner: DefaultStringInterner,
    /// Indexed by interned symbol; empty for undefined names, which only the
    /// validation path ever observes.
    rules: Rules,
    defined: Vec<bool>,
    exclusions: Vec<Vec<Vec<u8>>>,
    exclusion_index: AHashMap<Vec<Vec<u8>>, usize>,
}

impl Workspace {
    fn name(&self, id: usize) -> &str {
        DefaultSymbol::try_from_usize(id)
            .and_then(|symbol| self.interner.resolve(symbol))
            .unwrap_or("<unknown>")
    }

    fn intern_name(&mut self, name: &str, defined: bool) -> usize {
        let id = self.interner.get_or_intern(name).to_usize();
        if id >= self.rules.len() {
            self.rules.resize_with(id + 1, Vec::new);
            self.defined.resize(id + 1, false);
        }
        self.defined[id] |= defined;
        id
    }

    fn fresh_nonterminal(&mut self, hint: &str) -> usize {
        let mut n = 0usize;
        loop {
            let candidate = format!("__{hint}_{n}");
            if self.interner.get(&candidate).is_none() {
                return self.intern_name(&candidate, true);
            }
            n += 1;
        }
    }

    fn intern_exclusion(&mut self, mut literals: Vec<Vec<u8>>) -> usize {
        literals.sort();
        literals.dedup();
        if let Some(&id) = self.exclusion_index.get(&literals) {
            return id;
        }
        let id = self.exclusions.len();
        self.exclusions.push(literals.clone());
        self.exclusion_index.insert(literals, id);
        id
    }
}

pub(crate) fn normalize(
    raw_rules: Vec<RawRule>,
    start_name: &str,
) -> Result<NormalizedGrammar, GrammarError> {
    // Same-LHS rules merge into one alternation, preserving order.
    let mut ast: AHashMap<String, Vec<Expr>> = AHashMap::default();
    let mut order: Vec<String> = Vec::new();
    for rule in raw_rules {
        let branches = ast.entry(rule.lhs.clone()).or_insert_with(|| {
            order.push(rule.lhs.clone());
            Vec::new()
        });
        branches.push(rule.rhs);
    }

    let mut workspace = Workspace {
        interner: DefaultStringInterner::default(),
        rules: Vec::new(),
        defined: Vec::new(),
        exclusions: Vec::new(),
        exclusion_index: AHashMap::default(),
    };
    for name in &order {
        workspace.intern_name(name, true);
    }
    let start = match workspace.interner.get(start_name) {
        Some(symbol) => symbol.to_usize(),
        None => {
            return Err(GrammarError::UndefinedStartNonterminal(
                start_name.to_string(),
            ))
        }
    };

    flatten(&mut workspace, &ast, &order)?;

    let mut rules = std::mem::take(&mut workspace.rules);
    loop {
        let mut changed = merge_adjacent_terminals(&mut rules);
        changed |= dedup_productions(&mut rules);
        changed |= eliminate_nullables(&mut rules);
        changed |= eliminate_unit_rules(&mut rules);
        changed |= merge_identical_nonterminals(&mut rules, start);
        changed |= prune_useless(&mut rules, start, &workspace)?;
        if !changed {
            break;
        }
    }

    Ok(renumber(rules, start, &workspace))
}

/// Rewrites every rule into two-level form: a list of productions whose
/// elements are atomic symbols. `?`, `*`, `+` and nested alternations expand
/// through fresh nonterminals on an explicit worklist, so expansion depth is
/// bounded by the worklist rather than the call stack.
fn flatten(
    workspace: &mut Workspace,
    ast: &AHashMap<String, Vec<Expr>>,
    order: &[String],
) -> Result<(), GrammarError> {
    let mut work: Vec<(usize, Expr)> = Vec::new();
    for name in order {
        let id = workspace.intern_name(name, true);
        work.push((id, Expr::Alt(ast[name].clone())));
    }
    while let Some((id, expr)) = work.pop() {
        let owner = workspace.name(id).to_string();
        let mut productions = Vec::new();
        for branch in split_alternatives(expr) {
            let mut production = Vec::new();
            for element in split_sequence(branch) {
                match element {
                    Expr::Literal(bytes) => {
                        // The empty literal denotes ε and contributes nothing.
                        if !bytes.is_empty() {
                            production.push(WSym::Terminal(bytes));
                        }
                    }
                    Expr::Regex(pattern) => production.push(WSym::Regex(pattern)),
                    Expr::Symbol(name) => {
                        let referenced = match workspace.interner.get(&name) {
                            Some(symbol) => symbol.to_usize(),
                            None => return Err(GrammarError::UndefinedNonterminal(name)),
                        };
                        if !workspace.defined[referenced] {
                            return Err(GrammarError::UndefinedNonterminal(name));
                        }
                        production.push(WSym::Nonterminal(referenced));
                    }
                    Expr::AnyToken => {
                        let pattern = workspace.intern_exclusion(Vec::new());
                        production.push(WSym::Exclusion {
                            pattern,
                            max_tokens: NonZeroU8::new(1),
                        });
                    }
                    Expr::Except {
                        pattern,
                        max_tokens,
                    } => {
                        let max_tokens = match max_tokens {
                            None => None,
                            Some(n) if (1..=MAX_EXCLUSION_TOKENS).contains(&n) => {
                                NonZeroU8::new(n as u8)
                            }
                            Some(n) => {
                                return Err(GrammarError::InvalidExclusionBound(owner.clone(), n))
                            }
                        };
                        let mut visiting = AHashSet::default();
                        let literals =
                            exclusion_literals(&owner, &pattern, ast, &mut visiting)?;
                        if literals.iter().any(|l| l.is_empty()) {
                            return Err(GrammarError::EmptyExclusionLiteral(owner.clone()));
                        }
                        let pattern = workspace.intern_exclusion(literals);
                        production.push(WSym::Exclusion {
                            pattern,
                            max_tokens,
                        });
                    }
                    Expr::Optional(inner) => {
                        let fresh = workspace.fresh_nonterminal("opt");
                        work.push((fresh, Expr::Alt(vec![Expr::Concat(Vec::new()), *inner])));
                        production.push(WSym::Nonterminal(fresh));
                    }
                    Expr::ZeroOrMore(inner) => {
                        let fresh = workspace.fresh_nonterminal("star");
                        let fresh_name = workspace.name(fresh).to_string();
                        work.push((
                            fresh,
                            Expr::Alt(vec![
                                Expr::Concat(Vec::new()),
                                (*inner).clone(),
                                Expr::Concat(vec![Expr::Symbol(fresh_name), *inner]),
                            ]),
                        ));
                        production.push(WSym::Nonterminal(fresh));
                    }
                    Expr::OneOrMore(inner) => {
                        let fresh = workspace.fresh_nonterminal("plus");
                        let fresh_name = workspace.name(fresh).to_string();
                        work.push((
                            fresh,
                            Expr::Alt(vec![
                                (*inner).clone(),
                                Expr::Concat(vec![Expr::Symbol(fresh_name), *inner]),
                            ]),
                        ));
                        production.push(WSym::Nonterminal(fresh));
                    }
                    Expr::Alt(branches) => {
                        let fresh = workspace.fresh_nonterminal("group");
                        work.push((fresh, Expr::Alt(branches)));
                        production.push(WSym::Nonterminal(fresh));
                    }
                    Expr::Concat(_) => {
                        debug_assert!(false, "split_sequence flattens concatenations");
                    }
                }
            }
            productions.push(production);
        }
        workspace.rules[id] = productions;
    }
    Ok(())
}

fn split_alternatives(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::Alt(branches) => branches.into_iter().flat_map(split_alternatives).collect(),
        other => vec![other],
    }
}

fn split_sequence(expr: Expr) -> Vec<Expr> {
    match expr {
        Expr::Concat(elements) => elements.into_iter().flat_map(split_sequence).collect(),
        other => vec![other],
    }
}

/// Reduces an `except!` pattern to its finite set of forbidden byte strings.
/// Only literals, alternation, concatenation and references to nonterminals
/// that themselves reduce are allowed; recursion through a reference cannot
/// reduce to a finite set and is reported.
fn exclusion_literals(
    owner: &str,
    expr: &Expr,
    ast: &AHashMap<String, Vec<Expr>>,
    visiting: &mut AHashSet<String>,
) -> Result<Vec<Vec<u8>>, GrammarError> {
    match expr {
        Expr::Literal(bytes) => Ok(vec![bytes.clone()]),
        Expr::Alt(branches) => {
            let mut literals = Vec::new();
            for branch in branches {
                literals.extend(exclusion_literals(owner, branch, ast, visiting)?);
            }
            Ok(literals)
        }
        Expr::Concat(elements) => {
            let mut literals: Vec<Vec<u8>> = vec![Vec::new()];
            for element in elements {
                let suffixes = exclusion_literals(owner, element, ast, visiting)?;
                let mut next = Vec::with_capacity(literals.len() * suffixes.len());
                for prefix in &literals {
                    for suffix in &suffixes {
                        let mut combined = prefix.clone();
                        combined.extend_from_slice(suffix);
                        next.push(combined);
                    }
                }
                literals = next;
            }
            Ok(literals)
        }
        Expr::Symbol(name) => {
            if !visiting.insert(name.clone()) {
                return Err(GrammarError::RecursiveExclusion(
                    owner.to_string(),
                    name.clone(),
                ));
            }
            let branches = ast
                .get(name)
                .ok_or_else(|| GrammarError::UndefinedNonterminal(name.clone()))?;
            let mut literals = Vec::new();
            for branch in branches {
                literals.extend(exclusion_literals(owner, branch, ast, visiting)?);
            }
            visiting.remove(name);
            Ok(literals)
        }
        _ => Err(GrammarError::ExclusionNotLiteral(owner.to_string())),
    }
}

fn merge_adjacent_terminals(rules: &mut Rules) -> bool {
    let mut changed = false;
    for rule in rules.iter_mut() {
        for production in rule.iter_mut() {
            let mut merged: Production = Vec::with_capacity(production.len());
            for symbol in production.drain(..) {
                match (merged.last_mut(), symbol) {
                    (Some(WSym::Terminal(head)), WSym::Terminal(tail)) => {
                        head.extend_from_slice(&tail);
                        changed = true;
                    }
                    (_, symbol) => merged.push(symbol),
                }
            }
            *production = merged;
        }
    }
    changed
}

fn dedup_productions(rules: &mut Rules) -> bool {
    let mut changed = false;
    for rule in rules.iter_mut() {
        let mut seen: AHashSet<Production> = AHashSet::with_capacity(rule.len());
        let before = rule.len();
        rule.retain(|production| seen.insert(production.clone()));
        changed |= rule.len() != before;
    }
    changed
}

fn nullable_set(rules: &Rules) -> Vec<bool> {
    let mut nullable = vec![false; rules.len()];
    loop {
        let mut changed = false;
        for (id, rule) in rules.iter().enumerate() {
            if nullable[id] {
                continue;
            }
            let derives_empty = rule.iter().any(|production| {
                production.iter().all(|symbol| match symbol {
                    WSym::Nonterminal(n) => nullable[*n],
                    _ => false,
                })
            });
            if derives_empty {
                nullable[id] = true;
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

/// Removes ε productions. Every production gains variants omitting any subset
/// of its nullable nonterminal occurrences, then empty productions are
/// dropped. A nonterminal that could only derive ε ends up with no
/// productions and is cleaned up by [`prune_useless`].
fn eliminate_nullables(rules: &mut Rules) -> bool {
    let nullable = nullable_set(rules);
    if !nullable.iter().any(|&n| n) {
        return false;
    }
    for rule in rules.iter_mut() {
        let mut seen: AHashSet<Production> = AHashSet::default();
        let mut queue: Vec<Production> = rule.drain(..).collect();
        let mut kept = Vec::new();
        while let Some(production) = queue.pop() {
            if !seen.insert(production.clone()) {
                continue;
            }
            for (position, symbol) in production.iter().enumerate() {
                if let WSym::Nonterminal(n) = symbol {
                    if nullable[*n] {
                        let mut variant = production.clone();
                        variant.remove(position);
                        queue.push(variant);
                    }
                }
            }
            if !production.is_empty() {
                kept.push(production);
            }
        }
        *rule = kept;
    }
    // A nullable nonterminal implies at least one ε production was dropped.
    true
}

fn is_unit(production: &Production) -> Option<usize> {
    match production.as_slice() {
        [WSym::Nonterminal(n)] => Some(*n),
        _ => None,
    }
}

/// Replaces unit productions `A ::= B` by the closure of non-unit productions
/// reachable through unit chains, which is safe under unit cycles.
fn eliminate_unit_rules(rules: &mut Rules) -> bool {
    let snapshot = rules.clone();
    let mut changed = false;
    for id in 0..rules.len() {
        if rules[id].iter().all(|p| is_unit(p).is_none()) {
            continue;
        }
        changed = true;
        let mut visited = vec![false; snapshot.len()];
        visited[id] = true;
        let mut stack = vec![id];
        let mut seen: AHashSet<Production> = AHashSet::default();
        let mut closure = Vec::new();
        while let Some(current) = stack.pop() {
            for production in &snapshot[current] {
                match is_unit(production) {
                    Some(target) => {
                        if !visited[target] {
                            visited[target] = true;
                            stack.push(target);
                        }
                    }
                    None => {
                        if seen.insert(production.clone()) {
                            closure.push(production.clone());
                        }
                    }
                }
            }
        }
        rules[id] = closure;
    }
    changed
}

/// Merges nonterminals with structurally identical rule bodies, comparing
/// self-references symbolically so directly self-recursive duplicates merge
/// too. The start nonterminal is always the surviving representative of its
/// class.
fn merge_identical_nonterminals(rules: &mut Rules, start: usize) -> bool {
    let mut any_change = false;
    loop {
        let mut signature_to_id: AHashMap<Vec<Production>, usize> = AHashMap::default();
        let mut remap: AHashMap<usize, usize> = AHashMap::default();
        let order = std::iter::once(start).chain((0..rules.len()).filter(|&id| id != start));
        for id in order {
            if rules[id].is_empty() {
                continue;
            }
            let mut signature = rules[id].clone();
            for production in signature.iter_mut() {
                for symbol in production.iter_mut() {
                    if *symbol == WSym::Nonterminal(id) {
                        *symbol = WSym::Nonterminal(usize::MAX);
                    }
                }
            }
            signature.sort();
            match signature_to_id.get(&signature) {
                Some(&representative) => {
                    remap.insert(id, representative);
                }
                None => {
                    signature_to_id.insert(signature, id);
                }
            }
        }
        if remap.is_empty() {
            return any_change;
        }
        any_change = true;
        for (&id, _) in remap.iter() {
            rules[id].clear();
        }
        for rule in rules.iter_mut() {
            for production in rule.iter_mut() {
                for symbol in production.iter_mut() {
                    if let WSym::Nonterminal(n) = symbol {
                        if let Some(&representative) = remap.get(n) {
                            *symbol = WSym::Nonterminal(representative);
                        }
                    }
                }
            }
        }
    }
}

/// Drops productions that cannot derive any byte string and rules that the
/// start nonterminal cannot reach. An unproductive start is an error: the
/// grammar would reject every input.
fn prune_useless(
    rules: &mut Rules,
    start: usize,
    workspace: &Workspace,
) -> Result<bool, GrammarError> {
    let mut generating = vec![false; rules.len()];
    loop {
        let mut grew = false;
        for (id, rule) in rules.iter().enumerate() {
            if generating[id] {
                continue;
            }
            let derives = rule.iter().any(|production| {
                production.iter().all(|symbol| match symbol {
                    WSym::Nonterminal(n) => generating[*n],
                    _ => true,
                })
            });
            if derives {
                generating[id] = true;
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    if !generating[start] {
        return Err(GrammarError::UnproductiveNonterminal(
            workspace.name(start).to_string(),
        ));
    }
    let mut changed = false;
    for rule in rules.iter_mut() {
        let before = rule.len();
        rule.retain(|production| {
            production.iter().all(|symbol| match symbol {
                WSym::Nonterminal(n) => generating[*n],
                _ => true,
            })
        });
        changed |= rule.len() != before;
    }
    let mut reachable = vec![false; rules.len()];
    reachable[start] = true;
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        for production in &rules[id] {
            for symbol in production {
                if let WSym::Nonterminal(n) = symbol {
                    if !reachable[*n] {
                        reachable[*n] = true;
                        stack.push(*n);
                    }
                }
            }
        }
    }
    for (id, rule) in rules.iter_mut().enumerate() {
        if !reachable[id] && !rule.is_empty() {
            rule.clear();
            changed = true;
        }
    }
    Ok(changed)
}

/// Renumbers surviving nonterminals densely (start first) and interns the
/// terminal, regex and exclusion tables.
fn renumber(rules: Rules, start: usize, workspace: &Workspace) -> NormalizedGrammar {
    let order: Vec<usize> = std::iter::once(start)
        .chain((0..rules.len()).filter(|&id| id != start && !rules[id].is_empty()))
        .collect();
    let mut id_map: AHashMap<usize, usize> = AHashMap::with_capacity(order.len());
    for (new_id, &old_id) in order.iter().enumerate() {
        id_map.insert(old_id, new_id);
    }

    let mut terminals: Vec<Vec<u8>> = Vec::new();
    let mut terminal_index: AHashMap<Vec<u8>, usize> = AHashMap::default();
    let mut regexes: Vec<String> = Vec::new();
    let mut regex_index: AHashMap<String, usize> = AHashMap::default();
    let mut exclusions: Vec<Vec<Vec<u8>>> = Vec::new();
    let mut exclusion_map: AHashMap<usize, usize> = AHashMap::default();

    let mut out_rules = Vec::with_capacity(order.len());
    let mut names = Vec::with_capacity(order.len());
    for &old_id in &order {
        names.push(workspace.name(old_id).to_string());
        let mut out_rule = Vec::with_capacity(rules[old_id].len());
        for production in &rules[old_id] {
            let mut out_production = Vec::with_capacity(production.len());
            for symbol in production {
                out_production.push(match symbol {
                    WSym::Terminal(bytes) => {
                        let index = *terminal_index.entry(bytes.clone()).or_insert_with(|| {
                            terminals.push(bytes.clone());
                            terminals.len() - 1
                        });
                        NormalSymbol::Terminal(index)
                    }
                    WSym::Nonterminal(n) => NormalSymbol::Nonterminal(id_map[n]),
                    WSym::Regex(pattern) => {
                        let index = *regex_index.entry(pattern.clone()).or_insert_with(|| {
                            regexes.push(pattern.clone());
                            regexes.len() - 1
                        });
                        NormalSymbol::Regex(index)
                    }
                    WSym::Exclusion {
                        pattern,
                        max_tokens,
                    } => {
                        let index = *exclusion_map.entry(*pattern).or_insert_with(|| {
                            exclusions.push(workspace.exclusions[*pattern].clone());
                            exclusions.len() - 1
                        });
                        NormalSymbol::Exclusion {
                            pattern: index,
                            max_tokens: *max_tokens,
                        }
                    }
                });
            }
            out_rule.push(out_production);
        }
        out_rules.push(out_rule);
    }
    NormalizedGrammar {
        names,
        rules: out_rules,
        terminals,
        regexes,
        exclusions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn normalized(source: &str, start: &str) -> NormalizedGrammar {
        normalize(parse(source).unwrap(), start).unwrap()
    }

    fn assert_lnf(grammar: &NormalizedGrammar) {
        for rule in &grammar.rules {
            for production in rule {
                assert!(!production.is_empty(), "ε production survived");
                assert!(
                    production.len() != 1
                        || !matches!(production[0], NormalSymbol::Nonterminal(_)),
                    "unit production survived"
                );
            }
        }
    }

    #[test]
    fn literals_merge_and_dedup() {
        let grammar = normalized("start ::= 'a' 'b' | 'ab';", "start");
        assert_lnf(&grammar);
        assert_eq!(grammar.rules[0].len(), 1);
        assert_eq!(grammar.terminals, vec![b"ab".to_vec()]);
    }

    #[test]
    fn operators_reduce_to_plus_of_base() {
        // A ::= B+; B ::= C? is C* as written; the eager normal form drops ε
        // from the start, leaving the language x+.
        let grammar = normalized("A ::= B+; B ::= C?; C ::= 'x';", "A");
        assert_lnf(&grammar);
        assert_eq!(grammar.terminals, vec![b"x".to_vec()]);
        // No unreachable leftovers from the expansion.
        for rule in &grammar.rules {
            assert!(!rule.is_empty());
        }
    }

    #[test]
    fn nullable_elimination_is_transitive() {
        let grammar = normalized("start ::= a b 'z'; a ::= 'x'?; b ::= a a;", "start");
        assert_lnf(&grammar);
        // 'z' alone must be derivable: a and b are both nullable.
        let has_single_z = grammar.rules[0].iter().any(|production| {
            production.len() == 1
                && matches!(production[0], NormalSymbol::Terminal(t) if grammar.terminals[t] == b"z".to_vec())
        });
        assert!(has_single_z);
    }

    #[test]
    fn identical_nonterminals_merge() {
        let grammar = normalized("start ::= a | b; a ::= 'x' a | 'y'; b ::= 'x' b | 'y';", "start");
        assert_lnf(&grammar);
        // a and b collapse to one nonterminal besides start.
        assert_eq!(grammar.rules.len(), 2);
    }

    #[test]
    fn unreachable_rules_are_dropped() {
        let grammar = normalized("start ::= 'a'; dead ::= 'b';", "start");
        assert_eq!(grammar.rules.len(), 1);
        assert_eq!(grammar.names, vec!["start".to_string()]);
    }

    #[test]
    fn unproductive_start_is_an_error() {
        let error = normalize(parse("start ::= start 'a';").unwrap(), "start").unwrap_err();
        assert!(matches!(error, GrammarError::UnproductiveNonterminal(_)));
    }

    #[test]
    fn exclusion_patterns_reduce_through_references() {
        let grammar = normalized(
            "start ::= except!(ws, 4) ';'; ws ::= ' ' | '\\t' | ' ' '\\t';",
            "start",
        );
        assert_eq!(grammar.exclusions.len(), 1);
        let mut expected = vec![b"\t".to_vec(), b" ".to_vec(), b" \t".to_vec()];
        expected.sort();
        assert_eq!(grammar.exclusions[0], expected);
    }

    #[test]
    fn recursive_exclusion_is_an_error() {
        let error = normalize(
            parse("start ::= except!(a); a ::= 'x' | a 'y';").unwrap(),
            "start",
        )
        .unwrap_err();
        assert!(matches!(error, GrammarError::RecursiveExclusion(_, _)));
    }

    #[test]
    fn exclusion_bound_is_range_checked() {
        let error = normalize(parse("start ::= except!('x', 0);").unwrap(), "start").unwrap_err();
        assert!(matches!(error, GrammarError::InvalidExclusionBound(_, 0)));
        let error = normalize(parse("start ::= except!('x', 255);").unwrap(), "start").unwrap_err();
        assert!(matches!(error, GrammarError::InvalidExclusionBound(_, 255)));
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let error = normalize(parse("start ::= missing;").unwrap(), "start").unwrap_err();
        assert!(matches!(error, GrammarError::UndefinedNonterminal(name) if name == "missing"));
        let error = normalize(parse("a ::= 'x';").unwrap(), "start").unwrap_err();
        assert!(matches!(error, GrammarError::UndefinedStartNonterminal(_)));
    }
}
