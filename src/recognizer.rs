//! The byte-level Earley recognizer with Leo's right-recursion optimization,
//! column compaction and truncation-based rollback.
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use fixedbitset::FixedBitSet;

use crate::automata::ScanOutcome;
use crate::grammar::{GrammarStore, NonterminalId, Symbol, UNBOUNDED_BUDGET};
use crate::utils::{self, ByteSet};

/// One Earley item: a dotted production with its origin column, the backing
/// automaton state for the symbol under the dot, and the remaining token
/// budget for an exclusion under the dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EarleyItem {
    pub(crate) nonterminal: NonterminalId,
    pub(crate) production: u32,
    pub(crate) dot: u32,
    pub(crate) start: u32,
    /// Terminal offset, packed DFA state, or 0 for a nonterminal under the
    /// dot.
    pub(crate) state: u32,
    /// [`UNBOUNDED_BUDGET`] unless an exclusion with `max_tokens` is under
    /// the dot.
    pub(crate) budget: u8,
}

/// A completed nonterminal waiting to advance its parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ToBeCompletedItem {
    nonterminal: NonterminalId,
    start: u32,
}

/// A (nonterminal, column) pair: "items in `column` with `postdot_nonterminal`
/// after the dot".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Dotted {
    postdot_nonterminal: NonterminalId,
    column: u32,
}

/// The items of one column sharing a postdot nonterminal. A single item whose
/// advance completes its production is Leo eligible; anything else keeps the
/// plain item list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PostDotItems {
    LeoEligible(EarleyItem),
    NormalItems(Vec<EarleyItem>),
}

pub(crate) struct Recognizer {
    grammar: Arc<GrammarStore>,
    earley_sets: Vec<Vec<EarleyItem>>,
    to_be_completed_items: AHashSet<ToBeCompletedItem>,
    to_be_completed_items_buffer: AHashSet<ToBeCompletedItem>,
    deduplication_buffer: AHashSet<EarleyItem>,
    postdot_items: AHashMap<Dotted, PostDotItems>,
    /// Postdot keys registered since the last commit; rollback removes
    /// exactly these.
    postdot_items_since_last_commit: AHashSet<Dotted>,
    column_to_postdot_nonterminals: AHashMap<u32, AHashSet<NonterminalId>>,
    /// Leo memo: the topmost completion each postdot key transitively
    /// resolves to.
    leo_items: AHashMap<Dotted, ToBeCompletedItem>,
    /// Memo keys inserted since the last commit. The memo only ever caches
    /// chains through committed postdot entries once these are dropped, so
    /// rollback removes exactly these.
    leo_items_since_last_commit: AHashSet<Dotted>,
    leo_items_buffer: Vec<ToBeCompletedItem>,
    already_predicted_nonterminals: FixedBitSet,
    finished: bool,
    compaction_enabled: bool,
    /// Cumulative count of item touches, for scaling assertions.
    ops: u64,
}

impl Clone for Recognizer {
    fn clone(&self) -> Self {
        Self {
            grammar: Arc::clone(&self.grammar),
            earley_sets: self.earley_sets.clone(),
            to_be_completed_items: self.to_be_completed_items.clone(),
            to_be_completed_items_buffer: self.to_be_completed_items_buffer.clone(),
            deduplication_buffer: self.deduplication_buffer.clone(),
            postdot_items: self.postdot_items.clone(),
            postdot_items_since_last_commit: self.postdot_items_since_last_commit.clone(),
            column_to_postdot_nonterminals: self.column_to_postdot_nonterminals.clone(),
            leo_items: self.leo_items.clone(),
            leo_items_since_last_commit: self.leo_items_since_last_commit.clone(),
            leo_items_buffer: self.leo_items_buffer.clone(),
            already_predicted_nonterminals: self.already_predicted_nonterminals.clone(),
            finished: self.finished,
            compaction_enabled: self.compaction_enabled,
            ops: self.ops,
        }
    }
}

impl Recognizer {
    pub(crate) fn new(grammar: Arc<GrammarStore>, compaction_enabled: bool) -> Self {
        let nonterminal_count = grammar.nonterminal_count();
        let mut recognizer = Self {
            grammar,
            earley_sets: Vec::new(),
            to_be_completed_items: AHashSet::default(),
            to_be_completed_items_buffer: AHashSet::default(),
            deduplication_buffer: AHashSet::default(),
            postdot_items: AHashMap::default(),
            postdot_items_since_last_commit: AHashSet::default(),
            column_to_postdot_nonterminals: AHashMap::default(),
            leo_items: AHashMap::default(),
            leo_items_since_last_commit: AHashSet::default(),
            leo_items_buffer: Vec::new(),
            already_predicted_nonterminals: FixedBitSet::with_capacity(nonterminal_count),
            finished: false,
            compaction_enabled,
            ops: 0,
        };
        recognizer.reset();
        recognizer
    }

    /// The committed columns; the engine keys its cache on a clone of these.
    pub(crate) fn columns(&self) -> &Vec<Vec<EarleyItem>> {
        &self.earley_sets
    }

    pub(crate) fn len(&self) -> usize {
        self.earley_sets.len()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn item_operations(&self) -> u64 {
        self.ops
    }

    /// Reinitializes column 0. Does not touch the grammar or counters.
    pub(crate) fn reset(&mut self) {
        self.earley_sets.clear();
        self.to_be_completed_items.clear();
        self.to_be_completed_items_buffer.clear();
        self.deduplication_buffer.clear();
        self.postdot_items.clear();
        self.postdot_items_since_last_commit.clear();
        self.column_to_postdot_nonterminals.clear();
        self.leo_items.clear();
        self.leo_items_since_last_commit.clear();
        self.leo_items_buffer.clear();
        self.already_predicted_nonterminals.clear();
        self.finished = false;
        self.earley_sets.push(Vec::new());
        let start = self.grammar.start_nonterminal();
        self.predict_nonterminal(start, 0);
        self.predict();
        self.update_postdot_items();
        self.commit();
    }

    /// Feeds one byte. Returns false and rolls back to `checkpoint` when the
    /// byte is inconsistent with the grammar (or the grammar is already
    /// satisfied). `token_start` charges exclusion token budgets;
    /// `allow_compact` is off during token-filter probing so rollback stays a
    /// truncation.
    pub(crate) fn accept_byte(
        &mut self,
        checkpoint: usize,
        token_start: bool,
        allow_compact: bool,
        byte: u8,
    ) -> bool {
        if self.finished {
            self.revert_to(checkpoint);
            return false;
        }
        self.scan(byte, token_start);
        if self.is_rejected() {
            self.revert_to(checkpoint);
            return false;
        }
        self.complete();
        if allow_compact && self.compaction_enabled {
            self.compact(checkpoint);
        }
        self.predict();
        self.update_postdot_items();
        true
    }

    /// Accepts the bytes consumed since the last commit as permanent and
    /// compacts the committed columns. Mid-token compaction cannot touch
    /// columns below the token checkpoint (rollback must stay a truncation),
    /// so the cross-token cleanup that lets recognizer states converge and
    /// the cache hit happens here, where nothing can be rolled back anymore.
    pub(crate) fn commit(&mut self) {
        self.postdot_items_since_last_commit.clear();
        self.leo_items_since_last_commit.clear();
        if self.compaction_enabled {
            self.compact_committed();
        }
    }

    /// Rolls back to a committed column count. Only sound because columns at
    /// or above the checkpoint are never compacted away before a commit.
    pub(crate) fn revert_to(&mut self, checkpoint: usize) {
        self.earley_sets.truncate(checkpoint);
        self.finished = false;
        let mut emptied_columns = Vec::new();
        for dotted in self.postdot_items_since_last_commit.drain() {
            self.postdot_items.remove(&dotted);
            self.leo_items.remove(&dotted);
            if let Some(nonterminals) =
                self.column_to_postdot_nonterminals.get_mut(&dotted.column)
            {
                nonterminals.remove(&dotted.postdot_nonterminal);
                if nonterminals.is_empty() {
                    emptied_columns.push(dotted.column);
                }
            }
        }
        for column in emptied_columns {
            self.column_to_postdot_nonterminals.remove(&column);
        }
        for dotted in self.leo_items_since_last_commit.drain() {
            self.leo_items.remove(&dotted);
        }
        self.to_be_completed_items.clear();
        self.to_be_completed_items_buffer.clear();
        self.deduplication_buffer.clear();
    }

    /// Writes the union of bytes any item in the last column can scan.
    pub(crate) fn collect_allowed_first_bytes(&self, allowed: &mut ByteSet) {
        allowed.clear();
        let column = self.earley_sets.len() - 1;
        for item in &self.earley_sets[column] {
            match self
                .grammar
                .symbol(item.nonterminal, item.production, item.dot)
            {
                Symbol::Terminal(terminal) => {
                    let byte = self.grammar.terminal(terminal)[item.state as usize];
                    allowed.insert(byte as usize);
                }
                Symbol::Regex(automaton) => {
                    if let Some(bytes) = self.grammar.regex(automaton).first_bytes(item.state) {
                        allowed.union_with(bytes);
                    }
                }
                Symbol::Exclusion { automaton, .. } => {
                    if item.budget == 0 {
                        continue;
                    }
                    if let Some(bytes) = self.grammar.exclusion(automaton).first_bytes(item.state)
                    {
                        allowed.union_with(bytes);
                    }
                }
                Symbol::Nonterminal(_) => {}
            }
        }
    }

    /// The automaton state and budget a symbol starts in.
    fn initial_state(grammar: &GrammarStore, symbol: Symbol) -> (u32, u8) {
        match symbol {
            Symbol::Terminal(_) | Symbol::Nonterminal(_) => (0, UNBOUNDED_BUDGET),
            Symbol::Regex(automaton) => (grammar.regex(automaton).start_bits(), UNBOUNDED_BUDGET),
            Symbol::Exclusion { automaton, budget } => {
                (grammar.exclusion(automaton).start_bits(), budget)
            }
        }
    }

    /// Moves the dot of `item` one symbol right. A still-incomplete item is
    /// returned with the next symbol's initial state; a complete one becomes
    /// a pending completion.
    fn advanced(grammar: &GrammarStore, mut item: EarleyItem) -> Result<EarleyItem, ToBeCompletedItem> {
        let dot = item.dot + 1;
        if (dot as usize) < grammar.production_len(item.nonterminal, item.production) {
            let symbol = grammar.symbol(item.nonterminal, item.production, dot);
            let (state, budget) = Self::initial_state(grammar, symbol);
            item.dot = dot;
            item.state = state;
            item.budget = budget;
            Ok(item)
        } else {
            Err(ToBeCompletedItem {
                nonterminal: item.nonterminal,
                start: item.start,
            })
        }
    }

    fn scan(&mut self, byte: u8, token_start: bool) {
        let column = self.earley_sets.len() - 1;
        let capacity = self.earley_sets[column].len();
        self.earley_sets.push(Vec::with_capacity(capacity));
        let (head, tail) = self.earley_sets.split_at_mut(column + 1);
        let current = &head[column];
        let next = &mut tail[0];
        let to_be_completed = &mut self.to_be_completed_items;
        let grammar: &GrammarStore = &self.grammar;
        self.ops += current.len() as u64;
        for &original in current {
            let mut item = original;
            match grammar.symbol(item.nonterminal, item.production, item.dot) {
                Symbol::Terminal(terminal) => {
                    let bytes = grammar.terminal(terminal);
                    let offset = item.state as usize;
                    if bytes[offset] == byte {
                        if offset + 1 == bytes.len() {
                            match Self::advanced(grammar, item) {
                                Ok(advanced) => next.push(advanced),
                                Err(completed) => {
                                    to_be_completed.insert(completed);
                                }
                            }
                        } else {
                            item.state += 1;
                            next.push(item);
                        }
                    }
                }
                Symbol::Regex(automaton) => {
                    let automaton = grammar.regex(automaton);
                    let (state, outcome) = automaton.step(item.state, byte);
                    match outcome {
                        ScanOutcome::Reject => {}
                        ScanOutcome::Accept => {
                            // The regex may still be extensible, so the item
                            // both advances and keeps scanning.
                            match Self::advanced(grammar, item) {
                                Ok(advanced) => next.push(advanced),
                                Err(completed) => {
                                    to_be_completed.insert(completed);
                                }
                            }
                            item.state = state;
                            next.push(item);
                        }
                        ScanOutcome::InProgress => {
                            item.state = state;
                            next.push(item);
                        }
                    }
                }
                Symbol::Exclusion { automaton, .. } => {
                    let automaton = grammar.exclusion(automaton);
                    let (state, outcome) = automaton.step(item.state, byte);
                    // A forbidden literal just ended here; the branch dies.
                    // A dead scanner state is the opposite: the literals can
                    // never occur, and the item scans on unconditionally.
                    if outcome == ScanOutcome::Accept {
                        continue;
                    }
                    if token_start && item.budget != UNBOUNDED_BUDGET {
                        if item.budget == 0 {
                            continue;
                        }
                        item.budget -= 1;
                    }
                    match Self::advanced(grammar, item) {
                        Ok(advanced) => next.push(advanced),
                        Err(completed) => {
                            to_be_completed.insert(completed);
                        }
                    }
                    item.state = state;
                    next.push(item);
                }
                Symbol::Nonterminal(_) => {}
            }
        }
    }

    /// Rejection check after scanning: nothing survived and nothing is
    /// pending completion.
    fn is_rejected(&self) -> bool {
        self.earley_sets[self.earley_sets.len() - 1].is_empty()
            && self.to_be_completed_items.is_empty()
    }

    /// Walks the Leo chain upward from `topmost` and memoizes every link.
    /// Returns the replacement completion, or `None` when the chain is
    /// trivial and normal completion applies.
    fn try_leo_complete_item(
        leo_items_buffer: &mut Vec<ToBeCompletedItem>,
        leo_items: &mut AHashMap<Dotted, ToBeCompletedItem>,
        leo_items_since_last_commit: &mut AHashSet<Dotted>,
        postdot_items: &AHashMap<Dotted, PostDotItems>,
        mut topmost: ToBeCompletedItem,
    ) -> Option<ToBeCompletedItem> {
        loop {
            let dotted = Dotted {
                postdot_nonterminal: topmost.nonterminal,
                column: topmost.start,
            };
            if let Some(&memoized) = leo_items.get(&dotted) {
                leo_items_buffer.push(topmost);
                topmost = memoized;
                break;
            }
            match postdot_items.get(&dotted) {
                Some(PostDotItems::LeoEligible(parent)) => {
                    leo_items_buffer.push(topmost);
                    topmost = ToBeCompletedItem {
                        nonterminal: parent.nonterminal,
                        start: parent.start,
                    };
                }
                Some(PostDotItems::NormalItems(_)) | None => break,
            }
        }
        if leo_items_buffer.is_empty() {
            return None;
        }
        for link in leo_items_buffer.drain(..) {
            let dotted = Dotted {
                postdot_nonterminal: link.nonterminal,
                column: link.start,
            };
            // A memo hit re-inserts its own key with the same value; only a
            // genuinely new entry may be torn down on rollback, since a
            // committed alias can be the sole bridge to a compacted column.
            if leo_items.insert(dotted, topmost).is_none() {
                leo_items_since_last_commit.insert(dotted);
            }
        }
        Some(topmost)
    }

    /// Advances all parents of one completed nonterminal.
    fn complete_one(&mut self, completed: ToBeCompletedItem) {
        let grammar: &GrammarStore = &self.grammar;
        let dotted = Dotted {
            postdot_nonterminal: completed.nonterminal,
            column: completed.start,
        };
        if let Some(postdot) = self.postdot_items.get(&dotted) {
            match postdot {
                PostDotItems::NormalItems(parents) => {
                    self.ops += parents.len() as u64;
                    for &parent in parents {
                        match Self::advanced(grammar, parent) {
                            Ok(advanced) => {
                                self.deduplication_buffer.insert(advanced);
                            }
                            Err(pending) => {
                                self.to_be_completed_items_buffer.insert(pending);
                            }
                        }
                    }
                }
                PostDotItems::LeoEligible(_) => {
                    debug_assert!(false, "Leo-eligible keys resolve through the Leo chain");
                }
            }
        }
        if grammar.start_nonterminal() == completed.nonterminal && completed.start == 0 {
            self.finished = true;
        }
    }

    fn complete(&mut self) {
        self.to_be_completed_items_buffer.clear();
        while !self.to_be_completed_items.is_empty() {
            let batch: Vec<ToBeCompletedItem> = self.to_be_completed_items.drain().collect();
            for pending in batch {
                self.ops += 1;
                let resolved = Self::try_leo_complete_item(
                    &mut self.leo_items_buffer,
                    &mut self.leo_items,
                    &mut self.leo_items_since_last_commit,
                    &self.postdot_items,
                    pending,
                );
                self.complete_one(resolved.unwrap_or(pending));
            }
            std::mem::swap(
                &mut self.to_be_completed_items,
                &mut self.to_be_completed_items_buffer,
            );
        }
        let column = self.earley_sets.len() - 1;
        for item in self.deduplication_buffer.drain() {
            self.earley_sets[column].push(item);
        }
    }

    fn predict_nonterminal(&mut self, nonterminal: NonterminalId, column: usize) {
        if self
            .already_predicted_nonterminals
            .contains(nonterminal.0 as usize)
        {
            return;
        }
        self.already_predicted_nonterminals
            .insert(nonterminal.0 as usize);
        let count = self.grammar.productions(nonterminal).len();
        self.ops += count as u64;
        for production in 0..count as u32 {
            let symbol = self.grammar.symbol(nonterminal, production, 0);
            let (state, budget) = Self::initial_state(&self.grammar, symbol);
            self.earley_sets[column].push(EarleyItem {
                nonterminal,
                production,
                dot: 0,
                start: column as u32,
                state,
                budget,
            });
        }
    }

    /// Closes the last column under prediction. The column grows while the
    /// loop runs, so indexing is by position rather than iterator.
    fn predict(&mut self) {
        let column = self.earley_sets.len() - 1;
        let mut i = 0;
        while i < self.earley_sets[column].len() {
            let item = self.earley_sets[column][i];
            if let Symbol::Nonterminal(nonterminal) =
                self.grammar
                    .symbol(item.nonterminal, item.production, item.dot)
            {
                self.predict_nonterminal(nonterminal, column);
            }
            i += 1;
        }
        self.already_predicted_nonterminals.clear();
    }

    /// Groups the last column's items by postdot nonterminal and decides Leo
    /// eligibility: a key is Leo eligible iff it has exactly one item and
    /// advancing that item completes its production. Uniqueness is settled
    /// for the whole column before the completion-adjacency test runs.
    fn update_postdot_items(&mut self) {
        let column = (self.earley_sets.len() - 1) as u32;
        let index = self.earley_sets.len() - 1;
        let mut added_keys: Vec<Dotted> = Vec::new();
        for i in 0..self.earley_sets[index].len() {
            let item = self.earley_sets[index][i];
            let symbol = self
                .grammar
                .symbol(item.nonterminal, item.production, item.dot);
            let Symbol::Nonterminal(nonterminal) = symbol else {
                continue;
            };
            let dotted = Dotted {
                postdot_nonterminal: nonterminal,
                column,
            };
            match self.postdot_items.entry(dotted) {
                Entry::Occupied(mut occupied) => {
                    let value = occupied.get_mut();
                    match value {
                        PostDotItems::LeoEligible(first) => {
                            let first = *first;
                            *value = PostDotItems::NormalItems(vec![first, item]);
                        }
                        PostDotItems::NormalItems(items) => items.push(item),
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(PostDotItems::LeoEligible(item));
                    added_keys.push(dotted);
                    self.postdot_items_since_last_commit.insert(dotted);
                    self.column_to_postdot_nonterminals
                        .entry(column)
                        .or_default()
                        .insert(nonterminal);
                }
            }
        }
        for dotted in added_keys {
            let Some(value) = self.postdot_items.get_mut(&dotted) else {
                continue;
            };
            let item = match value {
                PostDotItems::LeoEligible(item) => *item,
                PostDotItems::NormalItems(_) => continue,
            };
            let completes = (item.dot as usize) + 1
                >= self
                    .grammar
                    .production_len(item.nonterminal, item.production);
            if !completes {
                *value = PostDotItems::NormalItems(vec![item]);
            }
        }
    }

    /// Folds item origins through the Leo memo and drops columns no
    /// surviving origin points into. `floor` protects the columns below the
    /// current token checkpoint so rollback stays a truncation.
    fn compact(&mut self, floor: usize) {
        let index = self.earley_sets.len() - 1;
        let mut max_start = 0usize;
        {
            let column = &mut self.earley_sets[index];
            let leo_items = &mut self.leo_items;
            let leo_items_since_last_commit = &mut self.leo_items_since_last_commit;
            for item in column.iter_mut() {
                let dotted = Dotted {
                    postdot_nonterminal: item.nonterminal,
                    column: item.start,
                };
                if let Some(&leo) = leo_items.get(&dotted) {
                    item.start = leo.start;
                    if item.nonterminal != leo.nonterminal {
                        // The fold may skip the chain's own nonterminal;
                        // alias the key so later folds still resolve.
                        let alias = Dotted {
                            postdot_nonterminal: item.nonterminal,
                            column: item.start,
                        };
                        if leo_items.insert(alias, leo).is_none() {
                            leo_items_since_last_commit.insert(alias);
                        }
                    }
                }
                max_start = max_start.max(item.start as usize);
            }
        }
        let removal_start = (max_start + 1).max(floor);
        if removal_start >= index {
            return;
        }
        self.earley_sets.drain(removal_start..index);
        for column in removal_start..index {
            let Some(nonterminals) = self
                .column_to_postdot_nonterminals
                .remove(&(column as u32))
            else {
                continue;
            };
            for nonterminal in nonterminals {
                let dotted = Dotted {
                    postdot_nonterminal: nonterminal,
                    column: column as u32,
                };
                self.postdot_items.remove(&dotted);
                self.leo_items.remove(&dotted);
                self.postdot_items_since_last_commit.remove(&dotted);
            }
        }
    }

    /// Commit-time compaction. Unlike the per-byte pass this runs after
    /// prediction, so the last column holds predictions whose origin is the
    /// column itself; dropping the unreferenced committed columns below it
    /// shifts the column down, and everything keyed by its old index is
    /// renumbered.
    fn compact_committed(&mut self) {
        let index = self.earley_sets.len() - 1;
        if index == 0 {
            return;
        }
        let mut max_start = 0usize;
        for item in &self.earley_sets[index] {
            if (item.start as usize) < index {
                max_start = max_start.max(item.start as usize);
            }
        }
        let removal_start = max_start + 1;
        if removal_start >= index {
            return;
        }
        self.earley_sets.drain(removal_start..index);
        for column in removal_start..index {
            let Some(nonterminals) = self
                .column_to_postdot_nonterminals
                .remove(&(column as u32))
            else {
                continue;
            };
            for nonterminal in nonterminals {
                let dotted = Dotted {
                    postdot_nonterminal: nonterminal,
                    column: column as u32,
                };
                self.postdot_items.remove(&dotted);
                self.leo_items.remove(&dotted);
            }
        }
        let renumber = |item: &mut EarleyItem| {
            if item.start as usize == index {
                item.start = removal_start as u32;
            }
        };
        for item in self.earley_sets[removal_start].iter_mut() {
            renumber(item);
        }
        let Some(nonterminals) = self
            .column_to_postdot_nonterminals
            .remove(&(index as u32))
        else {
            return;
        };
        for &nonterminal in &nonterminals {
            let old = Dotted {
                postdot_nonterminal: nonterminal,
                column: index as u32,
            };
            let new = Dotted {
                postdot_nonterminal: nonterminal,
                column: removal_start as u32,
            };
            if let Some(mut items) = self.postdot_items.remove(&old) {
                match &mut items {
                    PostDotItems::LeoEligible(item) => renumber(item),
                    PostDotItems::NormalItems(items) => {
                        for item in items.iter_mut() {
                            renumber(item);
                        }
                    }
                }
                self.postdot_items.insert(new, items);
            }
            if let Some(leo) = self.leo_items.remove(&old) {
                self.leo_items.insert(new, leo);
            }
        }
        self.column_to_postdot_nonterminals
            .insert(removal_start as u32, nonterminals);
    }

    fn item_display(&self, item: &EarleyItem) -> String {
        let mut rendered = format!("{} ::=", self.grammar.nonterminal_name(item.nonterminal));
        let len = self
            .grammar
            .production_len(item.nonterminal, item.production);
        for position in 0..len as u32 {
            if position == item.dot {
                rendered.push_str(" .");
            }
            let symbol = self
                .grammar
                .symbol(item.nonterminal, item.production, position);
            rendered.push(' ');
            rendered.push_str(&self.grammar.symbol_display(symbol));
        }
        if item.dot as usize == len {
            rendered.push_str(" .");
        }
        rendered.push_str(&format!(" [{}; state {}", item.start, item.state));
        if item.budget != UNBOUNDED_BUDGET {
            rendered.push_str(&format!("; budget {}", item.budget));
        }
        rendered.push(']');
        rendered
    }
}

impl Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<Vec<String>> = self
            .earley_sets
            .iter()
            .map(|column| column.iter().map(|item| self.item_display(item)).collect())
            .collect();
        f.debug_struct("Recognizer")
            .field("columns", &columns)
            .field(
                "postdot_items",
                &utils::get_deterministic_display_form_from_hash_map(
                    &self.postdot_items,
                    |(dotted, items)| {
                        let rendered = match items {
                            PostDotItems::LeoEligible(item) => {
                                format!("leo({})", self.item_display(item))
                            }
                            PostDotItems::NormalItems(items) => format!(
                                "normal({})",
                                items
                                    .iter()
                                    .map(|item| self.item_display(item))
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            ),
                        };
                        (
                            (
                                dotted.column,
                                self.grammar
                                    .nonterminal_name(dotted.postdot_nonterminal)
                                    .to_string(),
                            ),
                            rendered,
                        )
                    },
                ),
            )
            .field(
                "to_be_completed_items",
                &utils::get_deterministic_display_form_from_hash_set(
                    &self.to_be_completed_items,
                    |pending| {
                        (
                            pending.start,
                            self.grammar
                                .nonterminal_name(pending.nonterminal)
                                .to_string(),
                        )
                    },
                ),
            )
            .field("finished", &self.finished)
            .finish()
    }
}
