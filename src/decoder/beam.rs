//! CTC prefix beam search over the lexicon trie.
//!
//! Hypotheses live in a generational arena and refer to their parents by
//! index; the arena is discarded when the decode call returns. Two kinds
//! of hypotheses are distinguished per timestep: blank-ending and
//! label-ending, the standard CTC prefix split.
//!
//! Walking into the trie charges the smeared subtree maximum as an
//! admissible language-model estimate; completing a word replaces the
//! estimate with the true LM score and resets the trie node to the root.

use super::{BeamOptions, CtcDecoder, CtcHypothesis};
use crate::lm::LmState;
use crate::model::Logits;
use crate::trie::TRIE_ROOT;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// One hypothesis in the beam arena.
#[derive(Debug, Clone)]
struct BeamNode {
    score: f32,
    lm_state: LmState,
    trie_node: usize,
    parent: Option<usize>,
    /// Token consumed at this step.
    token: usize,
    /// Word emitted at this step, if a terminal was reached.
    word: Option<usize>,
    ends_in_blank: bool,
}

/// Merge key: hypotheses agreeing on all four components are the same
/// search state and combine.
type MergeKey = (usize, LmState, usize, bool);

fn log_add_exp(a: f32, b: f32) -> f32 {
    let max = a.max(b);
    if max == f32::NEG_INFINITY {
        return f32::NEG_INFINITY;
    }
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Smeared LM estimate already charged for standing at `node`.
fn pending_estimate(decoder: &CtcDecoder, node: usize) -> f32 {
    if node == TRIE_ROOT {
        0.0
    } else {
        decoder.trie().max_score(node)
    }
}

impl CtcDecoder {
    pub(crate) fn run_beam_search(&self, log_probs: &Logits) -> Vec<CtcHypothesis> {
        let opts = self.opts();
        let steps = log_probs.steps();
        let blank = self.blank_idx();

        let mut arena: Vec<BeamNode> = Vec::with_capacity(opts.beam_size * (steps + 1));
        arena.push(BeamNode {
            score: 0.0,
            lm_state: self.lm().begin_state(),
            trie_node: TRIE_ROOT,
            parent: None,
            token: blank,
            word: None,
            ends_in_blank: true,
        });
        let mut frontier: Vec<usize> = vec![0];

        for t in 0..steps {
            let row = log_probs.row(t);
            let candidates = top_candidates(row, opts.beam_size_token);

            let mut expansions: Vec<BeamNode> = Vec::new();
            for &hyp_idx in &frontier {
                let hyp = arena[hyp_idx].clone();
                let pending = pending_estimate(self, hyp.trie_node);

                for &tok in &candidates {
                    let am_score = row[tok];

                    if tok == blank {
                        expansions.push(BeamNode {
                            score: hyp.score + am_score,
                            lm_state: hyp.lm_state.clone(),
                            trie_node: hyp.trie_node,
                            parent: Some(hyp_idx),
                            token: blank,
                            word: None,
                            ends_in_blank: true,
                        });
                        continue;
                    }

                    if tok == hyp.token && !hyp.ends_in_blank {
                        // Repeat collapse: stay on the same trie node.
                        expansions.push(BeamNode {
                            score: hyp.score + am_score,
                            lm_state: hyp.lm_state.clone(),
                            trie_node: hyp.trie_node,
                            parent: Some(hyp_idx),
                            token: tok,
                            word: None,
                            ends_in_blank: false,
                        });
                        continue;
                    }

                    // New label: advance the trie or die.
                    let Some(child) = self.trie().child(hyp.trie_node, tok) else {
                        continue;
                    };
                    let base = hyp.score + am_score;
                    // Credited only when a word is emitted on this token.
                    let sil_bonus = if Some(tok) == self.sil_idx() {
                        opts.sil_score
                    } else {
                        0.0
                    };

                    let child_estimate = self.trie().max_score(child);
                    expansions.push(BeamNode {
                        score: base + opts.lm_weight * (child_estimate - pending),
                        lm_state: hyp.lm_state.clone(),
                        trie_node: child,
                        parent: Some(hyp_idx),
                        token: tok,
                        word: None,
                        ends_in_blank: false,
                    });

                    for label in self.trie().labels(child) {
                        let lm_word = self.lm_word_id(label.word);
                        let (next_state, lm_score) = self.lm().score(&hyp.lm_state, lm_word);
                        let mut score = base
                            + opts.lm_weight * (lm_score - pending)
                            + opts.word_score
                            + sil_bonus;
                        if Some(label.word) == self.unk_word_idx() {
                            score += opts.unk_score;
                        }
                        expansions.push(BeamNode {
                            score,
                            lm_state: next_state,
                            trie_node: TRIE_ROOT,
                            parent: Some(hyp_idx),
                            token: tok,
                            word: Some(label.word),
                            ends_in_blank: false,
                        });
                    }
                }
            }

            let merged = merge_expansions(expansions, opts.log_add);
            frontier = store_pruned(&mut arena, merged, opts);
            if frontier.is_empty() {
                return Vec::new();
            }
        }

        let mut final_order = frontier;
        final_order.sort_by(|&a, &b| {
            arena[b]
                .score
                .partial_cmp(&arena[a].score)
                .unwrap_or(Ordering::Equal)
        });
        final_order.truncate(opts.nbest);

        final_order
            .into_iter()
            .map(|leaf| backtrace(&arena, leaf))
            .collect()
    }
}

/// Token indices of the `limit` best scores in `row`, in descending
/// score order; all tokens when no limit applies.
fn top_candidates(row: &[f32], limit: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..row.len()).collect();
    match limit {
        Some(k) if k < row.len() => {
            order.sort_by(|&a, &b| row[b].partial_cmp(&row[a]).unwrap_or(Ordering::Equal));
            order.truncate(k);
            order
        }
        _ => order,
    }
}

/// Merges expansions sharing a [`MergeKey`], combining scores by `max`
/// or `logaddexp`. Insertion order is preserved for equal scores.
fn merge_expansions(expansions: Vec<BeamNode>, log_add: bool) -> Vec<BeamNode> {
    let mut merged: Vec<BeamNode> = Vec::with_capacity(expansions.len());
    let mut by_key: HashMap<MergeKey, usize> = HashMap::with_capacity(expansions.len());

    for node in expansions {
        let key = (
            node.trie_node,
            node.lm_state.clone(),
            node.token,
            node.ends_in_blank,
        );
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(node);
            }
            Entry::Occupied(slot) => {
                let existing = &mut merged[*slot.get()];
                if log_add {
                    let combined = log_add_exp(existing.score, node.score);
                    if node.score > existing.score {
                        existing.parent = node.parent;
                        existing.word = node.word;
                    }
                    existing.score = combined;
                } else if node.score > existing.score {
                    *existing = node;
                }
            }
        }
    }

    merged
}

/// Applies threshold and top-k pruning, appends survivors to the arena
/// and returns their indices.
fn store_pruned(arena: &mut Vec<BeamNode>, mut merged: Vec<BeamNode>, opts: &BeamOptions) -> Vec<usize> {
    let best = merged
        .iter()
        .map(|n| n.score)
        .fold(f32::NEG_INFINITY, f32::max);
    merged.retain(|n| n.score >= best - opts.beam_threshold);
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    merged.truncate(opts.beam_size);

    let mut indices = Vec::with_capacity(merged.len());
    for node in merged {
        indices.push(arena.len());
        arena.push(node);
    }
    indices
}

/// LIFO back-trace over parent pointers, root excluded.
fn backtrace(arena: &[BeamNode], leaf: usize) -> CtcHypothesis {
    let mut tokens = Vec::new();
    let mut words = Vec::new();

    let mut cursor = Some(leaf);
    while let Some(idx) = cursor {
        let node = &arena[idx];
        if node.parent.is_some() {
            tokens.push(node.token);
            if let Some(word) = node.word {
                words.push(word);
            }
        }
        cursor = node.parent;
    }

    tokens.reverse();
    words.reverse();

    CtcHypothesis {
        tokens,
        words,
        score: arena[leaf].score,
    }
}
