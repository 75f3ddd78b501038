//! Lexicon prefix trie keyed by token-index paths.
//!
//! Arena-backed: nodes live in one `Vec` and refer to each other by
//! index, so there are no owning back-pointers. Terminal nodes carry the
//! word index and its unigram log-prior; after insertion the trie is
//! smeared (MAX) so every node knows the best prior reachable in its
//! subtree, which gives the beam search an admissible pruning heuristic.

use std::collections::HashMap;

/// Index of the root node in every trie arena.
pub const TRIE_ROOT: usize = 0;

/// A word ending at a trie node, with its unigram log-prior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrieLabel {
    pub word: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<usize, usize>,
    labels: Vec<TrieLabel>,
    max_score: f32,
}

/// Arena-backed lexicon trie.
#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    /// Creates a trie holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Inserts one spelling for `word` with its unigram log-prior.
    pub fn insert(&mut self, tokens: &[usize], word: usize, score: f32) {
        let mut node = TRIE_ROOT;
        for &token in tokens {
            let existing = self.nodes[node].children.get(&token).copied();
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children.insert(token, child);
                    child
                }
            };
        }
        self.nodes[node].labels.push(TrieLabel { word, score });
    }

    /// Child of `node` along `token`, if any.
    pub fn child(&self, node: usize, token: usize) -> Option<usize> {
        self.nodes[node].children.get(&token).copied()
    }

    /// Words terminating at `node`.
    pub fn labels(&self, node: usize) -> &[TrieLabel] {
        &self.nodes[node].labels
    }

    /// Best unigram log-prior reachable in the subtree under `node`.
    /// Meaningful only after [`Trie::smear`].
    pub fn max_score(&self, node: usize) -> f32 {
        self.nodes[node].max_score
    }

    /// Total node count, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Propagates the maximum label score of every subtree up to its
    /// root (MAX smearing).
    pub fn smear(&mut self) {
        self.smear_node(TRIE_ROOT);
    }

    fn smear_node(&mut self, node: usize) -> f32 {
        let children: Vec<usize> = self.nodes[node].children.values().copied().collect();

        let mut best = self.nodes[node]
            .labels
            .iter()
            .map(|l| l.score)
            .fold(f32::NEG_INFINITY, f32::max);

        for child in children {
            best = best.max(self.smear_node(child));
        }

        self.nodes[node].max_score = best;
        best
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}
