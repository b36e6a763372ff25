//! Tree-coded symbols and their bit costs.
//!
//! A tree is a slice of signed indices. Entry pairs `tree[2k], tree[2k + 1]`
//! are the zero and one branches of node `k`; a positive entry is the index of
//! the next pair, a non-positive entry is a leaf holding `-value`. The root
//! pair is at index 0 and is never the target of a branch, so `0` in any
//! entry is always the leaf for value 0.
//!
//! Costs are in 1/256 bit units.

use super::arithmetic::BoolEncoder;
use crate::common::types::{
    BMODE_TREE, DCT_TOKEN_TREE, KEYFRAME_YMODE_TREE, MB_SPLIT_TREE, MV_REF_TREE, SEGMENT_ID_TREE,
    SMALL_MV_TREE, SUB_MV_REF_TREE, UV_MODE_TREE, YMODE_TREE,
};

/// Cost of coding a zero with probability `p/256`, i.e. `-log2(p/256) * 256`.
pub const PROB_COST: [u16; 256] = build_prob_cost();

const fn build_prob_cost() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut p = 1;
    while p < 256 {
        table[p] = neg_log2_q8(p as u32);
        p += 1;
    }
    // p = 0 never occurs in a valid table; price it like p = 1.
    table[0] = table[1];
    table
}

/// `round(-log2(p / 256) * 256)` in integer arithmetic.
const fn neg_log2_q8(p: u32) -> u16 {
    // Integer part of log2(p).
    let mut int = 0u32;
    while (p >> (int + 1)) != 0 {
        int += 1;
    }
    // Mantissa in [1, 2) as Q30; square repeatedly to extract 16 fraction bits.
    let mut y: u64 = ((p as u64) << 30) >> int;
    let mut frac = 0u32;
    let mut bit = 0;
    while bit < 16 {
        y = (y * y) >> 30;
        frac <<= 1;
        if y >= (2 << 30) {
            y >>= 1;
            frac |= 1;
        }
        bit += 1;
    }
    let total = ((8 - int) << 16) - frac;
    ((total + 128) >> 8) as u16
}

/// Cost of coding a zero with probability `p`.
#[inline]
pub fn cost_zero(p: u8) -> u32 {
    u32::from(PROB_COST[usize::from(p)])
}

/// Cost of coding a one with probability `p`.
#[inline]
pub fn cost_one(p: u8) -> u32 {
    u32::from(PROB_COST[usize::from(255 - p)])
}

/// Cost of coding `bit` with probability `p`.
#[inline]
pub fn cost_bit(bit: bool, p: u8) -> u32 {
    if bit {
        cost_one(p)
    } else {
        cost_zero(p)
    }
}

/// Cost of `zeros` zero branches and `ones` one branches at probability `p`.
#[inline]
pub fn cost_branch(zeros: u32, ones: u32, p: u8) -> u64 {
    u64::from(zeros) * u64::from(cost_zero(p)) + u64::from(ones) * u64::from(cost_one(p))
}

/// Longest root-to-leaf path of any VP8 tree.
const MAX_DEPTH: usize = 12;
/// Leaf values are below this bound in every VP8 tree.
const MAX_LEAVES: usize = 16;

/// `(prob_index, bit)` decisions from the root to one leaf.
#[derive(Clone, Copy)]
struct LeafPath {
    len: u8,
    branches: [(u8, bool); MAX_DEPTH],
}

impl LeafPath {
    const NONE: LeafPath = LeafPath {
        len: 0,
        branches: [(0, false); MAX_DEPTH],
    };
}

/// A coding tree with the branch path of every leaf resolved at compile time.
pub(crate) struct Tree {
    pub(crate) nodes: &'static [i8],
    paths: [LeafPath; MAX_LEAVES],
}

impl Tree {
    pub(crate) const fn new(nodes: &'static [i8]) -> Self {
        let mut paths = [LeafPath::NONE; MAX_LEAVES];
        let mut i = 0;
        while i < nodes.len() {
            if nodes[i] <= 0 {
                let value = (-nodes[i]) as usize;
                if value >= MAX_LEAVES {
                    panic!("leaf value out of range");
                }
                paths[value] = Self::walk_up(nodes, i);
            }
            i += 1;
        }
        Self { nodes, paths }
    }

    /// Follows parents from entry `leaf` to the root, then reverses.
    const fn walk_up(nodes: &[i8], leaf: usize) -> LeafPath {
        let mut rev = [(0u8, false); MAX_DEPTH];
        let mut len = 0;
        let mut current = leaf;
        loop {
            if len == MAX_DEPTH {
                panic!("tree deeper than MAX_DEPTH");
            }
            let node = current & !1;
            rev[len] = ((node >> 1) as u8, current & 1 == 1);
            len += 1;
            if node == 0 {
                break;
            }
            let mut parent = 0;
            while parent < nodes.len() && !(nodes[parent] > 0 && nodes[parent] as usize == node) {
                parent += 1;
            }
            if parent == nodes.len() {
                panic!("tree node without a parent");
            }
            current = parent;
        }
        let mut path = LeafPath::NONE;
        let mut k = 0;
        while k < len {
            path.branches[k] = rev[len - 1 - k];
            k += 1;
        }
        path.len = len as u8;
        path
    }

    /// Branches coding `value` from node pair `start`, root first.
    fn path(&self, value: i8, start: usize) -> &[(u8, bool)] {
        let leaf = usize::try_from(value)
            .ok()
            .and_then(|v| self.paths.get(v))
            .filter(|p| p.len > 0)
            .unwrap_or_else(|| panic!("value {value} is not a leaf of {:?}", self.nodes));
        let path = &leaf.branches[..usize::from(leaf.len)];
        let from = path
            .iter()
            .position(|&(prob, _)| usize::from(prob) == start >> 1)
            .unwrap_or_else(|| panic!("value {value} is not below node {start}"));
        &path[from..]
    }
}

pub(crate) const SEGMENT_ID: Tree = Tree::new(&SEGMENT_ID_TREE);
pub(crate) const KEYFRAME_YMODE: Tree = Tree::new(&KEYFRAME_YMODE_TREE);
pub(crate) const YMODE: Tree = Tree::new(&YMODE_TREE);
pub(crate) const UV_MODE: Tree = Tree::new(&UV_MODE_TREE);
pub(crate) const BMODE: Tree = Tree::new(&BMODE_TREE);
pub(crate) const MV_REF: Tree = Tree::new(&MV_REF_TREE);
pub(crate) const MB_SPLIT: Tree = Tree::new(&MB_SPLIT_TREE);
pub(crate) const SUB_MV_REF: Tree = Tree::new(&SUB_MV_REF_TREE);
pub(crate) const SMALL_MV: Tree = Tree::new(&SMALL_MV_TREE);
pub(crate) const DCT_TOKENS: Tree = Tree::new(&DCT_TOKEN_TREE);

/// Encodes `value` as a path through `tree`.
pub(crate) fn write_token(encoder: &mut BoolEncoder, tree: &Tree, probs: &[u8], value: i8) {
    write_token_from(encoder, tree, probs, value, 0);
}

/// Encodes `value` starting at node pair `start` instead of the root.
pub(crate) fn write_token_from(
    encoder: &mut BoolEncoder,
    tree: &Tree,
    probs: &[u8],
    value: i8,
    start: usize,
) {
    debug_assert_eq!(tree.nodes.len(), probs.len() * 2);
    for &(prob, bit) in tree.path(value, start) {
        encoder.encode_bool(bit, probs[usize::from(prob)]);
    }
}

/// Calls `f(prob_index, bit)` for each branch coding `value` from node pair `start`.
pub(crate) fn for_each_branch(tree: &Tree, value: i8, start: usize, mut f: impl FnMut(usize, bool)) {
    for &(prob, bit) in tree.path(value, start) {
        f(usize::from(prob), bit);
    }
}

/// Exact cost of coding `value` with `tree` and `probs`.
pub fn cost(tree: &Tree, probs: &[u8], value: i8) -> u32 {
    cost_from(tree, probs, value, 0)
}

/// Cost of `value` starting at node pair `start`.
pub fn cost_from(tree: &Tree, probs: &[u8], value: i8, start: usize) -> u32 {
    tree.path(value, start)
        .iter()
        .map(|&(prob, bit)| cost_bit(bit, probs[usize::from(prob)]))
        .sum()
}

/// Fills `costs[value]` for every leaf reachable from node pair `start`.
///
/// Walks the tree once with an explicit stack, accumulating the branch costs
/// along each path. Entries of `costs` for values not in the subtree are left
/// untouched.
pub fn cost_tokens_from(tree: &Tree, probs: &[u8], start: usize, costs: &mut [u32]) {
    let tree = tree.nodes;
    let mut stack = [(0usize, 0u32); 32];
    let mut depth = 1;
    stack[0] = (start, 0);
    while depth > 0 {
        depth -= 1;
        let (node, base) = stack[depth];
        let p = probs[node >> 1];
        for (branch, bit_cost) in [(0usize, cost_zero(p)), (1, cost_one(p))] {
            let next = tree[node + branch];
            let total = base + bit_cost;
            if next <= 0 {
                costs[(-next) as usize] = total;
            } else {
                assert!(
                    (next as usize) < tree.len() && next as usize % 2 == 0,
                    "malformed tree entry {next}"
                );
                stack[depth] = (next as usize, total);
                depth += 1;
            }
        }
    }
}

/// Fills `costs[value]` for every leaf of `tree`.
pub fn cost_tokens(tree: &Tree, probs: &[u8], costs: &mut [u32]) {
    cost_tokens_from(tree, probs, 0, costs);
}
