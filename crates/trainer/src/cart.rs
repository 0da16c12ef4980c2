//! CART regression tree builder
//!
//! Exact-greedy splits over pre-sorted feature columns, integer arithmetic
//! only. Each node sweeps every feature once in sorted order, accumulating
//! gradient/hessian sums, and evaluates a split between every pair of
//! distinct adjacent values.

use retrain_model_core::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Shape limits for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }
}

/// Row indices ordered by each feature, ties by row index.
///
/// Sorting depends only on the feature matrix, so it is computed once per
/// training run and shared by every tree.
#[derive(Clone, Debug)]
pub struct SortedColumns {
    order: Vec<Vec<u32>>,
}

impl SortedColumns {
    pub fn new(features: &[Vec<i64>]) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);
        let order = (0..feature_count)
            .map(|f| {
                let mut column: Vec<u32> = (0..features.len() as u32).collect();
                column.sort_by_key(|&i| (features[i as usize][f], i));
                column
            })
            .collect();
        Self { order }
    }

    pub fn feature_count(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Builds one tree fitting `-gradient / hessian` per leaf.
pub struct CartBuilder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<i64>],
    sorted: &'a SortedColumns,
    gradients: &'a [i64],
    hessians: &'a [i64],
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        config: &'a TreeConfig,
        features: &'a [Vec<i64>],
        sorted: &'a SortedColumns,
        gradients: &'a [i64],
        hessians: &'a [i64],
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());
        Self {
            config,
            features,
            sorted,
            gradients,
            hessians,
        }
    }

    /// Fit a tree over every row; `weight` is stored as the tree's shrinkage.
    pub fn build(&self, weight: i64) -> Tree {
        let mut nodes = Vec::new();
        let members: Vec<usize> = (0..self.features.len()).collect();
        self.build_node(&members, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    fn build_node(&self, members: &[usize], depth: usize, nodes: &mut Vec<Node>) -> u32 {
        let current = nodes.len();
        nodes.push(Node::leaf(self.leaf_value(members)));

        if depth >= self.config.max_depth || members.len() < 2 * self.config.min_samples_leaf.max(1) {
            return current as u32;
        }
        let Some(split) = self.find_best_split(members) else {
            return current as u32;
        };

        let SplitTieBreaker {
            feature_idx,
            threshold,
        } = split.tie_breaker;
        let (left, right): (Vec<usize>, Vec<usize>) = members
            .iter()
            .partition(|&&i| self.features[i][feature_idx] <= threshold);

        let left_idx = self.build_node(&left, depth + 1, nodes);
        let right_idx = self.build_node(&right, depth + 1, nodes);
        nodes[current] = Node::split(feature_idx as u32, threshold, left_idx, right_idx);

        current as u32
    }

    fn find_best_split(&self, members: &[usize]) -> Option<SplitCandidate> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut in_node = vec![false; self.features.len()];
        for &i in members {
            in_node[i] = true;
        }

        let (g_total, h_total) = self.sum_gradients_hessians(members);
        let parent_score = leaf_score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in 0..self.sorted.feature_count() {
            let mut rows = self.sorted.order[feature_idx]
                .iter()
                .map(|&i| i as usize)
                .filter(|&i| in_node[i])
                .peekable();

            let (mut g_left, mut h_left, mut count_left) = (0i128, 0i128, 0usize);

            while let Some(i) = rows.next() {
                g_left += self.gradients[i] as i128;
                h_left += self.hessians[i] as i128;
                count_left += 1;

                let value = self.features[i][feature_idx];
                let Some(&next) = rows.peek() else {
                    break;
                };
                if self.features[next][feature_idx] == value {
                    continue;
                }

                let count_right = members.len() - count_left;
                if count_left < min_leaf || count_right < min_leaf {
                    continue;
                }

                let gain = leaf_score(g_left, h_left)
                    + leaf_score(g_total - g_left, h_total - h_left)
                    - parent_score;
                let candidate = SplitCandidate {
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, value),
                };

                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best.filter(|b| b.gain > 0)
    }

    fn sum_gradients_hessians(&self, members: &[usize]) -> (i128, i128) {
        members.iter().fold((0, 0), |(g, h), &i| {
            (g + self.gradients[i] as i128, h + self.hessians[i] as i128)
        })
    }

    /// Optimal leaf output: -G / H
    fn leaf_value(&self, members: &[usize]) -> i64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(members);
        if sum_h == 0 {
            return 0;
        }
        (-(sum_g / sum_h)).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// G² / H, the loss reduction a leaf with these sums achieves
fn leaf_score(g: i128, h: i128) -> i128 {
    if h > 0 {
        g * g / h
    } else {
        0
    }
}
