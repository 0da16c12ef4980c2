//! Decision tree nodes and integer-only traversal

use serde::{Deserialize, Serialize};

/// A node of a regression tree.
///
/// Split nodes send a row left when `features[feature] <= threshold`.
/// Children are stored after their parent, so `left` and `right` are always
/// greater than the index of the node that points to them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: u32,
        threshold: i64,
        left: u32,
        right: u32,
    },
    Leaf {
        value: i64,
    },
}

impl Node {
    pub fn split(feature: u32, threshold: i64, left: u32, right: u32) -> Self {
        Node::Split {
            feature,
            threshold,
            left,
            right,
        }
    }

    pub fn leaf(value: i64) -> Self {
        Node::Leaf { value }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// A single tree of the ensemble; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    pub nodes: Vec<Node>,
    /// Shrinkage applied to every leaf of this tree (fixed-point)
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Walk the tree and return the leaf value reached by `features`.
    ///
    /// Malformed trees (dangling children, missing features) evaluate to 0;
    /// [`Tree::validate`] rejects them before they are ever scored.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;

        // Children always point forward, so a valid walk visits each node at most once.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(value) = features.get(*feature as usize) else {
                        return 0;
                    };
                    idx = if *value <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                None => return 0,
            }
        }

        0
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                for child in [*left as usize, *right as usize] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {i} has invalid child index {child}"));
                    }
                }
                if *feature as usize >= feature_count {
                    return Err(format!(
                        "node {i} splits on feature {feature} but the model has {feature_count}"
                    ));
                }
            }
        }

        Ok(())
    }
}
