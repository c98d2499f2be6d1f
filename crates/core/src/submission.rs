//! On-ledger submission descriptors.
//!
//! A submission describes a blob to the flow contract: its unpadded length,
//! an opaque tag, and the roots of the maximal power-of-two subtrees that
//! cover the leaves. The nodes are the binary decomposition of the leaf
//! count, highest bit first, and are read straight out of the tree the root
//! was computed from.

use crate::blob::Blob;
use crate::hash::RootHash;
use crate::merkle::MerkleTree;
use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

/// Root of a subtree covering `2^height` consecutive leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionNode {
    pub root: RootHash,
    pub height: u32,
}

/// Validated description of a blob for the flow contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDescriptor {
    length: u64,
    tag: Bytes,
    nodes: Vec<SubmissionNode>,
}

impl SubmissionDescriptor {
    /// Derive a submission from an already built tree.
    pub fn from_tree(tree: &MerkleTree, tag: Bytes) -> crate::Result<Self> {
        let leaves = tree.leaf_count();
        let mut nodes = Vec::new();
        let mut offset = 0usize;

        for height in (0..usize::BITS).rev() {
            let span = 1usize << height;
            if leaves & span == 0 {
                continue;
            }
            let root = tree
                .node(height as usize, offset >> height)
                .ok_or_else(|| {
                    crate::Error::InvalidSubmission(format!(
                        "tree has no node at level {height} offset {offset}"
                    ))
                })?;
            nodes.push(SubmissionNode { root, height });
            offset += span;
        }

        Self::new(tree.file_size(), tag, nodes, leaves)
    }

    /// Assemble a descriptor and check it covers exactly `leaf_count` leaves.
    pub fn new(
        length: u64,
        tag: Bytes,
        nodes: Vec<SubmissionNode>,
        leaf_count: usize,
    ) -> crate::Result<Self> {
        if length == 0 {
            return Err(crate::Error::InvalidSubmission("length is zero".into()));
        }
        if nodes.is_empty() {
            return Err(crate::Error::InvalidSubmission("no nodes".into()));
        }
        let covered = nodes
            .iter()
            .try_fold(0usize, |acc, n| {
                1usize
                    .checked_shl(n.height)
                    .and_then(|span| acc.checked_add(span))
            })
            .ok_or_else(|| crate::Error::InvalidSubmission("node heights overflow".into()))?;
        if covered != leaf_count {
            return Err(crate::Error::InvalidSubmission(format!(
                "nodes cover {covered} leaves, tree has {leaf_count}"
            )));
        }

        Ok(Self { length, tag, nodes })
    }

    /// Unpadded blob length in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn tag(&self) -> &Bytes {
        &self.tag
    }

    pub fn nodes(&self) -> &[SubmissionNode] {
        &self.nodes
    }

    /// Number of leaves the nodes cover.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().map(|n| 1usize << n.height).sum()
    }

    /// Number of 256-byte sectors billed for this submission.
    pub fn sectors(&self) -> u64 {
        self.length.div_ceil(crate::SECTOR_SIZE)
    }
}

/// A tree and the submission derived from it, built in one pass.
#[derive(Clone, Debug)]
pub struct SubmissionPlan {
    pub tree: MerkleTree,
    pub submission: SubmissionDescriptor,
}

impl SubmissionPlan {
    pub fn root(&self) -> RootHash {
        self.tree.root()
    }
}

/// Build the tree once and derive the submission from it.
pub fn build_submission(blob: &Blob, segment_size: u64) -> crate::Result<SubmissionPlan> {
    let tree = MerkleTree::build(blob, segment_size)?;
    let submission = SubmissionDescriptor::from_tree(&tree, Bytes::new())?;
    Ok(SubmissionPlan { tree, submission })
}
