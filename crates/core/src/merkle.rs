//! Segmentation and binary Merkle tree construction.
//!
//! A blob is split into fixed-size segments. The final segment is zero-padded
//! to the full segment size before hashing, so the root only depends on the
//! bytes and the segment size. Leaves are `keccak256(padded_segment)`, parents
//! are `keccak256(left || right)`, and when a level has an odd number of nodes
//! the last one is promoted to the next level unchanged. A one-segment blob
//! therefore has `root == keccak256(padded_segment)`.

use crate::blob::Blob;
use crate::hash::RootHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check that a segment size is a non-zero multiple of the sector size.
pub fn validate_segment_size(segment_size: u64) -> crate::Result<()> {
    if segment_size == 0 || segment_size % crate::SECTOR_SIZE != 0 {
        return Err(crate::Error::InvalidSegmentSize {
            size: segment_size,
            sector: crate::SECTOR_SIZE,
        });
    }
    Ok(())
}

/// Number of segments needed to hold `len` bytes.
pub fn segment_count(len: u64, segment_size: u64) -> usize {
    len.div_ceil(segment_size) as usize
}

/// Hash a single segment, zero-padding it to `segment_size`.
pub fn hash_segment(data: &[u8], segment_size: usize) -> RootHash {
    if data.len() == segment_size {
        return RootHash::compute(data);
    }
    let mut padded = vec![0u8; segment_size];
    padded[..data.len()].copy_from_slice(data);
    RootHash::compute(&padded)
}

/// Compute the root hash of raw bytes without keeping the tree around.
pub fn root_hash(data: &[u8], segment_size: u64) -> crate::Result<RootHash> {
    Ok(MerkleTree::from_bytes(data, segment_size)?.root())
}

/// Metadata about a segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Position in the blob (0-indexed).
    pub index: usize,
    /// Byte offset of the segment within the blob.
    pub offset: u64,
    /// Unpadded length of the segment.
    pub size: u64,
    /// Leaf hash of the padded segment.
    pub hash: RootHash,
}

/// A binary hash tree over the segments of a blob.
///
/// All levels are retained so proofs and submission nodes can be read from
/// the same structure the root was computed from.
#[derive(Clone)]
pub struct MerkleTree {
    segment_size: u64,
    file_size: u64,
    levels: Vec<Vec<RootHash>>,
}

impl MerkleTree {
    /// Build the tree for a validated blob.
    pub fn build(blob: &Blob, segment_size: u64) -> crate::Result<Self> {
        Self::from_bytes(blob.data(), segment_size)
    }

    /// Build the tree directly from bytes.
    pub fn from_bytes(data: &[u8], segment_size: u64) -> crate::Result<Self> {
        validate_segment_size(segment_size)?;
        if data.is_empty() {
            return Err(crate::Error::EmptyBlob);
        }

        let leaves: Vec<RootHash> = data
            .chunks(segment_size as usize)
            .map(|segment| hash_segment(segment, segment_size as usize))
            .collect();

        let mut levels = vec![leaves];
        while let Some(level) = levels.last()
            && level.len() > 1
        {
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => RootHash::combine(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self {
            segment_size,
            file_size: data.len() as u64,
            levels,
        })
    }

    /// The content identifier.
    pub fn root(&self) -> RootHash {
        // levels is never empty and the top level always holds exactly one node
        self.levels[self.levels.len() - 1][0]
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// Unpadded size of the blob the tree was built from.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of segments (leaves).
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels, including the leaf level.
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    /// Node at `level` (0 = leaves) and position `index`.
    pub fn node(&self, level: usize, index: usize) -> Option<RootHash> {
        self.levels.get(level).and_then(|l| l.get(index)).copied()
    }

    /// Describe a segment by index.
    pub fn segment(&self, index: usize) -> crate::Result<SegmentInfo> {
        let hash = self
            .node(0, index)
            .ok_or(crate::Error::SegmentOutOfRange {
                index,
                count: self.leaf_count(),
            })?;
        let offset = index as u64 * self.segment_size;
        let size = (self.file_size - offset).min(self.segment_size);
        Ok(SegmentInfo {
            index,
            offset,
            size,
            hash,
        })
    }

    /// Slice the bytes of segment `index` out of the blob the tree was built from.
    pub fn segment_data<'a>(&self, data: &'a [u8], index: usize) -> crate::Result<&'a [u8]> {
        let info = self.segment(index)?;
        let start = info.offset as usize;
        let end = start + info.size as usize;
        data.get(start..end).ok_or(crate::Error::SegmentOutOfRange {
            index,
            count: self.leaf_count(),
        })
    }

    /// Inclusion proof for segment `index`.
    pub fn proof(&self, index: usize) -> crate::Result<MerkleProof> {
        if index >= self.leaf_count() {
            return Err(crate::Error::SegmentOutOfRange {
                index,
                count: self.leaf_count(),
            });
        }

        let mut steps = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = position ^ 1;
            // A promoted node has no sibling at this level.
            if let Some(hash) = level.get(sibling) {
                steps.push(ProofStep {
                    sibling: *hash,
                    sibling_is_left: sibling < position,
                });
            }
            position /= 2;
        }

        Ok(MerkleProof {
            leaf_index: index,
            steps,
        })
    }
}

impl fmt::Debug for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("root", &self.root())
            .field("leaves", &self.leaf_count())
            .field("segment_size", &self.segment_size)
            .finish()
    }
}

/// One sibling on the path from a leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: RootHash,
    pub sibling_is_left: bool,
}

/// Inclusion proof for a single segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root from a leaf hash and compare.
    pub fn verify(&self, root: &RootHash, leaf: &RootHash) -> bool {
        let computed = self.steps.iter().fold(*leaf, |acc, step| {
            if step.sibling_is_left {
                RootHash::combine(&step.sibling, &acc)
            } else {
                RootHash::combine(&acc, &step.sibling)
            }
        });
        &computed == root
    }
}
