use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use vellum_core::{Blob, NetworkProfile, SECTOR_SIZE, SubmissionPlan, build_submission};
use vellum_storage::FilesystemNode;

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output (reproducible tests).
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Profile with sector-sized segments so small blobs span several segments.
pub fn test_profile() -> NetworkProfile {
    let mut profile = NetworkProfile::local("local", "http://127.0.0.1:8545", "file:///unused");
    profile.segment_size = SECTOR_SIZE;
    profile
}

pub async fn local_node() -> (TempDir, Arc<FilesystemNode>) {
    let temp = tempfile::tempdir().unwrap();
    let node = FilesystemNode::new(temp.path(), SECTOR_SIZE).await.unwrap();
    (temp, Arc::new(node))
}

pub fn plan_for(data: &Bytes) -> (Blob, SubmissionPlan) {
    let blob = Blob::from_bytes(data.clone()).unwrap();
    let plan = build_submission(&blob, SECTOR_SIZE).unwrap();
    (blob, plan)
}
