pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{local_node, plan_for, seeded_bytes, test_profile};
#[allow(unused_imports)]
pub use mocks::{CorruptingNode, CountingNode, MisreportingNode, StatuslessNode};
