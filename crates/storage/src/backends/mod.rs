//! Storage node backends.

pub mod filesystem;
pub mod rpc;
