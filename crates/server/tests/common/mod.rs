//! Common test utilities and fixtures.

pub mod fixtures;
pub mod ledger;
pub mod server;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use ledger::*;
#[allow(unused_imports)]
pub use server::*;
