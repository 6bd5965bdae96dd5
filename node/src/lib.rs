//! PoW mining node (SPEC_FULL.md §4.4 / C4): peer discovery, gossip,
//! race-based mining with pre-emptive cancellation, signed-block validation,
//! per-node ledger persistence, block-confirmation emission.

pub mod error;
pub mod mempool;
pub mod message;
pub mod node;
pub mod registry;
pub mod validate;
pub mod wire;

pub use error::{NodeError, Result};
pub use node::Node;
