//! Gateway / transaction broadcaster (SPEC_FULL.md §4.5 / C5): fan-out of
//! pending transactions to all nodes, fan-in of block confirmations to the
//! application server.

pub mod confirm_store;
pub mod error;
pub mod gateway;
pub mod message;
pub mod wire;

pub use error::{GatewayError, Result};
pub use gateway::Gateway;
