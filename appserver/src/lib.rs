//! App-server tx pipeline (SPEC_FULL.md §4.6 / C6): the TLS-facing BUY /
//! GET_TX_STATUS protocol, the submission queue/worker that hands purchases
//! to the gateway, the timeout monitor, and the confirmation consumer that
//! applies wallet/asset state once a block confirms.

pub mod appserver;
pub mod confirm_listener;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod status;
pub mod tls;
pub mod wire;

pub use appserver::AppServer;
pub use error::{PipelineError, Result};
