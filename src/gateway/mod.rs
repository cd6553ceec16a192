//! Authenticated HTTP gateway in front of the container runtime.
//!
//! ```text
//!   request ──► TraceLayer ──► body limit ──► auth gate ──► handler
//!                                               │              │
//!                                          401 + Bearer    GatewayState
//!                                                          ├─ BuildExecutor ─► JobRegistry
//!                                                          ├─ RuntimeAdapter
//!                                                          └─ ComposeRunner
//! ```

pub mod error;
pub mod handlers;
pub mod server;
pub mod types;

pub use error::GatewayError;
pub use server::{GatewayApi, GatewayState};
