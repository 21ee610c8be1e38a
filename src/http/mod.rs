//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer)
//!     → middleware.rs (RequestMeta from request + ConnectInfo, start timer)
//!     → handlers.rs (the wrapped application)
//!     → middleware.rs (status line + headers from response, publish)
//!     → Send to client, unchanged
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use middleware::{tap, tap_middleware, TapState};
pub use server::TapServer;
