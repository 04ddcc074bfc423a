//! updraft-core: the trust-and-selection core of a software auto-update
//! client.
//!
//! Given a remote appcast feed this crate parses it into a structured model
//! ([`feed`]), deterministically selects the single best applicable release
//! ([`select`]), and proves that a downloaded payload originates from the
//! holder of a known private key before it is allowed to execute
//! ([`signing`]). The [`session`] module sequences the whole flow behind a
//! small state machine; everything the host environment provides (HTTP,
//! OS compatibility, process launch, locale) enters through the traits in
//! [`transport`], [`platform`] and [`hooks`].

pub mod error;
pub mod feed;
pub mod hooks;
pub mod platform;
pub mod select;
pub mod session;
pub mod signing;
pub mod transport;

pub use error::UpdateError;
pub use hooks::{NullHooks, UpdateHooks};
pub use platform::{HostPlatform, Platform};
pub use session::{SessionConfig, UpdateSession};
pub use transport::{ProxyHandle, Transport, TransportError, TransportResponse};
pub use updraft_schema as schema;

/// User Agent string for HTTP operations
pub const USER_AGENT: &str = concat!("updraft/", env!("CARGO_PKG_VERSION"));
