//! Error kinds surfaced by the update session.
//!
//! Feed-level problems (a malformed item, an unparseable enclosure) are
//! recovered locally by the parser and selector and never appear here; only
//! caller mistakes, state-machine misuse and terminal operation failures
//! reach the host.

use thiserror::Error;

/// Discriminated results of the session operations.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// A caller-supplied parameter is missing or malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// `configure` was called on an already-configured session.
    #[error("session is already configured")]
    AlreadyInitialized,

    /// The operation requires a prior step that has not happened yet.
    #[error("operation invoked before its required predecessor")]
    NotReady,

    /// Transport error, non-200 status, or a transfer cancelled mid-flight.
    #[error("network failure (status {status:?})")]
    NetworkFail {
        /// HTTP status code when the server answered at all.
        status: Option<u16>,
    },

    /// The feed could not be parsed into any release item.
    #[error("feed is not a structurally valid appcast")]
    InvalidFeed,

    /// The feed parsed but no item is applicable to this installation.
    #[error("no applicable update found")]
    NoUpdateFound,

    /// The candidate's signature algorithm does not equal the configured one.
    #[error("candidate's signature algorithm is not the configured one")]
    UnsupportedSignatureAlgorithm,

    /// Disk write failed or a destination buffer was too small.
    #[error("file or buffer I/O failure")]
    FileIOFail,

    /// Signature verification of the downloaded payload failed.
    #[error("payload signature verification failed")]
    BadSignature,

    /// Generic failure (e.g. the installer process refused to start).
    #[error("operation failed")]
    Fail,
}
