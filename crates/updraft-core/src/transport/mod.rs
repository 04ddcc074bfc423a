//! Transport boundary.
//!
//! The session never talks to a network stack directly; it drives this
//! trait. The body is delivered push-style through a cancellable per-chunk
//! callback, which is the session's only suspend point. A default
//! implementation over reqwest lives in [`http`] behind the `network`
//! feature.

use std::collections::BTreeMap;

use thiserror::Error;

#[cfg(feature = "network")]
pub mod http;

#[cfg(feature = "network")]
pub use http::HttpTransport;

/// Shared, mutex-guarded proxy configuration.
///
/// The host may change the proxy from another thread while a download is in
/// flight; implementations read it once per connection setup, and the last
/// write wins. `None` means direct connection.
#[derive(Debug, Clone, Default)]
pub struct ProxyHandle(std::sync::Arc<std::sync::Mutex<Option<String>>>);

impl ProxyHandle {
    /// New handle with no proxy configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the proxy URL; an empty string clears it.
    pub fn set(&self, url: &str) {
        let mut slot = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        };
    }

    /// Snapshot the current proxy URL.
    pub fn get(&self) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Request/response header map. Ordered so header injection is
/// deterministic in tests.
pub type Headers = BTreeMap<String, String>;

/// Outcome of a completed (non-aborted) HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
}

/// Transport-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The chunk callback returned `false`; the transfer stopped mid-body.
    #[error("transfer aborted by the content callback")]
    Aborted,

    /// Connection, TLS, URL or protocol failure.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Synchronous GET with a streamed, cancellable body.
///
/// `on_chunk` is invoked once per delivery with the expected total byte
/// count (0 when unknown) and the chunk; returning `false` aborts the
/// transfer, surfacing [`TransportError::Aborted`].
pub trait Transport: Send + Sync {
    /// Perform the request, pushing body bytes into `on_chunk`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Aborted`] when the callback cancelled the body,
    /// [`TransportError::Failed`] for any connection-level failure. A non-2xx
    /// status is NOT an error here; callers inspect
    /// [`TransportResponse::status`].
    fn get(
        &self,
        url: &str,
        headers: &Headers,
        on_chunk: &mut dyn FnMut(u64, &[u8]) -> bool,
    ) -> Result<TransportResponse, TransportError>;
}

/// Drive [`Transport::get`] to completion into an owned buffer.
///
/// # Errors
///
/// Propagates the transport's own errors; never aborts on its own.
pub fn get_to_vec(
    transport: &dyn Transport,
    url: &str,
    headers: &Headers,
) -> Result<(TransportResponse, Vec<u8>), TransportError> {
    let mut body = Vec::new();
    let response = transport.get(url, headers, &mut |_total, chunk| {
        body.extend_from_slice(chunk);
        true
    })?;
    Ok((response, body))
}
