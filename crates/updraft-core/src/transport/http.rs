//! Blocking HTTP transport over reqwest.

use std::io::Read;

use tracing::debug;

use super::{Headers, ProxyHandle, Transport, TransportError, TransportResponse};

/// Read size for body streaming.
const CHUNK_SIZE: usize = 64 * 1024;

/// Default [`Transport`] over `reqwest::blocking`.
///
/// The client is built per request so that a proxy change made through the
/// shared [`ProxyHandle`] applies to the next connection; the handle is read
/// exactly once per connection setup, never per chunk.
#[derive(Debug, Default)]
pub struct HttpTransport {
    proxy: ProxyHandle,
}

impl HttpTransport {
    /// Transport with no proxy configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport sharing an externally owned proxy slot.
    pub fn with_proxy(proxy: ProxyHandle) -> Self {
        Self { proxy }
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        headers: &Headers,
        on_chunk: &mut dyn FnMut(u64, &[u8]) -> bool,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(proxy_url) = self.proxy.get() {
            debug!("using proxy {proxy_url}");
            let proxy = reqwest::Proxy::all(&proxy_url)
                .map_err(|err| TransportError::Failed(err.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::Failed(err.to_string()))?;

        let mut request = client.get(url);
        let mut has_user_agent = false;
        for (key, value) in headers {
            if key.eq_ignore_ascii_case("user-agent") {
                has_user_agent = true;
            }
            request = request.header(key.as_str(), value.as_str());
        }
        if !has_user_agent {
            request = request.header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        }

        let mut response = request
            .send()
            .map_err(|err| TransportError::Failed(err.to_string()))?;

        let status = response.status().as_u16();
        let total = response.content_length().unwrap_or(0);
        let mut response_headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(text) = value.to_str() {
                response_headers.insert(name.to_string(), text.to_string());
            }
        }

        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|err| TransportError::Failed(err.to_string()))?;
            if read == 0 {
                break;
            }
            if !on_chunk(total, &buf[..read]) {
                return Err(TransportError::Aborted);
            }
        }

        Ok(TransportResponse {
            status,
            headers: response_headers,
        })
    }
}
