//! The update session orchestrator.
//!
//! A small state machine sequencing parse → select → download → verify →
//! install. The four operations are synchronous and meant to be called
//! sequentially from one logical caller; the session does not lock its own
//! state. The only shared mutable state is the proxy slot, which transports
//! read once per connection setup.
//!
//! Nothing is ever promoted to "trusted" early: a downloaded file that
//! fails signature verification is not recorded as the installable
//! artifact, even though its bytes exist on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use updraft_schema::{SelectedUpdate, SignatureAlgorithm};

use crate::error::UpdateError;
use crate::hooks::UpdateHooks;
use crate::platform::Platform;
use crate::transport::{self, Headers, ProxyHandle, Transport, TransportError};
use crate::{feed, select, signing};

/// Static configuration supplied to [`UpdateSession::configure`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// URL of the appcast feed.
    pub feed_url: String,

    /// Version of the running application; the selection baseline.
    pub current_version: String,

    /// Two-letter preferred language; empty falls back to the platform's
    /// user locale at check time.
    pub preferred_language: String,

    /// Non-default channels the user opted into (e.g. `["beta"]`).
    pub accepted_channels: Vec<String>,

    /// Required signature scheme of every acceptable enclosure.
    pub signature_algorithm: SignatureAlgorithm,

    /// Public key matching `signature_algorithm`; unused for `None`.
    pub public_key: String,
}

/// Lifecycle of a session, derived from its caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet configured.
    Uninitialized,
    /// Configured; no candidate selected.
    Ready,
    /// A candidate is cached and may be downloaded.
    UpdateAvailable,
    /// A verified artifact is on disk and may be installed.
    Downloaded,
    /// The installer was launched.
    Installed,
}

/// The update session.
///
/// Owns the configuration, the collaborator objects, the cached
/// [`SelectedUpdate`] and the verified artifact path. The cached selection
/// and the artifact are invalidated together by [`clean`](Self::clean).
pub struct UpdateSession {
    config: Option<SessionConfig>,
    hooks: Box<dyn UpdateHooks>,
    platform: Box<dyn Platform>,
    transport: Box<dyn Transport>,
    headers: Headers,
    proxy: ProxyHandle,
    selected: Option<SelectedUpdate>,
    downloaded: Option<PathBuf>,
    installed: bool,
    /// Set by `clean`, consumed by `configure`: reconfiguration is only
    /// legal after an explicit clean.
    reconfigurable: bool,
}

impl std::fmt::Debug for UpdateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSession")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("selected", &self.selected)
            .field("downloaded", &self.downloaded)
            .finish_non_exhaustive()
    }
}

impl UpdateSession {
    /// Session over caller-supplied collaborators.
    ///
    /// The proxy slot starts empty; wire it into a custom transport via
    /// [`proxy_handle`](Self::proxy_handle) if that transport honors one.
    pub fn new(
        hooks: Box<dyn UpdateHooks>,
        platform: Box<dyn Platform>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            config: None,
            hooks,
            platform,
            transport,
            headers: Headers::new(),
            proxy: ProxyHandle::new(),
            selected: None,
            downloaded: None,
            installed: false,
            reconfigurable: false,
        }
    }

    /// Session over the built-in HTTP transport and host platform, with the
    /// proxy slot already wired through.
    #[cfg(feature = "network")]
    pub fn with_defaults(hooks: Box<dyn UpdateHooks>) -> Self {
        let proxy = ProxyHandle::new();
        let transport = Box::new(crate::transport::HttpTransport::with_proxy(proxy.clone()));
        let mut session = Self::new(hooks, Box::new(crate::platform::HostPlatform), transport);
        session.proxy = proxy;
        session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.config.is_none() {
            SessionState::Uninitialized
        } else if self.installed {
            SessionState::Installed
        } else if self.downloaded.is_some() {
            SessionState::Downloaded
        } else if self.selected.is_some() {
            SessionState::UpdateAvailable
        } else {
            SessionState::Ready
        }
    }

    /// Transition `Uninitialized → Ready`.
    ///
    /// # Errors
    ///
    /// [`UpdateError::InvalidParameter`] when the version or feed URL is
    /// empty, an accepted channel is an empty string, or a signature
    /// algorithm is set but the key fails the well-formedness check.
    /// [`UpdateError::AlreadyInitialized`] on a second call without an
    /// intervening [`clean`](Self::clean).
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), UpdateError> {
        if self.config.is_some() && !self.reconfigurable {
            return Err(UpdateError::AlreadyInitialized);
        }
        if config.current_version.is_empty() {
            return Err(UpdateError::InvalidParameter("current_version"));
        }
        if config.feed_url.is_empty() {
            return Err(UpdateError::InvalidParameter("feed_url"));
        }
        if config.accepted_channels.iter().any(String::is_empty) {
            return Err(UpdateError::InvalidParameter("accepted_channels"));
        }
        if config.signature_algorithm != SignatureAlgorithm::None
            && !signing::is_valid_public_key(config.signature_algorithm, &config.public_key)
        {
            return Err(UpdateError::InvalidParameter("public_key"));
        }

        self.config = Some(config);
        self.reconfigurable = false;
        Ok(())
    }

    /// Fetch, parse and select; cache and announce the winner.
    ///
    /// # Errors
    ///
    /// [`UpdateError::NotReady`] before [`configure`](Self::configure),
    /// [`UpdateError::NetworkFail`] for transport failures / non-200 /
    /// empty body, [`UpdateError::InvalidFeed`] when parsing yields zero
    /// items, [`UpdateError::NoUpdateFound`] when no item is applicable,
    /// and [`UpdateError::UnsupportedSignatureAlgorithm`] when the winning
    /// enclosure's algorithm differs from the configured one.
    pub fn check_for_update(&mut self) -> Result<SelectedUpdate, UpdateError> {
        let config = self.config.as_ref().ok_or(UpdateError::NotReady)?;

        let (response, body) =
            transport::get_to_vec(self.transport.as_ref(), &config.feed_url, &self.headers)
                .map_err(|err| {
                    debug!("feed fetch failed: {err}");
                    UpdateError::NetworkFail { status: None }
                })?;
        if response.status != 200 || body.is_empty() {
            return Err(UpdateError::NetworkFail {
                status: Some(response.status),
            });
        }

        let text = String::from_utf8_lossy(&body);
        let appcast = feed::parse_appcast(&text);
        if appcast.items.is_empty() {
            return Err(UpdateError::InvalidFeed);
        }

        let lang = if config.preferred_language.is_empty() {
            self.platform.user_language_tag()
        } else {
            config.preferred_language.clone()
        };

        let selected = select::select_update(
            &appcast,
            &config.current_version,
            &lang,
            &config.accepted_channels,
            self.platform.as_ref(),
        )
        .ok_or(UpdateError::NoUpdateFound)?;

        // exact algorithm match, not "compatible or stronger"
        if selected.enclosure.signature_algorithm != config.signature_algorithm {
            return Err(UpdateError::UnsupportedSignatureAlgorithm);
        }

        self.hooks.new_version_found(&selected);
        self.selected = Some(selected.clone());
        Ok(selected)
    }

    /// Download the selected enclosure to `destination` and verify it.
    ///
    /// If a verified artifact from a previous call still exists and either
    /// no signature is configured or it re-verifies against the cached
    /// enclosure, the transport is not touched at all.
    ///
    /// # Errors
    ///
    /// [`UpdateError::NotReady`] without a cached selection,
    /// [`UpdateError::FileIOFail`] when the destination cannot be written,
    /// [`UpdateError::NetworkFail`] for transport failures or a
    /// progress-callback cancellation, and [`UpdateError::BadSignature`]
    /// when the downloaded bytes do not verify — in which case nothing is
    /// recorded as downloaded.
    pub fn download_to_file(&mut self, destination: &Path) -> Result<(), UpdateError> {
        let config = self.config.as_ref().ok_or(UpdateError::NotReady)?;
        let selected = self.selected.as_ref().ok_or(UpdateError::NotReady)?;
        let enclosure = &selected.enclosure;

        // trust-but-reverify cache
        if let Some(existing) = &self.downloaded {
            if config.signature_algorithm == SignatureAlgorithm::None
                || signing::verify_file(
                    config.signature_algorithm,
                    existing,
                    &enclosure.signature,
                    &config.public_key,
                )
            {
                debug!("reusing verified artifact at {}", existing.display());
                return Ok(());
            }
            warn!("cached artifact no longer verifies, downloading again");
            self.downloaded = None;
        }

        if enclosure.url.is_empty() {
            return Err(UpdateError::Fail);
        }

        let mut file = File::create(destination).map_err(|_| UpdateError::FileIOFail)?;
        let mut io_failed = false;
        let result = self.transport.get(&enclosure.url, &self.headers, &mut |total, chunk| {
            if file.write_all(chunk).is_err() {
                io_failed = true;
                return false;
            }
            self.hooks.download_progress(total, chunk.len() as u64)
        });
        drop(file);

        match result {
            Err(TransportError::Aborted) => {
                return Err(if io_failed {
                    UpdateError::FileIOFail
                } else {
                    // cancelled by the progress callback
                    UpdateError::NetworkFail { status: None }
                });
            }
            Err(TransportError::Failed(err)) => {
                debug!("artifact fetch failed: {err}");
                return Err(UpdateError::NetworkFail { status: None });
            }
            Ok(response) if response.status != 200 => {
                return Err(UpdateError::NetworkFail {
                    status: Some(response.status),
                });
            }
            Ok(_) => {}
        }

        if config.signature_algorithm != SignatureAlgorithm::None
            && !signing::verify_file(
                config.signature_algorithm,
                destination,
                &enclosure.signature,
                &config.public_key,
            )
        {
            // bytes reached disk but are not trusted
            return Err(UpdateError::BadSignature);
        }

        self.downloaded = Some(destination.to_path_buf());
        Ok(())
    }

    /// Download the selected enclosure into a caller buffer and verify it.
    ///
    /// Returns the payload length. The buffer variant never arms
    /// [`install`](Self::install); it exists for hosts that apply updates
    /// themselves.
    ///
    /// # Errors
    ///
    /// As [`download_to_file`](Self::download_to_file), plus
    /// [`UpdateError::FileIOFail`] when the payload exceeds the buffer and
    /// [`UpdateError::InvalidParameter`] for an empty buffer.
    pub fn download_to_buffer(&mut self, buffer: &mut [u8]) -> Result<usize, UpdateError> {
        if buffer.is_empty() {
            return Err(UpdateError::InvalidParameter("buffer"));
        }
        let config = self.config.as_ref().ok_or(UpdateError::NotReady)?;
        let selected = self.selected.as_ref().ok_or(UpdateError::NotReady)?;
        let enclosure = &selected.enclosure;

        if enclosure.url.is_empty() {
            return Err(UpdateError::Fail);
        }

        let capacity = buffer.len();
        let mut offset = 0usize;
        let mut overflowed = false;
        let result = self.transport.get(&enclosure.url, &self.headers, &mut |total, chunk| {
            if offset + chunk.len() > capacity {
                overflowed = true;
                return false;
            }
            buffer[offset..offset + chunk.len()].copy_from_slice(chunk);
            offset += chunk.len();
            self.hooks.download_progress(total, chunk.len() as u64)
        });

        match result {
            Err(TransportError::Aborted) => {
                return Err(if overflowed {
                    UpdateError::FileIOFail
                } else {
                    UpdateError::NetworkFail { status: None }
                });
            }
            Err(TransportError::Failed(err)) => {
                debug!("artifact fetch failed: {err}");
                return Err(UpdateError::NetworkFail { status: None });
            }
            Ok(response) if response.status != 200 => {
                return Err(UpdateError::NetworkFail {
                    status: Some(response.status),
                });
            }
            Ok(_) => {}
        }

        if config.signature_algorithm != SignatureAlgorithm::None
            && !signing::verify_buffer(
                config.signature_algorithm,
                &buffer[..offset],
                &enclosure.signature,
                &config.public_key,
            )
        {
            return Err(UpdateError::BadSignature);
        }

        Ok(offset)
    }

    /// Launch the verified artifact and ask the host to shut down.
    ///
    /// `override_args`, when given, replaces the enclosure's own installer
    /// arguments entirely.
    ///
    /// # Errors
    ///
    /// [`UpdateError::NotReady`] without a verified downloaded artifact,
    /// [`UpdateError::Fail`] when the launcher refuses.
    pub fn install(&mut self, override_args: Option<&str>) -> Result<(), UpdateError> {
        if self.config.is_none() {
            return Err(UpdateError::NotReady);
        }
        let package = self.downloaded.as_ref().ok_or(UpdateError::NotReady)?;
        let selected = self.selected.as_ref().ok_or(UpdateError::NotReady)?;

        let args = override_args.unwrap_or(selected.enclosure.install_arguments.as_str());
        if !self.platform.execute(package, args) {
            return Err(UpdateError::Fail);
        }

        self.installed = true;
        self.hooks.request_shutdown();
        Ok(())
    }

    /// Drop the cached selection and downloaded artifact, returning to
    /// `Ready`. Also re-arms [`configure`](Self::configure).
    pub fn clean(&mut self) {
        self.selected = None;
        self.downloaded = None;
        self.installed = false;
        self.reconfigurable = true;
    }

    /// Set (or overwrite) one outgoing HTTP header. Last write wins; empty
    /// keys are ignored.
    pub fn set_http_header(&mut self, key: &str, value: &str) {
        if key.is_empty() || value.is_empty() {
            return;
        }
        self.headers.insert(key.to_string(), value.to_string());
    }

    /// Set the proxy URL used for subsequent connections; empty clears it.
    pub fn set_proxy(&self, url: &str) {
        self.proxy.set(url);
    }

    /// The shared proxy slot, for wiring into a custom transport.
    pub fn proxy_handle(&self) -> ProxyHandle {
        self.proxy.clone()
    }

    /// The cached selection from the last successful check, if any.
    pub fn selected(&self) -> Option<&SelectedUpdate> {
        self.selected.as_ref()
    }

    /// Where the verified artifact lives, if one was downloaded.
    pub fn downloaded_path(&self) -> Option<&Path> {
        self.downloaded.as_deref()
    }
}
