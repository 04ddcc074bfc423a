//! Host callback trait for dependency injection.
//!
//! This trait allows the update session to notify the host application
//! without being coupled to a specific UI. All callbacks run synchronously
//! on the calling thread.

use updraft_schema::SelectedUpdate;

/// Callbacks a host application supplies to an update session.
pub trait UpdateHooks: Send + Sync {
    /// A new applicable release was found; fields are already resolved for
    /// the preferred language.
    fn new_version_found(&self, update: &SelectedUpdate);

    /// Download progress. `total` is the expected byte count (0 when the
    /// server did not declare one), `received` the bytes of this delivery.
    ///
    /// Returning `false` cancels the transfer immediately; this is the only
    /// cancellation mechanism the session offers.
    fn download_progress(&self, total: u64, received: u64) -> bool;

    /// The installer was launched; the host should shut itself down so the
    /// update can replace it.
    fn request_shutdown(&self);
}

impl<T: UpdateHooks + ?Sized> UpdateHooks for std::sync::Arc<T> {
    fn new_version_found(&self, update: &SelectedUpdate) {
        (**self).new_version_found(update);
    }
    fn download_progress(&self, total: u64, received: u64) -> bool {
        (**self).download_progress(total, received)
    }
    fn request_shutdown(&self) {
        (**self).request_shutdown();
    }
}

/// A no-op hooks implementation for tests and headless embeddings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl UpdateHooks for NullHooks {
    fn new_version_found(&self, _update: &SelectedUpdate) {}
    fn download_progress(&self, _total: u64, _received: u64) -> bool {
        true
    }
    fn request_shutdown(&self) {}
}
