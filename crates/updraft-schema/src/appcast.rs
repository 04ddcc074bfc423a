//! The appcast document model.
//!
//! An appcast is an RSS-shaped feed describing available releases. The
//! parser in `updraft-core` builds these types and uses [`Enclosure::validate`]
//! and [`ReleaseItem::validate`] to drop malformed entries; the selector
//! derives a [`SelectedUpdate`] from them.
//!
//! Optional scalar fields follow the feed format's convention of "empty
//! string means absent" rather than `Option`, since every one of them
//! arrives as element text that may simply be missing.

use serde::{Deserialize, Serialize};

use crate::lang::LocalizedText;
use crate::version::Version;

/// Signing scheme declared by an enclosure and configured on the session.
///
/// Identifies both the verification algorithm and the encoding convention
/// of the key material: DSA keys are PEM documents, Ed25519 keys are
/// base64-encoded raw 32-byte keys. `None` is a sentinel for "no
/// verification configured" and must never reach the verifier itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// No signature present / no verification configured.
    #[default]
    None,
    /// DSA over a SHA-1 double digest, PEM public key, DER signature.
    Dsa,
    /// Ed25519 over the raw payload, base64 raw public key.
    Ed25519,
}

/// Errors produced when validating feed entries.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("empty field: {0}")]
    EmptyField(&'static str),

    /// The enclosure declares a zero-byte artifact.
    #[error("enclosure length must be greater than zero")]
    ZeroSize,

    /// The item offers neither a downloadable enclosure nor an info page.
    #[error("item has no enclosure and no info link")]
    NoInstallSource,
}

/// One downloadable artifact attached to a release item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enclosure {
    /// Download URL.
    pub url: String,

    /// Signing scheme of [`signature`](Self::signature).
    pub signature_algorithm: SignatureAlgorithm,

    /// Detached signature, base64 text. Empty when the algorithm is `None`.
    pub signature: String,

    /// Declared artifact size in bytes.
    pub size: u64,

    /// MIME type, if the feed declares one.
    pub mime_type: String,

    /// Argument string to pass to the installer on launch.
    pub install_arguments: String,

    /// OS tag matched against the running platform (e.g. `windows-x64`).
    pub target_os: String,
}

impl Enclosure {
    /// Check the enclosure invariants: a non-empty URL and a positive size.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyField`] for an empty `url` and
    /// [`ValidationError::ZeroSize`] for a zero `size`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::EmptyField("url"));
        }
        if self.size == 0 {
            return Err(ValidationError::ZeroSize);
        }
        Ok(())
    }
}

/// One release entry in the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseItem {
    /// Release track label; empty means the default (stable) channel.
    pub channel: String,

    /// The comparison key for selection. Required.
    pub version: Version,

    /// Human-facing version string, display only.
    pub short_version: String,

    /// Publication date as it appears in the feed.
    pub publish_date: String,

    /// Item title.
    pub title: String,

    /// Per-language release description.
    pub description: LocalizedText,

    /// External info/download page URL.
    pub info_link: String,

    /// Per-language release notes URL.
    pub release_notes_link: LocalizedText,

    /// Minimum OS version this release supports.
    pub min_system_version: String,

    /// Minimum installed app version eligible for automatic update.
    pub min_auto_update_version: String,

    /// Versions at or below this barrier must treat the update as critical.
    pub critical_update_barrier: String,

    /// App versions for which this release is informational only.
    pub informational_versions: Vec<String>,

    /// Phased rollout delay in seconds; carried through, not acted upon.
    pub phased_rollout_interval: u64,

    /// Downloadable artifacts, in feed order.
    pub enclosures: Vec<Enclosure>,
}

impl ReleaseItem {
    /// Check the item invariants: a version, and at least one enclosure or
    /// a non-empty info link.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyField`] for a missing version and
    /// [`ValidationError::NoInstallSource`] when the item offers nothing to
    /// download or visit.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::EmptyField("version"));
        }
        if self.info_link.is_empty() && self.enclosures.is_empty() {
            return Err(ValidationError::NoInstallSource);
        }
        Ok(())
    }
}

/// A parsed feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Appcast {
    /// Feed title.
    pub title: String,

    /// Feed-level info page URL.
    pub info_link: String,

    /// Feed description.
    pub description: String,

    /// Feed-level language declaration.
    pub language: String,

    /// Release items that survived validation, in feed order.
    pub items: Vec<ReleaseItem>,
}

/// The single release chosen for the running application.
///
/// Derived by the selector, never parsed directly. Localized fields are
/// already resolved to the preferred language here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedUpdate {
    /// Channel of the winning item; empty for the default channel.
    pub channel: String,

    /// Version of the winning item.
    pub version: Version,

    /// Display version.
    pub short_version: String,

    /// Item title.
    pub title: String,

    /// Publication date as it appears in the feed.
    pub publish_date: String,

    /// Description resolved for the preferred language.
    pub description: String,

    /// Release notes URL resolved for the preferred language.
    pub release_notes_link: String,

    /// External info/download page URL.
    pub info_link: String,

    /// The enclosure whose OS tag matched the running platform.
    pub enclosure: Enclosure,

    /// The running version appears in the item's informational list.
    pub is_informational: bool,

    /// The running version is below the item's critical-update barrier.
    pub is_critical: bool,

    /// The running version meets the item's minimum auto-update version.
    pub is_auto_update_eligible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_enclosure() -> Enclosure {
        Enclosure {
            url: "https://example.com/app-2.0.exe".to_string(),
            signature_algorithm: SignatureAlgorithm::Ed25519,
            signature: "c2ln".to_string(),
            size: 1024,
            target_os: "windows-x64".to_string(),
            ..Enclosure::default()
        }
    }

    #[test]
    fn enclosure_requires_url_and_size() {
        assert!(valid_enclosure().validate().is_ok());

        let mut no_url = valid_enclosure();
        no_url.url.clear();
        assert!(matches!(
            no_url.validate(),
            Err(ValidationError::EmptyField("url"))
        ));

        let mut zero = valid_enclosure();
        zero.size = 0;
        assert!(matches!(zero.validate(), Err(ValidationError::ZeroSize)));
    }

    #[test]
    fn item_requires_version() {
        let item = ReleaseItem {
            enclosures: vec![valid_enclosure()],
            ..ReleaseItem::default()
        };
        assert!(matches!(
            item.validate(),
            Err(ValidationError::EmptyField("version"))
        ));
    }

    #[test]
    fn item_requires_enclosure_or_info_link() {
        let bare = ReleaseItem {
            version: Version::new("2.0"),
            ..ReleaseItem::default()
        };
        assert!(matches!(
            bare.validate(),
            Err(ValidationError::NoInstallSource)
        ));

        let with_link = ReleaseItem {
            version: Version::new("2.0"),
            info_link: "https://example.com/releases".to_string(),
            ..ReleaseItem::default()
        };
        assert!(with_link.validate().is_ok());

        let with_enclosure = ReleaseItem {
            version: Version::new("2.0"),
            enclosures: vec![valid_enclosure()],
            ..ReleaseItem::default()
        };
        assert!(with_enclosure.validate().is_ok());
    }

    #[test]
    fn signature_algorithm_serde_names() {
        assert_eq!(
            serde_json::to_string(&SignatureAlgorithm::Ed25519).unwrap(),
            "\"ed25519\""
        );
        assert_eq!(
            serde_json::from_str::<SignatureAlgorithm>("\"dsa\"").unwrap(),
            SignatureAlgorithm::Dsa
        );
    }
}
