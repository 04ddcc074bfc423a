//! Host-OS collaborator trait.
//!
//! OS compatibility, process launch and the user's locale are environment
//! concerns; the selection and session logic only ever sees this trait.

use std::path::Path;
use std::process::Command;

use tracing::debug;

/// Operating-system oracle, installer launcher and locale provider.
pub trait Platform: Send + Sync {
    /// Does an enclosure's OS tag describe the running platform?
    fn is_matched_os_name(&self, tag: &str) -> bool;

    /// Is the running OS version at least `min_version`?
    fn is_acceptable_os_version(&self, min_version: &str) -> bool;

    /// Launch the downloaded installer with the given argument string.
    /// Returns `false` when the process could not be started.
    fn execute(&self, package: &Path, args: &str) -> bool;

    /// Two-letter ISO 639-1 language code of the current user.
    fn user_language_tag(&self) -> String;
}

/// Portable default [`Platform`] built on std.
///
/// OS tags match when they start with [`std::env::consts::OS`] (so both
/// `windows` and `windows-x64` match on Windows); an empty tag matches
/// everything, which is how feeds that omit the attribute behave. The
/// OS-version check is permissive since std exposes no version probe; hosts
/// that care supply their own `Platform`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPlatform;

impl Platform for HostPlatform {
    fn is_matched_os_name(&self, tag: &str) -> bool {
        if tag.is_empty() {
            return true;
        }
        let tag = tag.to_ascii_lowercase();
        tag == std::env::consts::OS || tag.starts_with(&format!("{}-", std::env::consts::OS))
    }

    fn is_acceptable_os_version(&self, _min_version: &str) -> bool {
        true
    }

    fn execute(&self, package: &Path, args: &str) -> bool {
        let mut cmd = Command::new(package);
        if !args.is_empty() {
            cmd.args(args.split_whitespace());
        }
        match cmd.spawn() {
            Ok(_) => true,
            Err(err) => {
                debug!("failed to launch {}: {err}", package.display());
                false
            }
        }
    }

    fn user_language_tag(&self) -> String {
        // LC_ALL=fr_FR.UTF-8 / LANG=fr_FR -> "fr"
        for var in ["LC_ALL", "LANG"] {
            if let Ok(value) = std::env::var(var) {
                if value.len() >= 2 && value.as_bytes()[..2].iter().all(u8::is_ascii_alphabetic) {
                    return value[..2].to_ascii_lowercase();
                }
            }
        }
        "en".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_matches_every_os() {
        assert!(HostPlatform.is_matched_os_name(""));
    }

    #[test]
    fn os_tag_matching_is_prefix_shaped() {
        let platform = HostPlatform;
        let os = std::env::consts::OS;
        assert!(platform.is_matched_os_name(os));
        assert!(platform.is_matched_os_name(&format!("{os}-x64")));
        assert!(!platform.is_matched_os_name("solaris-sparc"));
    }

    #[test]
    fn language_tag_is_two_letters() {
        let tag = HostPlatform.user_language_tag();
        assert_eq!(tag.len(), 2);
        assert!(tag.bytes().all(|b| b.is_ascii_lowercase()));
    }
}
