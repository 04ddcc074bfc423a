//! Candidate selection.
//!
//! Given a parsed feed and the running application's version, language and
//! accepted channels, pick at most one release. Items are scanned in
//! descending version order and the first one with an OS-matching
//! enclosure, an acceptable minimum system version and an accepted channel
//! wins.

use std::cmp::Ordering;

use tracing::debug;
use updraft_schema::{
    Appcast, ReleaseItem, SelectedUpdate, compare_ignore_case, compare_versions,
    resolve_localized,
};

use crate::platform::Platform;

/// Select the single best applicable release, or `None`.
///
/// The scan is gated on the *head* of the version-sorted list: when the
/// newest item in the feed is not newer than `current_version`, no item is
/// considered at all. The gate sits inside the loop on purpose — it
/// replicates the update feed format's reference behavior exactly, and the
/// sort must be stable so ties keep feed order.
pub fn select_update(
    appcast: &Appcast,
    current_version: &str,
    preferred_lang: &str,
    accepted_channels: &[String],
    platform: &dyn Platform,
) -> Option<SelectedUpdate> {
    let mut items: Vec<&ReleaseItem> = appcast.items.iter().collect();
    items.sort_by(|a, b| b.version.cmp(&a.version));

    for item in &items {
        if compare_versions(items[0].version.as_str(), current_version) != Ordering::Greater {
            // nothing in the feed is newer than what is running
            break;
        }

        // first enclosure built for this platform
        let Some(enclosure) = item
            .enclosures
            .iter()
            .find(|enclosure| platform.is_matched_os_name(&enclosure.target_os))
        else {
            debug!("{}: no enclosure for this platform", item.version);
            continue;
        };

        if !item.min_system_version.is_empty()
            && !platform.is_acceptable_os_version(&item.min_system_version)
        {
            debug!("{}: minimum system version not met", item.version);
            continue;
        }

        // an empty channel is the default channel and always acceptable
        if !item.channel.is_empty() {
            let accepted = accepted_channels
                .iter()
                .any(|channel| compare_ignore_case(channel, &item.channel) == Ordering::Equal);
            if !accepted {
                debug!("{}: channel {:?} not accepted", item.version, item.channel);
                continue;
            }
        }

        let is_informational = item
            .informational_versions
            .iter()
            .any(|version| compare_ignore_case(version, current_version) == Ordering::Equal);

        // barrier fields use plain case-insensitive string comparison, not
        // the segment ordering
        let is_critical = !item.critical_update_barrier.is_empty()
            && compare_ignore_case(&item.critical_update_barrier, current_version)
                == Ordering::Greater;

        let is_auto_update_eligible = !item.min_auto_update_version.is_empty()
            && compare_ignore_case(&item.min_auto_update_version, current_version)
                != Ordering::Greater;

        return Some(SelectedUpdate {
            channel: item.channel.clone(),
            version: item.version.clone(),
            short_version: item.short_version.clone(),
            title: item.title.clone(),
            publish_date: item.publish_date.clone(),
            description: resolve_localized(&item.description, preferred_lang).to_string(),
            release_notes_link: resolve_localized(&item.release_notes_link, preferred_lang)
                .to_string(),
            info_link: item.info_link.clone(),
            enclosure: enclosure.clone(),
            is_informational,
            is_critical,
            is_auto_update_eligible,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use updraft_schema::{Enclosure, LangKey, SignatureAlgorithm, Version};

    /// Platform stub that matches one fixed OS tag.
    struct FixedOs {
        os: &'static str,
        version_ok: bool,
    }

    impl Platform for FixedOs {
        fn is_matched_os_name(&self, tag: &str) -> bool {
            tag.eq_ignore_ascii_case(self.os)
        }
        fn is_acceptable_os_version(&self, _min_version: &str) -> bool {
            self.version_ok
        }
        fn execute(&self, _package: &std::path::Path, _args: &str) -> bool {
            true
        }
        fn user_language_tag(&self) -> String {
            "en".to_string()
        }
    }

    fn windows() -> FixedOs {
        FixedOs {
            os: "windows",
            version_ok: true,
        }
    }

    fn enclosure(os: &str) -> Enclosure {
        Enclosure {
            url: format!("https://example.com/{os}.bin"),
            signature_algorithm: SignatureAlgorithm::Ed25519,
            signature: "c2ln".to_string(),
            size: 1,
            target_os: os.to_string(),
            ..Enclosure::default()
        }
    }

    fn item(version: &str, os_tags: &[&str]) -> ReleaseItem {
        ReleaseItem {
            version: Version::new(version),
            enclosures: os_tags.iter().map(|os| enclosure(os)).collect(),
            ..ReleaseItem::default()
        }
    }

    fn feed(items: Vec<ReleaseItem>) -> Appcast {
        Appcast {
            items,
            ..Appcast::default()
        }
    }

    #[test]
    fn picks_the_highest_applicable_version() {
        let feed = feed(vec![
            item("1.0", &["windows"]),
            item("2.0", &["windows"]),
            item("1.5", &["windows"]),
        ]);
        let selected = select_update(&feed, "1.0", "en", &[], &windows()).unwrap();
        assert_eq!(selected.version.as_str(), "2.0");
    }

    #[test]
    fn falls_through_when_the_top_item_has_no_matching_enclosure() {
        let feed = feed(vec![
            item("2.0", &["macos"]),
            item("1.5", &["windows"]),
            item("1.0", &["windows"]),
        ]);
        let selected = select_update(&feed, "1.0", "en", &[], &windows()).unwrap();
        assert_eq!(selected.version.as_str(), "1.5");
    }

    // The gate tests the head of the sorted list, not the current item: a
    // feed whose newest entry is not newer than the running version yields
    // nothing, even when an older entry would otherwise qualify.
    #[test]
    fn head_gate_blocks_the_whole_scan() {
        let feed = feed(vec![item("1.0", &["windows"]), item("0.9", &["windows"])]);
        assert!(select_update(&feed, "1.0", "en", &[], &windows()).is_none());
    }

    #[test]
    fn first_matching_enclosure_of_the_item_wins() {
        let feed = feed(vec![item("2.0", &["macos", "windows", "windows-arm"])]);
        let selected = select_update(&feed, "1.0", "en", &[], &windows()).unwrap();
        assert_eq!(selected.enclosure.target_os, "windows");
    }

    #[test]
    fn minimum_system_version_rejects_the_item() {
        let mut too_new = item("2.0", &["windows"]);
        too_new.min_system_version = "99.0".to_string();
        let older = item("1.5", &["windows"]);
        let feed = feed(vec![too_new, older]);

        let platform = FixedOs {
            os: "windows",
            version_ok: false,
        };
        let selected = select_update(&feed, "1.0", "en", &[], &platform).unwrap();
        assert_eq!(selected.version.as_str(), "1.5");
    }

    #[test]
    fn channel_item_needs_an_accepted_channel() {
        let mut beta = item("2.0", &["windows"]);
        beta.channel = "beta".to_string();
        let feed = feed(vec![beta]);

        assert!(select_update(&feed, "1.0", "en", &[], &windows()).is_none());

        let accepted = vec!["Beta".to_string()];
        let selected = select_update(&feed, "1.0", "en", &accepted, &windows()).unwrap();
        assert_eq!(selected.channel, "beta");
    }

    #[test]
    fn default_channel_is_always_eligible() {
        let feed = feed(vec![item("2.0", &["windows"])]);
        let accepted = vec!["beta".to_string()];
        assert!(select_update(&feed, "1.0", "en", &accepted, &windows()).is_some());
    }

    #[test]
    fn derived_flags() {
        let mut rich = item("2.0", &["windows"]);
        rich.informational_versions = vec!["1.0".to_string(), "0.9".to_string()];
        rich.critical_update_barrier = "1.5".to_string();
        rich.min_auto_update_version = "0.5".to_string();
        let feed = feed(vec![rich]);

        let selected = select_update(&feed, "1.0", "en", &[], &windows()).unwrap();
        assert!(selected.is_informational);
        assert!(selected.is_critical);
        assert!(selected.is_auto_update_eligible);

        let other = select_update(&feed, "1.6", "en", &[], &windows()).unwrap();
        assert!(!other.is_informational);
        assert!(!other.is_critical); // "1.5" < "1.6" as strings
        assert!(other.is_auto_update_eligible);
    }

    #[test]
    fn localized_fields_resolve_to_the_preferred_language() {
        let mut localized = item("2.0", &["windows"]);
        localized
            .description
            .insert(LangKey::Unspecified, "fallback".to_string());
        localized
            .description
            .insert(LangKey::from_tag("fr").unwrap(), "french".to_string());
        let feed = feed(vec![localized]);

        let fr = select_update(&feed, "1.0", "fr", &[], &windows()).unwrap();
        assert_eq!(fr.description, "french");
        let de = select_update(&feed, "1.0", "de", &[], &windows()).unwrap();
        assert_eq!(de.description, "fallback");
    }

    #[test]
    fn empty_feed_selects_nothing() {
        assert!(select_update(&feed(vec![]), "1.0", "en", &[], &windows()).is_none());
    }

    #[test]
    fn ties_keep_feed_order() {
        let mut first = item("2.0", &["windows"]);
        first.title = "first".to_string();
        let mut second = item("2.0", &["windows"]);
        second.title = "second".to_string();
        let feed = feed(vec![first, second]);

        let selected = select_update(&feed, "1.0", "en", &[], &windows()).unwrap();
        assert_eq!(selected.title, "first");
    }
}
