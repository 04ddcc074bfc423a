//! Localized string maps.
//!
//! Appcast elements such as `description` may repeat once per language,
//! carrying a two-letter `xml:lang` attribute. Entries without a usable
//! attribute land under the [`LangKey::Unspecified`] sentinel, which doubles
//! as the fallback slot at resolution time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key of one entry in a localized string map.
///
/// Codes are case-folded at construction, so `"FR"`, `"Fr"` and `"fr"` all
/// produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LangKey {
    /// No (valid) language attribute; the fallback entry.
    Unspecified,
    /// A two-letter ISO 639-1 code, stored lowercased.
    Code([u8; 2]),
}

impl LangKey {
    /// Build a key from a language tag.
    ///
    /// Only tags of exactly two ASCII characters are accepted; anything else
    /// returns `None` and the caller decides whether that means "fall back
    /// to unspecified" or "reject the element".
    pub fn from_tag(tag: &str) -> Option<Self> {
        let bytes = tag.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        Some(Self::Code([
            bytes[0].to_ascii_lowercase(),
            bytes[1].to_ascii_lowercase(),
        ]))
    }

    /// The tag as text; empty for the sentinel.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unspecified => "",
            // constructed from two ASCII bytes, always valid UTF-8
            Self::Code(code) => std::str::from_utf8(code).unwrap_or(""),
        }
    }
}

/// A per-language string table keyed by [`LangKey`].
pub type LocalizedText = BTreeMap<LangKey, String>;

/// Look up the entry for `requested_lang`, falling back to the unspecified
/// slot, then to the empty string.
///
/// The requested tag must be exactly two characters; anything else resolves
/// to empty. There is no prefix or region matching.
pub fn resolve_localized<'a>(map: &'a LocalizedText, requested_lang: &str) -> &'a str {
    let Some(key) = LangKey::from_tag(requested_lang) else {
        return "";
    };
    if let Some(text) = map.get(&key) {
        return text;
    }
    map.get(&LangKey::Unspecified).map_or("", String::as_str)
}
