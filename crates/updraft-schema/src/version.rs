//! Ordering for appcast version strings.
//!
//! Feed versions are dotted strings whose segments may be numeric or
//! alphanumeric (`1.2.10`, `2.0b3`). They are not semver: there is no fixed
//! segment count, no pre-release grammar, and feed authors rely on the exact
//! ordering below. Two numeric segments compare by integer magnitude; any
//! other pairing compares the raw segment text case-insensitively.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Scan one dot-delimited segment starting at `off`.
///
/// Returns the exclusive end of the segment and whether every byte in it is
/// an ASCII digit. An empty segment (offset already at a dot or past the end
/// of the string) reports `(off, true)` and is treated as exhaustion by the
/// caller.
fn segment_end(v: &[u8], off: usize) -> (usize, bool) {
    let mut idx = off;
    let mut numeric = true;
    while idx < v.len() {
        if v[idx] == b'.' {
            return (idx, numeric);
        }
        if numeric && !v[idx].is_ascii_digit() {
            numeric = false;
        }
        idx += 1;
    }
    (idx, numeric)
}

/// Compare two all-digit segments by integer magnitude.
///
/// Leading zeros are insignificant (`02` == `2`). Works for digit runs of
/// any length, so a hostile feed cannot overflow an integer parse.
fn compare_magnitude(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().position(|&d| d != b'0');
    match first {
        Some(idx) => &digits[idx..],
        None => &[],
    }
}

fn compare_bytes_ignore_case(a: &[u8], b: &[u8]) -> Ordering {
    a.iter()
        .map(u8::to_ascii_lowercase)
        .cmp(b.iter().map(u8::to_ascii_lowercase))
}

/// Total, deterministic ordering over dotted version strings.
///
/// Both strings are walked segment by segment. A side that runs out of
/// segments loses to a side that still has one (`1.2 < 1.2.0`). If both
/// current segments are purely numeric they compare as integers; otherwise
/// both compare as case-insensitive text, and the first non-equal segment
/// decides.
///
/// The mixed case is deliberate: a numeric `9` against `10a` compares as
/// *strings* (`"10a" < "9"`). Feeds in the wild depend on this, so it is
/// pinned by tests rather than corrected.
pub fn compare_versions(x: &str, y: &str) -> Ordering {
    let (x, y) = (x.as_bytes(), y.as_bytes());
    let (mut x_off, mut y_off) = (0usize, 0usize);
    loop {
        let (x_end, x_numeric) = segment_end(x, x_off);
        let (y_end, y_numeric) = segment_end(y, y_off);

        match (x_end == x_off, y_end == y_off) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        let x_seg = &x[x_off..x_end];
        let y_seg = &y[y_off..y_end];
        let ord = if x_numeric && y_numeric {
            compare_magnitude(x_seg, y_seg)
        } else {
            compare_bytes_ignore_case(x_seg, y_seg)
        };
        if ord != Ordering::Equal {
            return ord;
        }

        // step past the separator
        x_off = x_end + 1;
        y_off = y_end + 1;
    }
}

/// Plain ASCII case-insensitive string ordering.
///
/// Used where the feed format calls for string comparison of version-shaped
/// fields (critical-update barrier, minimum auto-update version, channel
/// names) instead of the segment ordering above.
pub fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    compare_bytes_ignore_case(a.as_bytes(), b.as_bytes())
}

/// An appcast version string, ordered by [`compare_versions`].
///
/// Equality and hashing are byte-wise on the raw string; only the ordering
/// is segment-aware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.0, &other.0)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Version {
    /// Create a new version from the given string (stored as-is).
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the string is empty (an invalid feed value).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
