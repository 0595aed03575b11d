//! Region key normalization for Swedish counties ("län")
//!
//! Callers send free-text county names in many spellings ("Uppsala län",
//! "uppsala-lan", "UPPSALA COUNTY"). Everything is folded into a single
//! canonical `RegionKey` that names the cache file and is sent upstream.

use std::fmt;

/// Suffix every canonical key ends with
const LAN_SUFFIX: &str = "-lan";

/// Trailing words that mean "county" and are stripped before re-appending `-lan`
const COUNTY_SUFFIXES: [&str; 4] = ["-county", "county", "-lan", "lan"];

/// A canonical, filesystem-safe region key such as `uppsala-lan`
///
/// Only contains `[a-z0-9-]`, never starts with a hyphen and always ends
/// with `-lan`. Construct one with [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(String);

impl RegionKey {
    /// Builds a key from an already-normalized base name (without `-lan`)
    fn from_base(base: &str) -> Self {
        Self(format!("{}{}", base, LAN_SUFFIX))
    }

    /// The full key, e.g. `uppsala-lan`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The county name without the `-lan` suffix, e.g. `uppsala`
    pub fn base(&self) -> &str {
        self.0.strip_suffix(LAN_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a free-text county name into its canonical key
///
/// Lower-cases, folds Swedish diacritics (å/ä → a, ö → o), turns whitespace
/// and underscores into single hyphens, drops anything outside `[a-z0-9-]`,
/// strips a trailing "lan"/"county" and re-appends `-lan`.
///
/// # Returns
/// * `Some(RegionKey)` for any input with a non-empty county name
/// * `None` for empty input or input that is only punctuation or a bare suffix
pub fn normalize(raw: &str) -> Option<RegionKey> {
    let lowered = raw.trim().to_lowercase();
    let mut folded = String::with_capacity(lowered.len());

    for ch in lowered.chars() {
        match ch {
            'å' | 'ä' | 'à' | 'á' | 'â' => folded.push('a'),
            'ö' | 'ø' | 'ó' | 'ò' | 'ô' => folded.push('o'),
            'é' | 'è' | 'ê' | 'ë' => folded.push('e'),
            'ü' | 'ú' | 'ù' => folded.push('u'),
            c if c.is_whitespace() || c == '_' || c == '-' => {
                if !folded.is_empty() && !folded.ends_with('-') {
                    folded.push('-');
                }
            }
            c if c.is_ascii_alphanumeric() => folded.push(c),
            _ => {}
        }
    }

    let trimmed = folded.trim_end_matches('-');
    let base = COUNTY_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .trim_end_matches('-');

    if base.is_empty() {
        None
    } else {
        Some(RegionKey::from_base(base))
    }
}

/// Strategy for generating the ordered list of candidate keys for a region
///
/// The upstream provider is inconsistent about genitive forms
/// ("stockholms-lan" vs "stockholm-lan"), so a lookup may try more than one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateStrategy {
    /// Only the canonical key
    Exact,
    /// The canonical key, then the same base with a trailing `s` added or removed
    #[default]
    PluralToggle,
}

impl CandidateStrategy {
    /// Returns all strategies with their CLI names
    pub fn all() -> &'static [CandidateStrategy] {
        &[CandidateStrategy::Exact, CandidateStrategy::PluralToggle]
    }

    /// Parses a strategy from its CLI name
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(CandidateStrategy::Exact),
            "plural-toggle" | "plural" | "toggle" => Some(CandidateStrategy::PluralToggle),
            _ => None,
        }
    }

    /// Name used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            CandidateStrategy::Exact => "exact",
            CandidateStrategy::PluralToggle => "plural-toggle",
        }
    }

    /// Produces the candidate keys for `key`, most likely first
    ///
    /// The canonical key is always first and the list never contains duplicates.
    pub fn candidates(&self, key: &RegionKey) -> Vec<RegionKey> {
        let mut out = vec![key.clone()];

        if let CandidateStrategy::PluralToggle = self {
            let base = key.base();
            let toggled = match base.strip_suffix('s') {
                Some(stripped) => stripped.trim_end_matches('-').to_string(),
                None => format!("{}s", base),
            };
            if !toggled.is_empty() {
                let alt = RegionKey::from_base(&toggled);
                if !out.contains(&alt) {
                    out.push(alt);
                }
            }
        }

        out
    }
}

impl fmt::Display for CandidateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
