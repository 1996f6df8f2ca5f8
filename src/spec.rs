//! Acceptance specifications.
//!
//! A [`SpecRegistry`] holds the lower/upper acceptance limits for every
//! standard type of both measurement windows. Keys coming from the outside
//! world are normalized (window prefix stripped, synonyms folded) before
//! they are stored, and textual limits go through the same correction rules
//! that the test stations apply when they write their spec sheets:
//!
//! - a lower limit written as `-1` means "no lower limit" and is stored as `0`,
//! - an upper limit of `0` on Uniformity (`U`) means "no upper limit" and is
//!   stored as `100`,
//! - blank limits are one-sided and stored as an infinite sentinel.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};

// ---------------------------------------------------------------------------
// WindowType
// ---------------------------------------------------------------------------

/// The two physical measurement regions of a unit under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WindowType {
    White,
    Mixed,
}

impl WindowType {
    pub const ALL: [WindowType; 2] = [WindowType::White, WindowType::Mixed];

    /// Column-name prefix used by the test stations (`W_L`, `M_dY`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            WindowType::White => "W_",
            WindowType::Mixed => "M_",
        }
    }

    /// Single-letter tag used inside `MetricN` column names (`W_M2_...`).
    pub fn letter(self) -> char {
        match self {
            WindowType::White => 'W',
            WindowType::Mixed => 'M',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WindowType::White => "White",
            WindowType::Mixed => "Mixed",
        }
    }

    /// Strip a leading window marker (`W_`, `White_`, `White `, ...) from a raw key.
    /// Returns the detected window and the remainder.
    pub fn strip_prefix(raw: &str) -> (Option<WindowType>, &str) {
        let trimmed = raw.trim();
        for window in WindowType::ALL {
            let long = window.name();
            for sep in ['_', ' ', '-'] {
                if let Some(rest) = strip_prefix_ci(trimmed, long, sep) {
                    return (Some(window), rest.trim());
                }
            }
            if let Some(rest) = strip_prefix_ci(trimmed, &window.letter().to_string(), '_') {
                return (Some(window), rest.trim());
            }
        }
        (None, trimmed)
    }
}

fn strip_prefix_ci<'a>(s: &'a str, head: &str, sep: char) -> Option<&'a str> {
    let n = head.len();
    if s.len() <= n || !s.is_char_boundary(n) || !s[..n].eq_ignore_ascii_case(head) {
        return None;
    }
    s[n..].strip_prefix(sep)
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(WindowType::White),
            "mixed" | "m" => Ok(WindowType::Mixed),
            _ => Err(SpecError::UnknownWindowType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Standard-type normalization
// ---------------------------------------------------------------------------

/// Canonical standard type of the one-sided maximum-deviation metric.
pub const MAX_DEVIATION: &str = "MaxDev";

/// Spellings seen on spec sheets and column headers, per canonical standard
/// type. Key folding, column keywords and capability side selection all read
/// this table; extend it instead of adding branches elsewhere.
pub const SYNONYM_TABLE: &[(&str, &[&str])] = &[
    ("L", &["lightness", "luminance", "lum", "brightness", "lv"]),
    ("U", &["uniformity", "unif"]),
    ("dY", &["delta y", "deltay", "dy"]),
    (MAX_DEVIATION, &["max deviation", "maxdev", "max dev"]),
    ("CCT", &["cct", "color temperature", "colour temperature"]),
];

/// Lowercase spellings registered for `standard_type` (empty when unknown).
pub fn synonyms_for(standard_type: &str) -> &'static [&'static str] {
    SYNONYM_TABLE
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(standard_type))
        .map(|(_, v)| *v)
        .unwrap_or(&[])
}

/// Canonical standard type for an already lowercased, whitespace-folded key.
fn canonical_for(folded: &str) -> Option<&'static str> {
    SYNONYM_TABLE
        .iter()
        .find(|(canonical, spellings)| {
            canonical.eq_ignore_ascii_case(folded) || spellings.contains(&folded)
        })
        .map(|(canonical, _)| *canonical)
}

/// Parse `MetricN` (case-insensitive) and return `N`.
pub fn metric_number(standard_type: &str) -> Option<u32> {
    let s = standard_type.trim();
    if s.len() <= 6 || !s.is_char_boundary(6) || !s[..6].eq_ignore_ascii_case("metric") {
        return None;
    }
    let digits = &s[6..];
    if digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Normalize a raw spec key into `(window detected in the key, canonical standard type)`.
///
/// ```
/// use testlog_analyzer::spec::{normalize_key, WindowType};
///
/// assert_eq!(normalize_key("W_Lightness"), (Some(WindowType::White), "L".to_string()));
/// assert_eq!(normalize_key("uniformity"), (None, "U".to_string()));
/// assert_eq!(normalize_key("M_metric3"), (Some(WindowType::Mixed), "Metric3".to_string()));
/// ```
pub fn normalize_key(raw: &str) -> (Option<WindowType>, String) {
    let (window, rest) = WindowType::strip_prefix(raw);
    let folded = rest
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(canonical) = canonical_for(&folded) {
        return (window, canonical.to_string());
    }
    if let Some(n) = metric_number(rest) {
        return (window, format!("Metric{n}"));
    }
    (window, rest.to_string())
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Side::Lower => "lower",
            Side::Upper => "upper",
        }
    }

    fn sentinel(self) -> f64 {
        match self {
            Side::Lower => f64::NEG_INFINITY,
            Side::Upper => f64::INFINITY,
        }
    }
}

/// Parse one textual limit, applying the spec-sheet correction rules.
/// Blank cells become the infinite sentinel; `None` means unparsable.
fn parse_limit(text: &str, side: Side, standard_type: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() || matches!(t.to_ascii_lowercase().as_str(), "none" | "null" | "nan" | "-" | "n/a") {
        return Some(side.sentinel());
    }
    if side == Side::Lower && t == "-1" {
        return Some(0.0);
    }
    if side == Side::Upper && t == "0" && standard_type == "U" {
        return Some(100.0);
    }
    t.parse::<f64>().ok().filter(|v| !v.is_nan())
}

// ---------------------------------------------------------------------------
// Specification
// ---------------------------------------------------------------------------

/// One acceptance criterion. Infinite limits mark a one-sided spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Specification {
    pub window_type: WindowType,
    pub standard_type: String,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub description: String,
}

impl Specification {
    pub fn has_lower(&self) -> bool {
        self.lower_limit.is_finite()
    }

    pub fn has_upper(&self) -> bool {
        self.upper_limit.is_finite()
    }

    pub fn limits(&self) -> (f64, f64) {
        (self.lower_limit, self.upper_limit)
    }
}

// ---------------------------------------------------------------------------
// SpecRegistry
// ---------------------------------------------------------------------------

/// Acceptance limits per window type and standard type, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    white: Vec<Specification>,
    mixed: Vec<Specification>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, window: WindowType) -> &Vec<Specification> {
        match window {
            WindowType::White => &self.white,
            WindowType::Mixed => &self.mixed,
        }
    }

    fn bucket_mut(&mut self, window: WindowType) -> &mut Vec<Specification> {
        match window {
            WindowType::White => &mut self.white,
            WindowType::Mixed => &mut self.mixed,
        }
    }

    /// Register (or replace) numeric limits for a standard type.
    ///
    /// The key is normalized; use `f64::NEG_INFINITY` / `f64::INFINITY` for a
    /// missing side.
    ///
    /// # Errors
    ///
    /// - [`SpecError::EmptyKey`] for a blank standard type
    /// - [`SpecError::UnparsableLimit`] if either limit is NaN
    /// - [`SpecError::InvertedLimits`] if both limits are finite and lower > upper
    pub fn set(
        &mut self,
        window: WindowType,
        standard_type: &str,
        lower: f64,
        upper: f64,
    ) -> SpecResult<()> {
        let (_, canonical) = normalize_key(standard_type);
        if canonical.is_empty() {
            return Err(SpecError::EmptyKey);
        }
        for (side, v) in [(Side::Lower, lower), (Side::Upper, upper)] {
            if v.is_nan() {
                return Err(SpecError::UnparsableLimit {
                    window,
                    standard_type: canonical,
                    side: side.label(),
                    text: v.to_string(),
                });
            }
        }
        if lower.is_finite() && upper.is_finite() && lower > upper {
            return Err(SpecError::InvertedLimits {
                window,
                standard_type: canonical,
                lower,
                upper,
            });
        }

        let spec = Specification {
            window_type: window,
            description: format!("{window} {canonical}"),
            standard_type: canonical,
            lower_limit: lower,
            upper_limit: upper,
        };
        let bucket = self.bucket_mut(window);
        match bucket.iter_mut().find(|s| s.standard_type == spec.standard_type) {
            Some(existing) => *existing = spec,
            None => bucket.push(spec),
        }
        Ok(())
    }

    /// Register limits given as spec-sheet text, applying the correction rules.
    ///
    /// A window prefix inside `raw_key` overrides nothing: the caller's
    /// `window` wins, the prefix is only stripped.
    ///
    /// # Errors
    ///
    /// Same as [`SpecRegistry::set`]; an unparsable limit drops the entry.
    pub fn set_text(
        &mut self,
        window: WindowType,
        raw_key: &str,
        lower: &str,
        upper: &str,
    ) -> SpecResult<()> {
        let (_, canonical) = normalize_key(raw_key);
        if canonical.is_empty() {
            return Err(SpecError::EmptyKey);
        }
        let parse = |text: &str, side: Side| {
            parse_limit(text, side, &canonical).ok_or_else(|| SpecError::UnparsableLimit {
                window,
                standard_type: canonical.clone(),
                side: side.label(),
                text: text.to_string(),
            })
        };
        let lo = parse(lower, Side::Lower)?;
        let hi = parse(upper, Side::Upper)?;
        self.set(window, &canonical, lo, hi)
    }

    /// Like [`SpecRegistry::set_text`] but logs and swallows the error.
    /// Returns whether the entry was stored.
    pub fn set_text_lenient(&mut self, window: WindowType, raw_key: &str, lower: &str, upper: &str) -> bool {
        match self.set_text(window, raw_key, lower, upper) {
            Ok(()) => true,
            Err(e) => {
                warn!("dropping spec entry: {e}");
                false
            }
        }
    }

    /// Look up `(lower, upper)` for a (possibly unnormalized) standard type.
    pub fn get(&self, window: WindowType, standard_type: &str) -> Option<(f64, f64)> {
        self.spec(window, standard_type).map(Specification::limits)
    }

    pub fn spec(&self, window: WindowType, standard_type: &str) -> Option<&Specification> {
        let (_, canonical) = normalize_key(standard_type);
        self.bucket(window)
            .iter()
            .find(|s| s.standard_type == canonical)
    }

    /// All specifications of one window, in insertion order.
    pub fn specs(&self, window: WindowType) -> &[Specification] {
        self.bucket(window)
    }

    /// All specifications, White first.
    pub fn iter(&self) -> impl Iterator<Item = &Specification> {
        self.white.iter().chain(self.mixed.iter())
    }

    pub fn remove(&mut self, window: WindowType, standard_type: &str) -> Option<Specification> {
        let (_, canonical) = normalize_key(standard_type);
        let bucket = self.bucket_mut(window);
        let pos = bucket.iter().position(|s| s.standard_type == canonical)?;
        Some(bucket.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.white.len() + self.mixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
