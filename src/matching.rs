//! Fuzzy binding of standard types to test-log columns.
//!
//! Column headers written by test stations are inconsistent
//! (`W_L (cd/m2)`, `W_Lightness`, `White Lum.`). Every candidate column gets
//! a cumulative score against the requested standard type:
//!
//! | Rule | Points |
//! |------|--------|
//! | column carries the window prefix (`W_` / `M_`) | +5 |
//! | normalized standard type occurs in the column | +10 |
//! | otherwise, per synonym keyword occurring in the column | +5 |
//! | ... and that keyword sits on token boundaries | +3 |
//! | column body equals the standard type exactly | +20 |
//!
//! The best column binds only when its score reaches the threshold (9 by
//! default). `MetricN` standard types skip scoring and bind to the first
//! column named `W_MN_...` (White) or `M_MN_...` (Mixed).

use log::{debug, info};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::spec::{metric_number, synonyms_for, SpecRegistry, Specification, WindowType};

pub const PREFIX_SCORE: i32 = 5;
pub const SUBSTRING_SCORE: i32 = 10;
pub const KEYWORD_SCORE: i32 = 5;
pub const BOUNDARY_BONUS: i32 = 3;
pub const EXACT_SCORE: i32 = 20;
/// Score reported for a direct `MetricN` binding.
pub const DIRECT_SCORE: i32 = 100;

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Strip parenthesized units, turn punctuation into spaces, lowercase and
/// collapse whitespace: `"W_L (cd/m2)"` → `"w l"`.
pub fn normalize_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs in `haystack` starting and ending on token
/// boundaries. Both sides are expected to be normalized.
fn occurs_on_boundary(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let padded_hay = format!(" {haystack} ");
    let padded_needle = format!(" {needle} ");
    padded_hay.contains(&padded_needle)
}

fn strip_window_prefix<'a>(column: &'a str, window: WindowType) -> Option<&'a str> {
    let p = window.prefix();
    let head = column.get(..p.len())?;
    head.eq_ignore_ascii_case(p).then(|| &column[p.len()..])
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score one column against one standard type. Pure; no threshold applied.
pub fn score_column(window: WindowType, standard_type: &str, column: &str) -> i32 {
    let mut score = 0;
    let body = match strip_window_prefix(column, window) {
        Some(rest) => {
            score += PREFIX_SCORE;
            normalize_text(rest)
        }
        None => normalize_text(column),
    };
    let target = normalize_text(standard_type);
    if target.is_empty() || body.is_empty() {
        return score;
    }

    if body.contains(&target) {
        score += SUBSTRING_SCORE;
    } else {
        for keyword in synonyms_for(standard_type) {
            if body.contains(keyword) {
                score += KEYWORD_SCORE;
                if occurs_on_boundary(&body, keyword) {
                    score += BOUNDARY_BONUS;
                }
            }
        }
    }

    if body == target {
        score += EXACT_SCORE;
    }
    score
}

// ---------------------------------------------------------------------------
// ColumnMatch / ColumnMatcher
// ---------------------------------------------------------------------------

/// Outcome of matching one standard type against the available columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMatch {
    pub window_type: WindowType,
    pub standard_type: String,
    pub matched_column: Option<String>,
    pub column_index: Option<usize>,
    pub confidence_score: i32,
}

impl ColumnMatch {
    pub fn is_matched(&self) -> bool {
        self.matched_column.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnMatcher {
    threshold: i32,
}

impl Default for ColumnMatcher {
    fn default() -> Self {
        Self { threshold: 9 }
    }
}

impl ColumnMatcher {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Find the column a standard type binds to.
    ///
    /// The highest score wins (first column on ties) and is accepted only
    /// when it reaches the threshold.
    pub fn match_column(
        &self,
        window: WindowType,
        standard_type: &str,
        columns: &[String],
    ) -> ColumnMatch {
        self.match_column_where(window, standard_type, columns, |_| true)
    }

    /// [`ColumnMatcher::match_column`] restricted to columns accepted by
    /// `candidate`. Indices still refer to positions in `columns`.
    pub fn match_column_where(
        &self,
        window: WindowType,
        standard_type: &str,
        columns: &[String],
        candidate: impl Fn(&str) -> bool,
    ) -> ColumnMatch {
        let mut result = ColumnMatch {
            window_type: window,
            standard_type: standard_type.to_string(),
            matched_column: None,
            column_index: None,
            confidence_score: 0,
        };

        if let Some(n) = metric_number(standard_type) {
            let head = format!("{}_M{n}_", window.letter());
            let hit = columns.iter().position(|c| {
                candidate(c)
                    && c.get(..head.len())
                        .is_some_and(|h| h.eq_ignore_ascii_case(&head))
            });
            if let Some(i) = hit {
                result.matched_column = Some(columns[i].clone());
                result.column_index = Some(i);
                result.confidence_score = DIRECT_SCORE;
            }
            return result;
        }

        let mut best: Option<(usize, i32)> = None;
        for (i, col) in columns.iter().enumerate() {
            if !candidate(col) {
                continue;
            }
            let score = score_column(window, standard_type, col);
            if score > 0 {
                debug!("{window}/{standard_type} vs {col:?}: {score}");
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        if let Some((i, score)) = best {
            result.confidence_score = score;
            if score >= self.threshold {
                result.matched_column = Some(columns[i].clone());
                result.column_index = Some(i);
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Bindings for a whole spec set
// ---------------------------------------------------------------------------

/// A specification bound to a concrete column position.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub spec: Specification,
    pub column_index: usize,
    pub column_name: String,
    pub score: i32,
}

/// Column bindings for every spec of a registry against one header.
///
/// Matching depends only on the header, so one evaluation run computes
/// this once and shares it across rows.
#[derive(Debug, Clone, Default)]
pub struct ColumnBindings {
    pub bound: Vec<Binding>,
    pub unmatched: Vec<ColumnMatch>,
}

impl ColumnBindings {
    pub fn resolve(specs: &SpecRegistry, columns: &[String], config: &AnalysisConfig) -> Self {
        let matcher = ColumnMatcher::new(config.match_threshold);
        let mut bindings = ColumnBindings::default();

        // Coordinate columns are judged by region containment only.
        let chroma: Vec<&str> = WindowType::ALL
            .iter()
            .flat_map(|w| {
                let c = config.chromaticity(*w);
                [c.u_column.as_str(), c.v_column.as_str()]
            })
            .collect();

        for spec in specs.iter() {
            let m = matcher.match_column_where(
                spec.window_type,
                &spec.standard_type,
                columns,
                |c| !chroma.contains(&c),
            );
            let (Some(idx), Some(name)) = (m.column_index, m.matched_column.clone()) else {
                debug!(
                    "no column for {}/{} (best score {})",
                    spec.window_type, spec.standard_type, m.confidence_score
                );
                bindings.unmatched.push(m);
                continue;
            };
            bindings.bound.push(Binding {
                spec: spec.clone(),
                column_index: idx,
                column_name: name,
                score: m.confidence_score,
            });
        }

        info!(
            "bound {} of {} specs to columns",
            bindings.bound.len(),
            specs.len()
        );
        bindings
    }

    /// Bindings of one window, in spec order.
    pub fn for_window(&self, window: WindowType) -> impl Iterator<Item = &Binding> {
        self.bound
            .iter()
            .filter(move |b| b.spec.window_type == window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    #[test]
    fn normalize_strips_units_and_punctuation() {
        assert_eq!(normalize_text("W_L (cd/m2)"), "w l");
        assert_eq!(normalize_text("  Max.  Deviation [%] "), "max deviation");
        assert_eq!(normalize_text("M_u'"), "m u");
    }

    // -----------------------------------------------------------------------
    // Scoring table
    // -----------------------------------------------------------------------

    #[test]
    fn exact_match_scores_prefix_substring_and_exact() {
        assert_eq!(score_column(WindowType::White, "L", "W_L (cd/m2)"), 5 + 10 + 20);
    }

    #[test]
    fn keyword_hits_with_boundary_bonus() {
        // "delta y" hits on a boundary; "dy" does not occur
        assert_eq!(score_column(WindowType::White, "dY", "W_Delta Y"), 5 + 5 + 3);
        // "l" occurs in "lightness", so the keywords are never consulted
        assert_eq!(score_column(WindowType::White, "L", "W_Lightness"), 5 + 10);
        // "max deviation" on boundary (8) + "max dev" inside a word (5)
        assert_eq!(
            score_column(WindowType::White, "MaxDev", "W_Max Deviation"),
            5 + 8 + 5
        );
    }

    #[test]
    fn short_types_hit_as_plain_substrings() {
        assert_eq!(score_column(WindowType::White, "L", "W_Flicker"), 5 + 10);
        assert_eq!(score_column(WindowType::White, "L", "W_Cell Temp"), 5 + 10);
        assert_eq!(score_column(WindowType::White, "U", "W_U"), 35);
    }

    #[test]
    fn other_window_column_scores_without_prefix() {
        // "M_L" normalizes to "m l": no White prefix, "l" occurs
        assert_eq!(score_column(WindowType::White, "L", "M_L"), 10);
        assert_eq!(score_column(WindowType::Mixed, "L", "M_L"), 35);
    }

    #[test]
    fn short_type_binds_to_substring_column_when_nothing_better() {
        let columns = cols(&["SN", "W_Flicker"]);
        let m = ColumnMatcher::default().match_column(WindowType::White, "L", &columns);
        assert_eq!(m.matched_column.as_deref(), Some("W_Flicker"));
        assert_eq!(m.confidence_score, 15);
    }

    #[test]
    fn unprefixed_column_can_still_bind() {
        assert_eq!(score_column(WindowType::White, "dY", "dY"), 10 + 20);
    }

    // -----------------------------------------------------------------------
    // Matcher
    // -----------------------------------------------------------------------

    #[test]
    fn picks_highest_score() {
        let columns = cols(&["SN", "W_Lightness", "W_L", "M_L"]);
        let m = ColumnMatcher::default().match_column(WindowType::White, "L", &columns);
        assert_eq!(m.matched_column.as_deref(), Some("W_L"));
        assert_eq!(m.column_index, Some(2));
        assert_eq!(m.confidence_score, 35);
    }

    #[test]
    fn ties_keep_first_column() {
        let columns = cols(&["W_Uniformity A", "W_Uniformity B"]);
        let m = ColumnMatcher::default().match_column(WindowType::White, "U", &columns);
        assert_eq!(m.column_index, Some(0));
    }

    #[test]
    fn below_threshold_is_unmatched() {
        let columns = cols(&["W_Temperature", "Station"]);
        let m = ColumnMatcher::default().match_column(WindowType::White, "L", &columns);
        assert!(!m.is_matched());
        assert_eq!(m.confidence_score, 5);
    }

    #[test]
    fn metric_binds_directly_by_window_pattern() {
        let columns = cols(&["W_M21_Flicker", "M_M2_Flicker", "W_M2_Flicker", "Metric2"]);
        let white = ColumnMatcher::default().match_column(WindowType::White, "Metric2", &columns);
        assert_eq!(white.matched_column.as_deref(), Some("W_M2_Flicker"));
        let mixed = ColumnMatcher::default().match_column(WindowType::Mixed, "Metric2", &columns);
        assert_eq!(mixed.matched_column.as_deref(), Some("M_M2_Flicker"));
        let none = ColumnMatcher::default().match_column(WindowType::White, "Metric7", &columns);
        assert!(!none.is_matched());
    }

    #[test]
    fn bindings_never_use_chromaticity_columns() {
        let mut specs = SpecRegistry::new();
        specs.set(WindowType::White, "L", 100.0, 200.0).unwrap();
        specs.set(WindowType::White, "u'", 0.1, 0.2).unwrap();
        specs.set(WindowType::Mixed, "CCT", 5000.0, 7000.0).unwrap();
        let columns = cols(&["W_L", "W_u'", "W_v'"]);
        let b = ColumnBindings::resolve(&specs, &columns, &AnalysisConfig::default());
        assert_eq!(b.bound.len(), 1);
        assert_eq!(b.bound[0].column_name, "W_L");
        assert_eq!(b.unmatched.len(), 2);
        assert_eq!(b.for_window(WindowType::Mixed).count(), 0);
    }

    #[test]
    fn uniformity_skips_u_coordinate_column() {
        let mut specs = SpecRegistry::new();
        specs.set(WindowType::White, "U", 80.0, 100.0).unwrap();
        let columns = cols(&["W_u'", "W_v'", "W_U"]);
        let b = ColumnBindings::resolve(&specs, &columns, &AnalysisConfig::default());
        assert_eq!(b.bound[0].column_index, 2);
    }
}
