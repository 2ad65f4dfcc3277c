//! Per-column similarity scores used by the fuzzy matcher.
//!
//! String columns use a normalized similarity in [0, 1] from `rapidfuzz`.
//! Quantity columns use a tolerance band: full credit inside the band,
//! decaying linearly to zero at three times the band.

use rapidfuzz::distance::{indel, jaro_winkler, levenshtein};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    JaroWinkler,
    Levenshtein,
    Indel,
}

impl SimilarityMetric {
    /// Score two already-normalized strings. Two empty strings carry no
    /// evidence and score 0.
    pub fn score(self, a: &str, b: &str) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        let raw = match self {
            Self::JaroWinkler => jaro_winkler::similarity(a.chars(), b.chars()),
            Self::Levenshtein => levenshtein::normalized_similarity(a.chars(), b.chars()),
            Self::Indel => indel::normalized_similarity(a.chars(), b.chars()),
        };
        raw.clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JaroWinkler => write!(f, "jaro_winkler"),
            Self::Levenshtein => write!(f, "levenshtein"),
            Self::Indel => write!(f, "indel"),
        }
    }
}

/// Tolerance-decayed quantity score.
///
/// `tolerance` is a fraction of the order quantity. The relative difference
/// `d = |shipped - ordered| / |ordered|` scores 1 when `d <= t`, 0 when
/// `d >= 3t`, and decays linearly in between.
pub fn quantity_score(shipped: f64, ordered: f64, tolerance: f64) -> f64 {
    if !shipped.is_finite() || !ordered.is_finite() {
        return 0.0;
    }
    let diff = (shipped - ordered).abs();
    if diff == 0.0 {
        return 1.0;
    }
    if ordered == 0.0 || tolerance <= 0.0 {
        return 0.0;
    }
    let d = diff / ordered.abs();
    if d <= tolerance {
        1.0
    } else if d >= 3.0 * tolerance {
        0.0
    } else {
        (3.0 * tolerance - d) / (2.0 * tolerance)
    }
}
