//! Shape oracle: SAX symbolic discretization of numeric series.
//!
//! The pattern tree and the recycler only see the [`ShapeOracle`] trait; the
//! SAX implementation below is the production oracle. A "level" is the SAX
//! alphabet size: level 1 is the trivial all-`a` word, higher levels refine
//! the shape with more letters.

use std::cmp::Ordering;
use std::sync::OnceLock;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::types::Series;

/// Smallest meaningful SAX alphabet.
pub const MIN_ALPHABET: usize = 2;
/// Largest alphabet the breakpoint table covers.
pub const MAX_ALPHABET: usize = 20;

/// Maps a numeric vector to a symbolic word at a granularity level, plus the
/// inverse reconstruction used only by loss evaluation.
pub trait ShapeOracle {
    /// Length of the symbolic words this oracle produces.
    fn word_length(&self) -> usize;
    /// Encode a series at the given granularity level.
    fn encode(&self, series: &[f64], level: usize) -> String;
    /// Reconstruct a typical PAA vector from a symbolic word.
    fn decode(&self, pattern: &str) -> Series;
}

/// Production SAX oracle: z-normalization, PAA compression, breakpoint
/// encoding.
#[derive(Debug, Clone)]
pub struct SaxOracle {
    word: usize,
}

impl SaxOracle {
    /// Create an oracle producing words of `word` letters.
    pub fn new(word: usize) -> Self {
        Self { word }
    }
}

impl ShapeOracle for SaxOracle {
    fn word_length(&self) -> usize {
        self.word
    }

    fn encode(&self, series: &[f64], level: usize) -> String {
        if level <= 1 {
            return "a".repeat(self.word);
        }
        let normalized = znorm(series, ZNORM_THRESHOLD);
        let compressed = paa(&normalized, self.word);
        series_to_symbols(&compressed, cuts_for_alphabet(level))
    }

    fn decode(&self, pattern: &str) -> Series {
        reconstruct_paa(pattern)
    }
}

/// Variance floor below which a series is only mean-centered.
pub const ZNORM_THRESHOLD: f64 = 0.01;

/// Z-score normalization with population variance. Series whose variance is
/// below `threshold²` are centered but not scaled.
pub fn znorm(series: &[f64], threshold: f64) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if var >= threshold * threshold {
        let sd = var.sqrt();
        series.iter().map(|v| (v - mean) / sd).collect()
    } else {
        series.iter().map(|v| v - mean).collect()
    }
}

/// Piecewise aggregate approximation down to `segments` cells.
///
/// Exact chunk means when the length divides evenly; otherwise each source
/// point contributes to output cells proportionally to its overlap.
pub fn paa(series: &[f64], segments: usize) -> Vec<f64> {
    let n = series.len();
    if n == 0 || segments == 0 {
        return Vec::new();
    }
    if n % segments == 0 {
        let chunk = n / segments;
        return series
            .chunks(chunk)
            .map(|c| c.iter().sum::<f64>() / chunk as f64)
            .collect();
    }
    let mut out = vec![0.0; segments];
    for i in 0..segments * n {
        out[i / n] += series[i / segments];
    }
    for v in &mut out {
        *v /= n as f64;
    }
    out
}

/// Gaussian breakpoints for alphabet sizes 2..=20; index 0 is always -inf.
pub fn cuts_for_alphabet(size: usize) -> &'static [f64] {
    const NI: f64 = f64::NEG_INFINITY;
    static CUTS: [&[f64]; 19] = [
        &[NI, 0.0],
        &[NI, -0.4307273, 0.4307273],
        &[NI, -0.6744898, 0.0, 0.6744898],
        &[NI, -0.841621233572914, -0.2533471031358, 0.2533471031358, 0.841621233572914],
        &[NI, -0.967421566101701, -0.430727299295457, 0.0, 0.430727299295457, 0.967421566101701],
        &[
            NI, -1.06757052387814, -0.565948821932863, -0.180012369792705, 0.180012369792705,
            0.565948821932863, 1.06757052387814,
        ],
        &[
            NI, -1.15034938037601, -0.674489750196082, -0.318639363964375, 0.0,
            0.318639363964375, 0.674489750196082, 1.15034938037601,
        ],
        &[
            NI, -1.22064034884735, -0.764709673786387, -0.430727299295457, -0.139710298881862,
            0.139710298881862, 0.430727299295457, 0.764709673786387, 1.22064034884735,
        ],
        &[
            NI, -1.2815515655446, -0.841621233572914, -0.524400512708041, -0.2533471031358, 0.0,
            0.2533471031358, 0.524400512708041, 0.841621233572914, 1.2815515655446,
        ],
        &[
            NI, -1.33517773611894, -0.908457868537385, -0.604585346583237, -0.348755695517045,
            -0.114185294321428, 0.114185294321428, 0.348755695517045, 0.604585346583237,
            0.908457868537385, 1.33517773611894,
        ],
        &[
            NI, -1.38299412710064, -0.967421566101701, -0.674489750196082, -0.430727299295457,
            -0.210428394247925, 0.0, 0.210428394247925, 0.430727299295457, 0.674489750196082,
            0.967421566101701, 1.38299412710064,
        ],
        &[
            NI, -1.42607687227285, -1.0200762327862, -0.736315917376129, -0.502402223373355,
            -0.293381232121193, -0.0965586152896391, 0.0965586152896394, 0.293381232121194,
            0.502402223373355, 0.73631591737613, 1.0200762327862, 1.42607687227285,
        ],
        &[
            NI, -1.46523379268552, -1.06757052387814, -0.791638607743375, -0.565948821932863,
            -0.36610635680057, -0.180012369792705, 0.0, 0.180012369792705, 0.36610635680057,
            0.565948821932863, 0.791638607743375, 1.06757052387814, 1.46523379268552,
        ],
        &[
            NI, -1.50108594604402, -1.11077161663679, -0.841621233572914, -0.622925723210088,
            -0.430727299295457, -0.2533471031358, -0.0836517339071291, 0.0836517339071291,
            0.2533471031358, 0.430727299295457, 0.622925723210088, 0.841621233572914,
            1.11077161663679, 1.50108594604402,
        ],
        &[
            NI, -1.53412054435255, -1.15034938037601, -0.887146559018876, -0.674489750196082,
            -0.488776411114669, -0.318639363964375, -0.157310684610171, 0.0, 0.157310684610171,
            0.318639363964375, 0.488776411114669, 0.674489750196082, 0.887146559018876,
            1.15034938037601, 1.53412054435255,
        ],
        &[
            NI, -1.5647264713618, -1.18683143275582, -0.928899491647271, -0.721522283982343,
            -0.541395085129088, -0.377391943828554, -0.223007830940367, -0.0737912738082727,
            0.0737912738082727, 0.223007830940367, 0.377391943828554, 0.541395085129088,
            0.721522283982343, 0.928899491647271, 1.18683143275582, 1.5647264713618,
        ],
        &[
            NI, -1.59321881802305, -1.22064034884735, -0.967421566101701, -0.764709673786387,
            -0.589455797849779, -0.430727299295457, -0.282216147062508, -0.139710298881862, 0.0,
            0.139710298881862, 0.282216147062508, 0.430727299295457, 0.589455797849779,
            0.764709673786387, 0.967421566101701, 1.22064034884735, 1.59321881802305,
        ],
        &[
            NI, -1.61985625863827, -1.25211952026522, -1.00314796766253, -0.8045963803603,
            -0.633640000779701, -0.47950565333095, -0.336038140371823, -0.199201324789267,
            -0.0660118123758407, 0.0660118123758406, 0.199201324789267, 0.336038140371823,
            0.47950565333095, 0.633640000779701, 0.8045963803603, 1.00314796766253,
            1.25211952026522, 1.61985625863827,
        ],
        &[
            NI, -1.64485362695147, -1.2815515655446, -1.03643338949379, -0.841621233572914,
            -0.674489750196082, -0.524400512708041, -0.385320466407568, -0.2533471031358,
            -0.125661346855074, 0.0, 0.125661346855074, 0.2533471031358, 0.385320466407568,
            0.524400512708041, 0.674489750196082, 0.841621233572914, 1.03643338949379,
            1.2815515655446, 1.64485362695147,
        ],
    ];
    CUTS[size.clamp(MIN_ALPHABET, MAX_ALPHABET) - MIN_ALPHABET]
}

/// Convert a PAA vector to letters against a breakpoint table.
pub fn series_to_symbols(values: &[f64], cuts: &[f64]) -> String {
    values.iter().map(|&v| index_to_letter(symbol_index(v, cuts))).collect()
}

// Interval lookup mirrors the reference encoder: non-negative values count
// cuts strictly below them, negative values count cuts at or below them.
fn symbol_index(value: f64, cuts: &[f64]) -> usize {
    if value >= 0.0 {
        cuts.iter().skip(1).filter(|&&c| c < value).count()
    } else {
        cuts.iter().skip(1).filter(|&&c| c <= value).count()
    }
}

fn index_to_letter(idx: usize) -> char {
    (b'a' + idx.min(MAX_ALPHABET - 1) as u8) as char
}

fn letter_to_index(letter: char) -> usize {
    (letter as usize).saturating_sub('a' as usize).min(MAX_ALPHABET - 1)
}

const MEDIAN_SAMPLE_SIZE: usize = 1_000_000;
const MEDIAN_SAMPLE_SEED: u64 = 23;

fn sorted_normal_sample() -> &'static [f64] {
    static SAMPLE: OnceLock<Vec<f64>> = OnceLock::new();
    SAMPLE.get_or_init(|| {
        let mut rng = ChaCha8Rng::seed_from_u64(MEDIAN_SAMPLE_SEED);
        let mut pts: Vec<f64> = (0..MEDIAN_SAMPLE_SIZE)
            .map(|_| rng.sample(StandardNormal))
            .collect();
        pts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        pts
    })
}

fn interval_median(points: &[f64], lo: f64, hi: f64) -> f64 {
    let start = points.partition_point(|&x| x < lo);
    let end = points.partition_point(|&x| x < hi);
    if start >= end {
        return 0.0;
    }
    let segment = &points[start..end];
    let mid = segment.len() / 2;
    if segment.len() % 2 == 1 {
        segment[mid]
    } else {
        (segment[mid - 1] + segment[mid]) / 2.0
    }
}

/// Reconstruct an approximate PAA vector from a symbolic word: each letter
/// maps to the empirical median of its breakpoint interval under a standard
/// normal sample. The trivial all-`a` word reconstructs to the zero vector.
pub fn reconstruct_paa(pattern: &str) -> Series {
    let indexes: Vec<usize> = pattern.chars().map(letter_to_index).collect();
    let level = match indexes.iter().max() {
        Some(&m) => m + 1,
        None => return Vec::new(),
    };
    if level <= 1 {
        return vec![0.0; indexes.len()];
    }
    let cuts = cuts_for_alphabet(level);
    let points = sorted_normal_sample();
    indexes
        .iter()
        .map(|&i| {
            let lo = cuts[i];
            let hi = if i < level - 1 { cuts[i + 1] } else { f64::INFINITY };
            interval_median(points, lo, hi)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn znorm_of_ramp() {
        let z = znorm(&[1.0, 2.0, 3.0], ZNORM_THRESHOLD);
        assert!((z[0] + 1.224744871).abs() < 1e-6);
        assert!(z[1].abs() < 1e-12);
        assert!((z[2] - 1.224744871).abs() < 1e-6);
    }

    #[test]
    fn znorm_flat_series_only_centers() {
        let z = znorm(&[5.0, 5.0, 5.0], ZNORM_THRESHOLD);
        assert_eq!(z, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn paa_identity_and_mean() {
        assert_eq!(paa(&[1.0, 2.0, 3.0], 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(paa(&[4.0, 3.0, 8.0, 5.0], 1), vec![5.0]);
        assert_eq!(paa(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.5, 3.5]);
    }

    #[test]
    fn paa_uneven_split() {
        // 3 points into 2 cells: middle point shared between both.
        let out = paa(&[1.0, 2.0, 3.0], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - (1.0 + 1.0 + 2.0) / 3.0).abs() < 1e-12);
        assert!((out[1] - (2.0 + 3.0 + 3.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn symbols_for_three_letter_alphabet() {
        let cuts = cuts_for_alphabet(3);
        assert_eq!(series_to_symbols(&[-1.0, 0.0, 1.0], cuts), "abc");
        assert_eq!(series_to_symbols(&[1.0, -1.0, 1.0], cuts), "cac");
    }

    #[test]
    fn level_one_encoding_is_trivial() {
        let oracle = SaxOracle::new(4);
        assert_eq!(oracle.encode(&[1.0, 5.0, 2.0, 9.0], 1), "aaaa");
    }

    #[test]
    fn encoding_separates_opposite_ramps() {
        let oracle = SaxOracle::new(4);
        let up = oracle.encode(&[1.0, 2.0, 3.0, 4.0], 3);
        let down = oracle.encode(&[4.0, 3.0, 2.0, 1.0], 3);
        assert_ne!(up, down);
    }

    #[test]
    fn reconstruction_is_monotone_in_the_word() {
        let reco = reconstruct_paa("abc");
        assert_eq!(reco.len(), 3);
        assert!(reco[0] < reco[1] && reco[1] < reco[2]);
        // medians of the outer intervals are symmetric for a 3-letter word
        assert!((reco[0] + reco[2]).abs() < 0.05);
    }

    #[test]
    fn trivial_word_reconstructs_to_zero() {
        assert_eq!(reconstruct_paa("aaaa"), vec![0.0; 4]);
    }
}
