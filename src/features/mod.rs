//! Feature extraction -- maps raw scalar or string values onto
//! fixed-length numeric feature vectors.
//!
//! Extractors are pure and stateless; the ingest layer decides which
//! one applies to a given input value.

/// Number of positions in every feature vector. Position is meaningful:
/// feature `i` always means the same thing for a given extractor.
pub const FEATURE_COUNT: usize = 5;

/// Ordered, fixed-length numeric summary of one raw value.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Features for a numeric value: the value itself in position 0, all
/// remaining positions zero.
pub fn extract_numeric(value: f64) -> FeatureVector {
    let mut features = [0.0; FEATURE_COUNT];
    features[0] = value;
    features
}

/// Features for a text value:
///   f0 = character length
///   f1 = ASCII letter count
///   f2 = ASCII digit count
///   f3 = space count
///   f4 = everything else
///
/// Each character lands in exactly one of the four category counts, so
/// f1 + f2 + f3 + f4 == f0.
pub fn extract_text(value: &str) -> FeatureVector {
    let mut alphabetic = 0.0;
    let mut digits = 0.0;
    let mut spaces = 0.0;
    let mut other = 0.0;

    let mut length = 0.0;
    for c in value.chars() {
        length += 1.0;
        if c.is_ascii_alphabetic() {
            alphabetic += 1.0;
        } else if c.is_ascii_digit() {
            digits += 1.0;
        } else if c == ' ' {
            spaces += 1.0;
        } else {
            other += 1.0;
        }
    }

    [length, alphabetic, digits, spaces, other]
}
