//! Per-tag similarity functions
//!
//! Pure functions used by [`crate::SimilarityScorer`]. All return a score in
//! [0.0, 1.0] where 1.0 means identical.

use ahash::AHashSet;
use chrono::NaiveDate;

/// Token-set Jaccard similarity over lowercase whitespace tokens.
///
/// Both empty is a perfect match; exactly one empty is a total mismatch.
pub fn jaccard_tokens(a: &str, b: &str) -> f32 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);

    match (tokens_a.is_empty(), tokens_b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.len() + tokens_b.len() - intersection;
    intersection as f32 / union as f32
}

fn token_set(s: &str) -> AHashSet<String> {
    s.split_whitespace().map(str::to_lowercase).collect()
}

/// Clip a cosine similarity into [0, 1]; anti-correlated vectors count as
/// total disagreement.
#[inline]
pub fn clip_cosine(cosine: f32) -> f32 {
    if cosine.is_nan() {
        0.0
    } else {
        cosine.clamp(0.0, 1.0)
    }
}

/// Linear decay: `1 - min(1, distance / scale)`.
#[inline]
pub fn linear_decay(distance: f64, scale: f64) -> f32 {
    if distance <= 0.0 {
        return 1.0;
    }
    if scale <= 0.0 {
        return 0.0;
    }
    (1.0 - (distance / scale).min(1.0)) as f32
}

/// Numeric similarity with linear decay to 0 at `scale`.
///
/// Without an explicit scale the larger magnitude of the two values is used,
/// floored at `epsilon`.
pub fn number_similarity(a: f64, b: f64, scale: Option<f64>, epsilon: f64) -> f32 {
    if a == b {
        return 1.0;
    }
    let scale = scale.unwrap_or_else(|| a.abs().max(b.abs()).max(epsilon));
    linear_decay((a - b).abs(), scale)
}

/// Date similarity with linear decay to 0 at `scale_days`.
pub fn date_similarity(a: NaiveDate, b: NaiveDate, scale_days: f64) -> f32 {
    let days = (a - b).num_days().unsigned_abs() as f64;
    linear_decay(days, scale_days)
}

/// Greedy best-match score between two lists.
///
/// Repeatedly takes the highest-scoring unmatched `(a[i], b[j])` pair
/// (ties broken by lowest `i`, then lowest `j`), then divides the sum of the
/// matched scores by the longer length. Unmatched elements contribute 0.
pub fn greedy_match<T, F, E>(a: &[T], b: &[T], mut score: F) -> Result<f32, E>
where
    F: FnMut(&T, &T) -> Result<f32, E>,
{
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ok(1.0),
        (true, false) | (false, true) => return Ok(0.0),
        _ => {}
    }

    let mut pairs = Vec::with_capacity(a.len() * b.len());
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            pairs.push((score(x, y)?, i, j));
        }
    }
    pairs.sort_by(|p, q| {
        q.0.total_cmp(&p.0)
            .then(p.1.cmp(&q.1))
            .then(p.2.cmp(&q.2))
    });

    let mut used_a = vec![false; a.len()];
    let mut used_b = vec![false; b.len()];
    let pairs_needed = a.len().min(b.len());
    let mut matched = 0;
    let mut total = 0.0f32;

    for (s, i, j) in pairs {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        total += s;
        matched += 1;
        if matched == pairs_needed {
            break;
        }
    }

    Ok((total / a.len().max(b.len()) as f32).clamp(0.0, 1.0))
}
