// Dense vector kernels used for embedding comparison.
// Two-accumulator scalar loops keep the dependency chain short enough for
// the compiler to vectorize without platform intrinsics.

/// Dot product of two equal-length slices. Mismatched lengths yield 0.0.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot0 = 0.0f32;
    let mut dot1 = 0.0f32;

    let chunks = a.chunks_exact(8);
    let remainder = chunks.remainder();
    let b_chunks = b.chunks_exact(8);

    for (x, y) in chunks.zip(b_chunks) {
        dot0 += x[0] * y[0] + x[1] * y[1] + x[2] * y[2] + x[3] * y[3];
        dot1 += x[4] * y[4] + x[5] * y[5] + x[6] * y[6] + x[7] * y[7];
    }

    let tail = a.len() - remainder.len();
    for i in tail..a.len() {
        dot0 += a[i] * b[i];
    }

    dot0 + dot1
}

/// Euclidean length of a vector
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 when the dimensions differ or either vector has zero length.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > f32::EPSILON {
        let inv = 1.0 / n;
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}
