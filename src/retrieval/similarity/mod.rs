
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Norms below this are clamped so zero vectors score 0 instead of NaN
pub const NORM_EPSILON: f32 = 1e-10;

/// Cosine similarity of `query` against every row of `matrix`
#[inline]
pub fn cosine_scores(matrix: ArrayView2<'_, f32>, query: ArrayView1<'_, f32>) -> Array1<f32> {
    let query_norm = query.dot(&query).sqrt().max(NORM_EPSILON);
    let dots = matrix.dot(&query);

    let row_norms = matrix.map_axis(ndarray::Axis(1), |row| {
        row.dot(&row).sqrt().max(NORM_EPSILON)
    });

    dots / (row_norms * query_norm)
}

/// Indices and scores of the best `top_k` rows, best first.
///
/// Only strictly positive scores are kept. The sort is stable, so equal
/// scores keep row order.
#[inline]
pub fn rank_top_k(scores: &Array1<f32>, top_k: usize) -> Vec<(usize, f32)> {
    let mut ranked = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| *score > 0.0)
        .collect::<Vec<_>>();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(top_k);
    ranked
}
