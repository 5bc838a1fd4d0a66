//! Combinatorial helpers used by the trajectory selection of the Morris design.
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
use ndarray_stats::QuantileExt;

/// All `r`-combinations of `indices`, in lexicographic order of positions
///
/// ```
/// use expbox_doe::combinatorics::combinations;
///
/// let combs = combinations(&[4, 5, 6], 2);
/// assert_eq!(combs, vec![vec![4, 5], vec![4, 6], vec![5, 6]]);
/// ```
pub fn combinations(indices: &[usize], r: usize) -> Vec<Vec<usize>> {
    let n = indices.len();
    if r > n {
        return vec![];
    }
    let mut res = vec![];
    let mut pos: Vec<usize> = (0..r).collect();
    loop {
        res.push(pos.iter().map(|&p| indices[p]).collect());
        // rightmost position which can still move forward
        let Some(i) = (0..r).rev().find(|&i| pos[i] != i + n - r) else {
            break;
        };
        pos[i] += 1;
        for j in (i + 1)..r {
            pos[j] = pos[j - 1] + 1;
        }
    }
    res
}

/// Indices of the `k` largest values, `exclude` apart, by decreasing value
///
/// Equal values are ranked by increasing index.
pub fn top_k<F: Float>(
    values: &ArrayBase<impl Data<Elem = F>, Ix1>,
    k: usize,
    exclude: usize,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| i != exclude).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Sum of the distances between every pair of `indices`
pub fn sum_pairwise<F: Float>(indices: &[usize], distances: &Array2<F>) -> F {
    combinations(indices, 2)
        .iter()
        .fold(F::zero(), |acc, pair| acc + distances[[pair[0], pair[1]]])
}

/// Candidate set with the largest sum of pairwise distances and that sum
///
/// The first best candidate wins ties. Returns `None` when there is no candidate.
pub fn best_candidate<F: Float>(
    candidates: Vec<Vec<usize>>,
    distances: &Array2<F>,
) -> Option<(Vec<usize>, F)> {
    let scores: Array1<F> = candidates
        .iter()
        .map(|c| sum_pairwise(c, distances))
        .collect();
    let best = scores.argmax().ok()?;
    let score = scores[best];
    candidates.into_iter().nth(best).map(|c| (c, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_combinations() {
        assert_eq!(combinations(&[0, 1, 2, 3], 2).len(), 6);
        assert_eq!(combinations(&[0, 1, 2, 3, 4], 3).len(), 10);
        assert_eq!(combinations(&[0, 1], 0), vec![Vec::<usize>::new()]);
        assert!(combinations(&[0, 1], 3).is_empty());
        assert_eq!(
            combinations(&[7, 8, 9, 10], 3),
            vec![vec![7, 8, 9], vec![7, 8, 10], vec![7, 9, 10], vec![8, 9, 10]]
        );
    }

    #[test]
    fn test_top_k() {
        let v = array![5., 1., 5., 3., 9.];
        assert_eq!(top_k(&v, 3, 4), vec![0, 2, 3]);
        assert_eq!(top_k(&v, 2, 0), vec![4, 2]);
        assert_eq!(top_k(&v, 10, 1).len(), 4);
    }

    #[test]
    fn test_sum_pairwise() {
        let d = array![[0., 1., 2.], [1., 0., 4.], [2., 4., 0.]];
        assert_eq!(sum_pairwise(&[0, 1, 2], &d), 7.);
        assert_eq!(sum_pairwise(&[2, 1], &d), 4.);
        assert_eq!(sum_pairwise(&[1], &d), 0.);
    }

    #[test]
    fn test_best_candidate() {
        let d = array![[0., 1., 2.], [1., 0., 4.], [2., 4., 0.]];
        let (best, score) = best_candidate(vec![vec![0, 1], vec![1, 2], vec![0, 2]], &d).unwrap();
        assert_eq!(best, vec![1, 2]);
        assert_eq!(score, 4.);
        // ties go to the first candidate
        let d = array![[0., 3., 3.], [3., 0., 1.], [3., 1., 0.]];
        let (best, _) = best_candidate(vec![vec![0, 2], vec![0, 1]], &d).unwrap();
        assert_eq!(best, vec![0, 2]);
        assert!(best_candidate::<f64>(vec![], &d).is_none());
    }
}
