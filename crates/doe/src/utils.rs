use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Data, Ix2, Zip, s};
use ndarray_stats::DeviationExt;
use rayon::prelude::*;

/// Computes the pairwise distances between rows of a 2D-array
/// Distances are ordered as (0, 1), (0, 2), ..., (1, 2), ...
pub fn pdist<F: Float>(x: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>) -> Array1<F> {
    let nrows = x.nrows();
    let pairs: Vec<_> = (0..nrows)
        .flat_map(|i| ((i + 1)..nrows).map(move |j| (i, j)))
        .collect();

    let distances: Vec<_> = pairs
        .par_iter()
        .map(|&(i, j)| F::cast(x.row(i).l2_dist(&x.row(j)).unwrap()))
        .collect();

    Array1::from_vec(distances)
}

/// Computes the pairwise distances between rows of two 2D arrays using parallel processing
/// The resulting array has shape (ma, mb) where ma is the number of rows in xa and mb is the number of rows in xb
pub fn cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
) -> Array2<F> {
    let ma = xa.nrows();
    let mb = xb.nrows();
    let na = xa.ncols();
    let nb = xb.ncols();
    if na != nb {
        panic!("cdist: operands should have same nb of columns. Found {na} and {nb}");
    }

    let mut res = Array2::zeros((ma, mb));
    Zip::from(res.rows_mut())
        .and(xa.rows())
        .par_for_each(|mut row_res, row_a| {
            for (j, row_b) in xb.rows().into_iter().enumerate() {
                row_res[j] = F::cast(row_a.l2_dist(&row_b).unwrap());
            }
        });

    res
}

/// Sum of the Euclidean distances between every row of `xa` and every row of `xb`
pub fn sum_cdist<F: Float>(
    xa: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
    xb: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
) -> F {
    cdist(xa, xb).sum()
}

/// View of the `index`-th block of `size` contiguous rows
pub fn row_block<F>(x: &Array2<F>, index: usize, size: usize) -> ArrayView2<'_, F> {
    x.slice(s![index * size..(index + 1) * size, ..])
}

/// Copies `block` into `x` starting at row `index * block.nrows()`
pub fn insert_row_block<F: Float>(
    x: &mut Array2<F>,
    index: usize,
    block: &ArrayBase<impl Data<Elem = F>, Ix2>,
) {
    let size = block.nrows();
    x.slice_mut(s![index * size..(index + 1) * size, ..])
        .assign(block);
}
