use ndarray::Array2;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Coordinate matrices shaped `(rows.len(), cols.len())`, like `meshgrid(cols, rows)`.
    pub fn meshgrid(cols: &[f64], rows: &[f64]) -> (Array2<f64>, Array2<f64>) {
        let shape = (rows.len(), cols.len());
        let col_matrix = Array2::from_shape_fn(shape, |(_, c)| cols[c]);
        let row_matrix = Array2::from_shape_fn(shape, |(r, _)| rows[r]);
        (col_matrix, row_matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshgrid_repeats_axes_along_the_other_dimension() {
        let (x, z) = MatrixHelper::meshgrid(&[1.0, 2.0, 3.0], &[10.0, 20.0]);
        assert_eq!(x.dim(), (2, 3));
        assert_eq!(x[[1, 2]], 3.0);
        assert_eq!(z[[1, 2]], 20.0);
        assert_eq!(z[[0, 1]], 10.0);
    }
}
