use core::ops::Index;

/// Store a dense matrix in a column-major way.
///
/// Every column is a contiguous slice, so a scan over one attribute never
/// touches the other ones.
#[derive(Debug, Clone)]
pub struct ColumnMajorMatrix<A> {
    /// Number of rows in the matrix
    n_rows: usize,
    /// Number of columns in the matrix
    n_cols: usize,
    /// Values used by the algorithm. Format is column first
    values: Vec<A>,
}

impl<A: Copy> ColumnMajorMatrix<A> {
    /// Transpose row-major data. All the rows must have the same length, the caller checks it.
    pub fn from_rows(rows: &[Vec<A>]) -> Self {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |row| row.len());
        let mut values: Vec<A> = Vec::with_capacity(n_rows * n_cols);
        for col in 0..n_cols {
            for row in rows {
                values.push(row[col]);
            }
        }
        assert_eq!(n_rows * n_cols, values.len());
        Self {
            n_rows,
            n_cols,
            values,
        }
    }
}

impl<A> ColumnMajorMatrix<A> {
    pub fn column(&self, col: usize) -> &[A] {
        let start = col * self.n_rows;
        &self.values.as_slice()[start..start + self.n_rows]
    }

    pub fn columns(&self) -> impl Iterator<Item = &[A]> {
        // chunks() refuses a size of 0
        self.values.chunks(self.n_rows.max(1)).take(self.n_cols)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }
}

impl<A> Index<(usize, usize)> for ColumnMajorMatrix<A> {
    type Output = A;
    fn index(&self, (row, col): (usize, usize)) -> &A {
        // No need to check for col because it will be out of the buffer
        assert!(row < self.n_rows);
        &self.values[row + col * self.n_rows]
    }
}
