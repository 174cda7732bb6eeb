use crate::{ColumnMajorMatrix, FitError, FitResult, DEFAULT_MAX_COUNTING_SORT_VALUE};
use itertools::Itertools;
use std::cell::RefCell;
use std::num::IntErrorKind;
use tracing::debug;

/// Util for parsing a CSV without headers into a dataset.
///
/// Every value must be a non-negative integer code. The last column is the target.
pub fn parse_csv(data: &str, sep: &str) -> FitResult<Dataset> {
    let mut target: Vec<u32> = Vec::new();
    let mut rows: Vec<Vec<u32>> = Vec::new();
    for (n_line, l) in data.lines().enumerate() {
        let l = l.trim();
        if l.is_empty() {
            continue;
        }
        let mut items = l
            .split(sep)
            .map(|e| parse_code(e.trim(), n_line))
            .collect::<FitResult<Vec<u32>>>()?;
        match items.pop() {
            Some(label) => target.push(label),
            None => return Err(format!("line {} has no target", n_line + 1).into()),
        }
        rows.push(items);
    }
    Dataset::new(rows, target)
}

fn parse_code(item: &str, n_line: usize) -> FitResult<u32> {
    item.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
        IntErrorKind::PosOverflow => {
            FitError::OutOfRange(format!("line {}: {} does not fit a u32", n_line + 1, item))
        }
        _ => FitError::InvalidInput(format!("line {}: {:?} is not a code: {}", n_line + 1, item, e)),
    })
}

/// Store the raw data, read-only once built.
///
/// The rows are kept as given, and transposed once so every attribute can be scanned as a
/// contiguous column. All the views used during the training borrow the same `Dataset`.
///
/// The counting buffer is the only mutable part. It is only reachable through
/// [`Dataset::with_counts`], which hands it zeroed and zeroes it again afterwards.
/// Two views over the same dataset can't use it at the same time: the `RefCell` makes the
/// dataset `!Sync`, and a re-entrant use panics.
#[derive(Debug)]
pub struct Dataset {
    rows: Vec<Vec<u32>>,
    target: Vec<u32>,
    columns: ColumnMajorMatrix<u32>,
    // Largest value of every column
    max_values: Vec<u32>,
    max_target: u32,
    max_counting_sort_value: u32,
    count_scratch: RefCell<Vec<usize>>,
}

impl Dataset {
    /// Build the dataset from row-major attributes and the parallel target labels.
    ///
    /// Fails if there is no row or no attribute, if the lengths of `rows` and `target` differ,
    /// or if the rows don't all have the same number of attributes.
    pub fn new(rows: Vec<Vec<u32>>, target: Vec<u32>) -> FitResult<Self> {
        Self::with_counting_sort_limit(rows, target, DEFAULT_MAX_COUNTING_SORT_VALUE)
    }

    /// Same as [`Dataset::new`], with a custom crossover between counting sort and comparison
    /// sort. Columns with a value bigger than `max_counting_sort_value` are sorted by comparison.
    pub fn with_counting_sort_limit(
        rows: Vec<Vec<u32>>,
        target: Vec<u32>,
        max_counting_sort_value: u32,
    ) -> FitResult<Self> {
        if rows.is_empty() || target.is_empty() {
            return Err("the dataset must have at least one row and one target".into());
        }
        if rows.len() != target.len() {
            return Err(format!(
                "got {} rows but {} targets",
                rows.len(),
                target.len()
            )
            .into());
        }
        let n_cols = rows[0].len();
        if n_cols == 0 {
            return Err("rows must have at least one attribute".into());
        }
        if let Some((n_row, row)) = rows.iter().find_position(|row| row.len() != n_cols) {
            return Err(format!(
                "row {} has {} attributes, expected {}",
                n_row,
                row.len(),
                n_cols
            )
            .into());
        }

        let columns = ColumnMajorMatrix::from_rows(&rows);
        let max_values: Vec<u32> = columns
            .columns()
            .map(|column| column.iter().copied().max().unwrap_or(0))
            .collect();
        let max_target = target.iter().copied().max().unwrap_or(0);

        // Columns sorted by comparison don't need room in the buffer
        let max_counted = max_values
            .iter()
            .copied()
            .filter(|&max| max <= max_counting_sort_value)
            .fold(max_target, u32::max);
        let count_scratch = RefCell::new(vec![0; max_counted as usize + 1]);

        debug!(
            n_rows = rows.len(),
            n_attributes = n_cols,
            max_target,
            scratch_len = max_counted as usize + 1,
            "dataset built"
        );

        Ok(Dataset {
            rows,
            target,
            columns,
            max_values,
            max_target,
            max_counting_sort_value,
            count_scratch,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_attributes(&self) -> usize {
        self.columns.n_cols()
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.rows[row]
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    pub fn column(&self, attribute: usize) -> &[u32] {
        self.columns.column(attribute)
    }

    pub fn target(&self) -> &[u32] {
        &self.target
    }

    /// Largest value observed for this attribute.
    pub fn max_value(&self, attribute: usize) -> u32 {
        self.max_values[attribute]
    }

    /// Whether this attribute is small enough to be sorted with a counting sort.
    pub(crate) fn use_counting_sort(&self, attribute: usize) -> bool {
        self.max_values[attribute] <= self.max_counting_sort_value
    }

    pub fn scratch_len(&self) -> usize {
        self.count_scratch.borrow().len()
    }

    /// Lend the first `len` counters of the shared buffer.
    ///
    /// The counters are all 0 when `f` starts, and are reset to 0 when it returns. The buffer
    /// grows (at least doubling) if it is smaller than `len`.
    pub fn with_counts<R>(&self, len: usize, f: impl FnOnce(&mut [usize]) -> R) -> R {
        let mut counts = self.count_scratch.borrow_mut();
        if counts.len() < len {
            let new_len = len.max(2 * counts.len());
            debug!(old_len = counts.len(), new_len, "growing count scratch buffer");
            counts.resize(new_len, 0);
        }
        let counts = &mut counts[..len];
        let out = f(counts);
        for c in counts.iter_mut() {
            *c = 0;
        }
        out
    }

    /// Length of the counters needed to tally the target labels.
    pub(crate) fn n_label_counts(&self) -> usize {
        // The buffer is at least this big since the construction
        self.max_target as usize + 1
    }
}
