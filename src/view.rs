use crate::Dataset;
use std::iter::FusedIterator;

/// Subset of the rows of a [`Dataset`], in a given order.
///
/// The view only owns the permutation `order` (indices of rows of the dataset). Slicing a view
/// copies indices, never the rows or the columns.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    data: &'a Dataset,
    order: Vec<usize>,
}

impl<'a> DatasetView<'a> {
    /// View over all the rows of the dataset, in their original order.
    pub fn new(data: &'a Dataset) -> Self {
        DatasetView {
            data,
            order: (0..data.n_rows()).collect(),
        }
    }

    pub fn data(&self) -> &'a Dataset {
        self.data
    }

    /// Indices in the dataset of the rows of the view.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn n_rows(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn n_attributes(&self) -> usize {
        self.data.n_attributes()
    }

    /// Value of `attribute` for the row at position `pos` of the view.
    pub fn value(&self, attribute: usize, pos: usize) -> u32 {
        self.data.column(attribute)[self.order[pos]]
    }

    /// Target of the row at position `pos` of the view.
    pub fn target(&self, pos: usize) -> u32 {
        self.data.target()[self.order[pos]]
    }

    pub fn row(&self, pos: usize) -> &'a [u32] {
        self.data.row(self.order[pos])
    }

    pub fn is_sorted_by(&self, attribute: usize) -> bool {
        let column = self.data.column(attribute);
        self.order
            .windows(2)
            .all(|w| column[w[0]] <= column[w[1]])
    }

    /// Stable sort of the rows by the value of `attribute`.
    ///
    /// Counting sort in O(rows + max value): count every value, accumulate the counts, then
    /// place the rows from the last one so equal values keep their relative order.
    /// Attributes with values above the dataset's counting sort limit use a comparison sort.
    pub fn sort_by(&mut self, attribute: usize) {
        let data = self.data;
        let column = data.column(attribute);
        if !data.use_counting_sort(attribute) {
            // sort_by_key is stable
            self.order.sort_by_key(|&row| column[row]);
            return;
        }

        let order = &self.order;
        let n_counts = data.max_value(attribute) as usize + 1;
        let sorted = data.with_counts(n_counts, |counts| {
            let mut max_val = 0;
            for &row in order {
                let key = column[row] as usize;
                counts[key] += 1;
                max_val = max_val.max(key);
            }
            for i in 1..=max_val {
                counts[i] += counts[i - 1];
            }
            let mut output = vec![0; order.len()];
            for &row in order.iter().rev() {
                let key = column[row] as usize;
                counts[key] -= 1;
                output[counts[key]] = row;
            }
            output
        });
        self.order = sorted;
    }

    /// Most frequent target and its count. On a tie, the label which reached the count first
    /// while scanning the view wins. An empty view returns `(0, 0)`.
    pub fn mode_label(&self) -> (u32, usize) {
        let target = self.data.target();
        let order = &self.order;
        self.data
            .with_counts(self.data.n_label_counts(), |counts| {
                let mut label = 0;
                let mut highest_count = 0;
                for &row in order {
                    let x = target[row];
                    counts[x as usize] += 1;
                    if counts[x as usize] > highest_count {
                        highest_count = counts[x as usize];
                        label = x;
                    }
                }
                (label, highest_count)
            })
    }

    /// End of the run of `value`: position of the first row with a bigger value of `attribute`.
    ///
    /// The view must be sorted by `attribute`.
    pub fn find_next_label(&self, attribute: usize, value: u32) -> usize {
        self.find_next_label_from(attribute, value, 0)
    }

    fn find_next_label_from(&self, attribute: usize, value: u32, start: usize) -> usize {
        let column = self.data.column(attribute);
        start
            + self.order[start..].partition_point(|&row| column[row] <= value)
    }

    /// Iterate over the runs of equal values of `attribute`, as sub-views.
    ///
    /// The view must be sorted by `attribute`. Each run is computed when the iterator
    /// advances; to iterate again, call this method again.
    pub fn split_iterator(&self, attribute: usize) -> SplitIter<'_, 'a> {
        debug_assert!(self.is_sorted_by(attribute));
        SplitIter {
            view: self,
            attribute,
            pos: 0,
        }
    }

    /// New view over the rows at positions `start..end` of this view.
    pub fn copy_from(&self, start: usize, end: usize) -> DatasetView<'a> {
        DatasetView {
            data: self.data,
            order: self.order[start..end].to_vec(),
        }
    }
}

/// One run of a split: the value shared by all its rows and the view over them.
#[derive(Debug, Clone)]
pub struct Split<'a> {
    pub value: u32,
    pub view: DatasetView<'a>,
}

/// Iterator returned by [`DatasetView::split_iterator`].
#[derive(Debug)]
pub struct SplitIter<'v, 'a> {
    view: &'v DatasetView<'a>,
    attribute: usize,
    pos: usize,
}

impl<'v, 'a> Iterator for SplitIter<'v, 'a> {
    type Item = Split<'a>;

    fn next(&mut self) -> Option<Split<'a>> {
        if self.pos >= self.view.n_rows() {
            return None;
        }
        let value = self.view.value(self.attribute, self.pos);
        // Always move forward, even on an unsorted view
        let next = self
            .view
            .find_next_label_from(self.attribute, value, self.pos)
            .max(self.pos + 1);
        let view = self.view.copy_from(self.pos, next);
        self.pos = next;
        Some(Split { value, view })
    }
}

impl<'v, 'a> FusedIterator for SplitIter<'v, 'a> {}
