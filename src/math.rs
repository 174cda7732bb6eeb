use crate::DatasetView;

/// Shannon entropy (in nats) of a group, given the count of every label and the group size.
/// Empty labels are skipped.
pub fn entropy(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.;
    }
    let mut o = 0.;
    for &count in counts {
        if count == 0 {
            continue;
        }
        let p = count as f64 / total as f64;
        o -= p * p.ln();
    }
    o
}

/// Weighted entropy left after splitting the view on `attribute`.
///
/// The view must be sorted by `attribute`. Every run of equal values contributes its entropy,
/// weighted by its share of the rows. The entropy before the split is the same for every
/// attribute, so comparing this value is enough to pick the best split.
pub fn split_entropy(view: &DatasetView, attribute: usize) -> f64 {
    debug_assert!(view.is_sorted_by(attribute));
    let n_rows = view.n_rows();
    if n_rows == 0 {
        return 0.;
    }
    let data = view.data();
    let column = data.column(attribute);
    let target = data.target();
    let order = view.order();

    data.with_counts(data.n_label_counts(), |counts| {
        let weighted = |counts: &[usize], size: usize| {
            size as f64 / n_rows as f64 * entropy(counts, size)
        };

        let mut total_entropy = 0.;
        let mut split_start = 0;
        let mut prev_val = column[order[0]];
        for (pos, &row) in order.iter().enumerate() {
            let val = column[row];
            if val != prev_val {
                total_entropy += weighted(&*counts, pos - split_start);
                for c in counts.iter_mut() {
                    *c = 0;
                }
                split_start = pos;
                prev_val = val;
            }
            counts[target[row] as usize] += 1;
        }
        total_entropy + weighted(&*counts, n_rows - split_start)
    })
}

/// Share of the predictions equal to the target.
pub fn accuracy(target: &[u32], yhat: &[u32]) -> f64 {
    assert_eq!(target.len(), yhat.len());
    if target.is_empty() {
        return 0.;
    }
    let n_ok = target.iter().zip(yhat).filter(|(a, b)| a == b).count();
    n_ok as f64 / target.len() as f64
}
