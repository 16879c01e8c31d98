#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array.
///
/// The underlying sort is stable, i.e., equal values keep their original index
/// order. The race simulator relies on this for deterministic tie-breaking.
pub fn argsort<T: std::cmp::PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap()),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].partial_cmp(&x[a]).unwrap()),
    }
    indices
}

/// lin_interp returns the linearly interpolated value at x for given discrete data points xp, fp.
/// xp must be increasing. Inspired by numpy.interp.
pub fn lin_interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if xp.len() != fp.len() {
        panic!("Number of items in xp and fp must be equal!")
    }

    if x <= xp[0] {
        return fp[0];
    }

    for i in 1..xp.len() {
        if x <= xp[i] {
            return fp[i - 1] + (x - xp[i - 1]) * (fp[i] - fp[i - 1]) / (xp[i] - xp[i - 1]);
        }
    }

    *fp.last().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argsort_descending_is_stable_on_ties() {
        let x = [2.0, 3.0, 2.0, 1.0];
        assert_eq!(argsort(&x, SortOrder::Descending), vec![1, 0, 2, 3]);
    }

    #[test]
    fn argsort_ascending() {
        let x = [0.3, 0.1, 0.2];
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![1, 2, 0]);
    }

    #[test]
    fn lin_interp_clamps_at_bounds() {
        let xp = [0.0, 1.0];
        let fp = [10.0, 20.0];
        assert_eq!(lin_interp(-1.0, &xp, &fp), 10.0);
        assert_eq!(lin_interp(0.5, &xp, &fp), 15.0);
        assert_eq!(lin_interp(2.0, &xp, &fp), 20.0);
    }
}
