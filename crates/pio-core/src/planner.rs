//! I/O-side start/count planner (C3): assign each I/O task a contiguous
//! slab of the global array so the union tiles it exactly once.
//!
//! Reference: spec.md §4.3.

use crate::error::PioError;

/// Minimum number of elements an I/O task's slab should hold before the
/// planner prefers splitting a finer dimension instead. A build-time
/// constant in the original; fixed here rather than exposed as a tuning
/// knob since no caller in this library varies it.
pub const MIN_IO_BLOCK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCount {
    pub start: Vec<usize>,
    pub count: Vec<usize>,
}

impl StartCount {
    pub fn volume(&self) -> usize {
        self.count.iter().product()
    }
}

/// Pick the slowest-varying dimension with enough length to split into
/// `n` pieces of at least [`MIN_IO_BLOCK_SIZE`] elements each. Falls
/// back to dimension 0 if no dimension clears the threshold — a tiling
/// must still be produced even for small arrays.
fn choose_split_dim(gdims: &[usize], n: usize) -> usize {
    for d in 0..gdims.len() {
        if gdims[d] < n {
            continue;
        }
        let rest: usize = gdims[d + 1..].iter().product();
        let block_len = gdims[d] / n;
        if block_len * rest.max(1) >= MIN_IO_BLOCK_SIZE {
            return d;
        }
    }
    0
}

/// Split `len` elements into `n` contiguous, as-equal-as-possible
/// groups, distributing the remainder to the first groups so the
/// result is deterministic and fully covers `len`.
fn even_split(len: usize, n: usize) -> Vec<usize> {
    let base = len / n;
    let extra = len % n;
    (0..n)
        .map(|i| base + if i < extra { 1 } else { 0 })
        .filter(|&c| c > 0)
        .collect()
}

/// Recursively tile `gdims` into at most `n` slabs. Always returns a
/// tiling whose slabs partition `gdims` exactly (no gaps, no overlap),
/// though it may return fewer than `n` slabs when `n` exceeds the
/// product of `gdims` or a dimension can't be split further.
fn tile(gdims: &[usize], n: usize) -> Vec<StartCount> {
    if n <= 1 || gdims.is_empty() {
        return vec![StartCount {
            start: vec![0; gdims.len()],
            count: gdims.to_vec(),
        }];
    }

    let d = choose_split_dim(gdims, n);

    if gdims[d] >= n {
        let groups = even_split(gdims[d], n);
        let mut offset = 0usize;
        let mut out = Vec::with_capacity(groups.len());
        for g in groups {
            let mut start = vec![0usize; gdims.len()];
            let mut count = gdims.to_vec();
            start[d] = offset;
            count[d] = g;
            offset += g;
            out.push(StartCount { start, count });
        }
        return out;
    }

    // Dimension d is shorter than n: use every row of it as its own
    // group, and recurse into the remaining dims to split the leftover
    // task budget among each group's sub-shape.
    let groups = gdims[d];
    let sub_n = n.div_ceil(groups);
    let mut rest_dims = gdims.to_vec();
    rest_dims.remove(d);
    let mut out = Vec::new();
    for g in 0..groups {
        for sub in tile(&rest_dims, sub_n) {
            let mut start = vec![0usize; gdims.len()];
            let mut count = vec![0usize; gdims.len()];
            start[d] = g;
            count[d] = 1;
            let mut si = 0;
            for k in 0..gdims.len() {
                if k == d {
                    continue;
                }
                start[k] = sub.start[si];
                count[k] = sub.count[si];
                si += 1;
            }
            out.push(StartCount { start, count });
        }
    }
    out.truncate(n.max(groups));
    out
}

/// `calc_start_and_count`: assign a contiguous slab to each I/O task.
///
/// The outer loop mirrors `PIOc_InitDecomp`'s convergence test: decrement
/// the candidate task count until the returned tiling's total element
/// count equals `Π gdims`, or fail with [`PioError::ConvergenceFailure`]
/// once no task count can produce a valid tiling.
pub fn calc_start_and_count(gdims: &[usize], num_io_tasks: usize) -> Result<Vec<StartCount>, PioError> {
    if gdims.is_empty() || num_io_tasks == 0 {
        return Err(PioError::InvalidArgument);
    }
    let expect: usize = gdims.iter().product();
    let mut n = num_io_tasks;
    loop {
        let tiles = tile(gdims, n);
        let total: usize = tiles.iter().map(StartCount::volume).sum();
        if total == expect && !tiles.is_empty() {
            return Ok(tiles);
        }
        if n <= 1 {
            return Err(PioError::ConvergenceFailure);
        }
        n -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles_full(gdims: &[usize], tiles: &[StartCount]) {
        let expect: usize = gdims.iter().product();
        let total: usize = tiles.iter().map(StartCount::volume).sum();
        assert_eq!(total, expect, "tiling must cover Π gdims exactly");
    }

    #[test]
    fn one_dim_even_split() {
        let tiles = calc_start_and_count(&[16], 4).unwrap();
        assert_eq!(tiles.len(), 4);
        assert_tiles_full(&[16], &tiles);
        for t in &tiles {
            assert_eq!(t.count[0], 4);
        }
    }

    #[test]
    fn one_dim_uneven_split_still_covers() {
        let tiles = calc_start_and_count(&[10], 3).unwrap();
        assert_tiles_full(&[10], &tiles);
        assert!(tiles.len() <= 3);
    }

    #[test]
    fn three_d_four_tasks() {
        let tiles = calc_start_and_count(&[4, 4, 4], 4).unwrap();
        assert_tiles_full(&[4, 4, 4], &tiles);
    }

    #[test]
    fn fewer_tasks_than_requested_when_dim_too_short() {
        // Only 2 rows available but 8 tasks requested: can't exceed 2
        // groups along this single dimension.
        let tiles = calc_start_and_count(&[2], 8).unwrap();
        assert!(tiles.len() <= 8);
        assert_tiles_full(&[2], &tiles);
    }

    #[test]
    fn deterministic_across_calls() {
        let a = calc_start_and_count(&[12, 6], 5).unwrap();
        let b = calc_start_and_count(&[12, 6], 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_shape() {
        assert_eq!(calc_start_and_count(&[], 4), Err(PioError::InvalidArgument));
    }
}
