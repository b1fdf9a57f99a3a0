//! Parallel sample-sort (C7), used to validate that a decomposition's
//! global index map is a permutation.
//!
//! Reference: `parallel_sort.c` (`parallel_sort`, `is_unique`,
//! `run_unique_check`). The pivot-sampling, partition and local-sort
//! steps are pure and unit tested directly; the redistribution step
//! needs a communicator and is covered only by the collective-level
//! darray tests elsewhere in the workspace.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::PioError;

/// Ascending comparator used throughout; kept as a named function so
/// every step of the sort and the uniqueness scan agree on ordering.
fn cmp(a: &i64, b: &i64) -> std::cmp::Ordering {
    a.cmp(b)
}

/// Partition `data` into `nbins` buckets using `pivots` (ascending,
/// `nbins - 1` of them): bucket `i` holds values in `[pivots[i-1],
/// pivots[i])`, with open ends on the first and last bucket.
fn partition(data: &[i64], pivots: &[i64]) -> Vec<Vec<i64>> {
    let nbins = pivots.len() + 1;
    let mut bins: Vec<Vec<i64>> = vec![Vec::new(); nbins];
    for &v in data {
        let bin = pivots.partition_point(|&p| p <= v);
        bins[bin].push(v);
    }
    bins
}

/// True if `data` is sorted and has no adjacent duplicates. Only valid
/// to call on a slice that is already locally sorted.
pub fn is_unique(data: &[i64]) -> bool {
    data.windows(2).all(|w| w[0] < w[1])
}

/// Sample-sort `local` across `comm`, returning this rank's share of
/// the globally sorted sequence. Unstable, and the final distribution
/// across ranks may be unbalanced — the original tolerates this
/// because the caller only needs a global order, not an even split.
pub fn parallel_sort(comm: &SimpleCommunicator, local: &[i64]) -> Result<Vec<i64>, PioError> {
    let size = comm.size() as usize;
    if size == 1 {
        let mut out = local.to_vec();
        out.sort_by(cmp);
        return Ok(out);
    }

    // Step 1: p-1 samples drawn uniformly from the local vector (or
    // zeros if empty, matching the original's degenerate-rank handling).
    let nsamples = size - 1;
    let samples: Vec<i64> = if local.is_empty() {
        vec![0; nsamples]
    } else {
        (0..nsamples)
            .map(|i| local[(i * local.len()) / nsamples.max(1)])
            .collect()
    };

    // Step 2: every rank gathers all samples and sorts identically.
    let mut all_samples = vec![0i64; nsamples * size];
    comm.all_gather_into(&samples, &mut all_samples);
    all_samples.sort_by(cmp);

    // Step 3: pivots at positions i*(p-1), i = 1..p-1.
    let pivots: Vec<i64> = (1..size).map(|i| all_samples[i * nsamples]).collect();

    // Step 4: partition local data into p bins using the shared pivots.
    let bins = partition(local, &pivots);

    // Step 5: all-to-all-v redistribution, bin i to rank i.
    let scounts: Vec<i32> = bins.iter().map(|b| b.len() as i32).collect();
    let mut rcounts = vec![0i32; size];
    comm.all_to_all_into(&scounts, &mut rcounts);

    let sendbuf: Vec<i64> = bins.into_iter().flatten().collect();
    let mut sdispls = vec![0i32; size];
    for i in 1..size {
        sdispls[i] = sdispls[i - 1] + scounts[i - 1];
    }
    let mut rdispls = vec![0i32; size];
    for i in 1..size {
        rdispls[i] = rdispls[i - 1] + rcounts[i - 1];
    }
    let total_recv: i32 = rcounts.iter().sum();
    let mut recvbuf = vec![0i64; total_recv as usize];

    let spart = mpi::datatype::PartitionMut::new(
        &mut recvbuf[..],
        rcounts.clone(),
        rdispls.clone(),
    );
    comm.all_to_all_varcount_into(&mpi::datatype::Partition::new(&sendbuf, scounts, sdispls), &spart);

    // Step 6: local sort of the received bin.
    recvbuf.sort_by(cmp);
    Ok(recvbuf)
}

/// Run [`parallel_sort`] and reduce a global "has duplicates" flag over
/// `comm`, matching `run_unique_check`'s contract: a rank's local
/// duplicate after the sort is enough to fail the whole check.
pub fn run_unique_check(comm: &SimpleCommunicator, local: &[i64]) -> Result<bool, PioError> {
    let sorted = parallel_sort(comm, local)?;
    let local_dup = if is_unique(&sorted) { 0i32 } else { 1i32 };
    let mut global_dup = 0i32;
    comm.all_reduce_into(&local_dup, &mut global_dup, mpi::collective::SystemOperation::max());
    Ok(global_dup != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_unique_detects_adjacent_duplicates() {
        assert!(is_unique(&[1, 2, 3, 4]));
        assert!(!is_unique(&[1, 2, 2, 4]));
        assert!(is_unique(&[] as &[i64]));
        assert!(is_unique(&[1]));
    }

    #[test]
    fn partition_respects_pivots() {
        let data = vec![5, 1, 9, 3, 7, 2, 8];
        let pivots = vec![4, 7];
        let bins = partition(&data, &pivots);
        assert_eq!(bins.len(), 3);
        assert!(bins[0].iter().all(|&v| v < 4));
        assert!(bins[1].iter().all(|&v| v >= 4 && v < 7));
        assert!(bins[2].iter().all(|&v| v >= 7));
        let total: usize = bins.iter().map(Vec::len).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn partition_empty_pivots_is_one_bin() {
        let data = vec![3, 1, 2];
        let bins = partition(&data, &[]);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].len(), 3);
    }
}
