//! SUBSET rearranger (C6): compute ranks are partitioned into disjoint
//! groups, each served by exactly one I/O task.
//!
//! Reference: spec.md §4.5. `group_comm` is the sub-communicator
//! containing one I/O task and the compute ranks it alone serves —
//! every SUBSET exchange is local to that group, never the full union;
//! `scount`/`rcount` are sized to `group_comm`, not the IOSystem's
//! union communicator, and callers must run the data exchange over the
//! same `group_comm` or `swapm` will reject the size mismatch.
//!
//! Unlike BOX, a SUBSET I/O task has no planner-assigned tile: its
//! footprint is the contiguous flat span from the lowest to the
//! highest global index its group's compute ranks claim. Gaps inside
//! that span that no compute rank claims become `fillregion` entries,
//! exactly as a BOX tile's uncovered positions do — a hole-bearing
//! SUBSET map therefore ends up writing the same fill value into the
//! same file bytes a BOX map would.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::error::PioError;
use pio_core::iodesc::{FillMetadata, RearrangePlan};
use pio_core::region::{map_to_regions, Region};

fn prefix_sum_i32(counts: &[i32]) -> Vec<i32> {
    let mut out = vec![0i32; counts.len()];
    for i in 1..counts.len() {
        out[i] = out[i - 1] + counts[i - 1];
    }
    out
}

/// Pure span/fill computation the I/O rank performs once it has every
/// contributing compute rank's actual global-index values — what the
/// `all_to_all_varcount` exchange in [`build_group_plan`] hands back as
/// `recv_indices`, in receive order. Split out so the hole/fillregion
/// math is unit-testable without a live communicator.
///
/// Returns `(rindex, fill, regions)`: `rindex[i]` is the flat offset of
/// `recv_indices[i]` within the span `regions` partitions in order, so
/// a caller scattering the arrived data needs no further lookup.
fn plan_io_side(gdims: &[usize], recv_indices: &[i64]) -> (Vec<usize>, FillMetadata, Vec<Region>) {
    if recv_indices.is_empty() {
        return (Vec::new(), FillMetadata::default(), Vec::new());
    }

    let lo = *recv_indices.iter().min().unwrap();
    let hi = *recv_indices.iter().max().unwrap();

    let mut present: Vec<i64> = recv_indices.to_vec();
    present.sort_unstable();
    present.dedup();
    let present_set: std::collections::HashSet<i64> = present.iter().copied().collect();

    let span: Vec<i64> = (lo..=hi).collect();
    let uncovered: Vec<i64> = span.iter().copied().filter(|g| !present_set.contains(g)).collect();

    let mut fill = FillMetadata::default();
    if !uncovered.is_empty() {
        fill.needsfill = true;
        fill.holegridsize = uncovered.len();
        fill.fillregions = map_to_regions(gdims, &uncovered);
    }

    let regions = map_to_regions(gdims, &span);
    let rindex: Vec<usize> = recv_indices.iter().map(|&g| (g - lo) as usize).collect();

    (rindex, fill, regions)
}

/// Build the full plan for one SUBSET group. Every rank — including
/// the I/O rank itself, which may also contribute compute-map data —
/// sends its non-hole elements to `io_rank_in_group`; `scount`/`sindex`
/// come back populated on every rank so the caller's `swapm` over
/// `group_comm` has a real send side. `rindex`/`fill`/`regions` are
/// only meaningful on the I/O rank; other ranks get them empty/default.
pub fn build_group_plan(
    group_comm: &SimpleCommunicator,
    io_rank_in_group: i32,
    gdims: &[usize],
    compute_map: &[i64],
) -> Result<(RearrangePlan, FillMetadata, Vec<Region>), PioError> {
    let size = group_comm.size() as usize;
    let io_idx = io_rank_in_group as usize;
    if io_idx >= size {
        return Err(PioError::InvalidArgument);
    }

    let sindex: Vec<usize> = (0..compute_map.len()).filter(|&i| compute_map[i] != 0).collect();
    let mut scount = vec![0usize; size];
    scount[io_idx] = sindex.len();

    let scount32: Vec<i32> = scount.iter().map(|&c| c as i32).collect();
    let mut rcount32 = vec![0i32; size];
    group_comm.all_to_all_into(&scount32, &mut rcount32);
    let rcount: Vec<usize> = rcount32.iter().map(|&c| c as usize).collect();

    // Sind exchange: ship the actual 1-based global indices (not the
    // data itself) so the I/O rank can compute rindex/fillregions
    // locally with no further round trip.
    let sendbuf: Vec<i64> = sindex.iter().map(|&pos| compute_map[pos]).collect();
    let sdispls = prefix_sum_i32(&scount32);
    let rdispls = prefix_sum_i32(&rcount32);
    let total_recv: i32 = rcount32.iter().sum();
    let mut recv_indices = vec![0i64; total_recv as usize];
    {
        let send_part = mpi::datatype::Partition::new(&sendbuf, scount32.clone(), sdispls.clone());
        let mut recv_part = mpi::datatype::PartitionMut::new(&mut recv_indices[..], rcount32.clone(), rdispls.clone());
        group_comm.all_to_all_varcount_into(&send_part, &mut recv_part);
    }

    let mut plan = RearrangePlan::default();
    plan.scount = scount;
    plan.sindex = sindex;
    plan.rcount = rcount.clone();
    plan.rfrom = (0..size as i32).filter(|&p| rcount[p as usize] > 0).collect();

    if group_comm.rank() != io_rank_in_group {
        return Ok((plan, FillMetadata::default(), Vec::new()));
    }

    let (rindex, fill, regions) = plan_io_side(gdims, &recv_indices);
    plan.rindex = rindex;
    Ok((plan, fill, regions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pio_core::region::Region as R;

    #[test]
    fn non_contiguous_indices_split_into_two_regions() {
        let gdims = [8usize];
        let present = vec![1i64, 2, 3, 6, 7];
        let regions: Vec<R> = map_to_regions(&gdims, &present);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].len() + regions[1].len(), present.len());
    }

    #[test]
    fn plan_io_side_fills_internal_gap() {
        // Group's union of claimed indices is {1,2,3,6,7}: the I/O
        // task's span is the full [1,7] range, with {4,5} as a hole.
        let gdims = [8usize];
        let recv_indices = vec![6i64, 1, 2, 3, 7];
        let (rindex, fill, regions) = plan_io_side(&gdims, &recv_indices);

        assert!(fill.needsfill);
        assert_eq!(fill.holegridsize, 2);
        let total: usize = regions.iter().map(Region::len).sum();
        assert_eq!(total, 7, "span covers flat indices 1..=7 inclusive");

        // rindex follows recv_indices' own order, offset from lo=1.
        assert_eq!(rindex, vec![5, 0, 1, 2, 6]);
    }

    #[test]
    fn plan_io_side_no_gap_needs_no_fill() {
        let gdims = [8usize];
        let recv_indices = vec![3i64, 1, 2, 4];
        let (_rindex, fill, regions) = plan_io_side(&gdims, &recv_indices);
        assert!(!fill.needsfill);
        assert_eq!(fill.fillregions.len(), 0);
        let total: usize = regions.iter().map(Region::len).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn plan_io_side_empty_recv_is_empty_plan() {
        let (rindex, fill, regions) = plan_io_side(&[8], &[]);
        assert!(rindex.is_empty());
        assert!(!fill.needsfill);
        assert!(regions.is_empty());
    }
}
