//! BOX rearranger (C5): I/O tasks each own a rectangular slab of the
//! global array, as laid out by the C3 planner.
//!
//! Reference: spec.md §4.4. The grouping and index math (`plan.rs`) is
//! pure and unit tested; the exchange steps below need a live
//! communicator and are exercised only by the end-to-end darray tests
//! in `pio-io`.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::error::PioError;
use pio_core::iodesc::{FillMetadata, RearrangePlan};
use pio_core::planner::StartCount;
use pio_core::region::{coord_to_lindex, idx_to_dim_list, map_to_regions, Region};

use crate::plan::group_by_owner;

/// Build the compute-side half of a BOX rearrange plan: which I/O task
/// each of this rank's non-hole elements belongs to, grouped for a
/// single contiguous send per peer.
///
/// `tiles[i]` is owned by union rank `io_ranks[i]`; the returned
/// `scount`/`sindex` are re-indexed from per-tile to per-union-rank so
/// they line up with an `all_to_all`/`all_to_all_varcount` over the
/// full union communicator (length `union_size`, zero for every rank
/// that isn't an I/O task).
pub fn compute_side_plan(
    gdims: &[usize],
    tiles: &[StartCount],
    io_ranks: &[i32],
    union_size: usize,
    compute_map: &[i64],
) -> (RearrangePlan, usize) {
    let (tile_scount, tile_sindex, holes) = group_by_owner(gdims, tiles, compute_map);

    let mut offsets = vec![0usize; tiles.len() + 1];
    for i in 0..tiles.len() {
        offsets[i + 1] = offsets[i] + tile_scount[i];
    }

    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_unstable_by_key(|&i| io_ranks[i]);

    let mut scount = vec![0usize; union_size];
    let mut sindex = Vec::with_capacity(tile_sindex.len());
    for &i in &order {
        scount[io_ranks[i] as usize] = tile_scount[i];
        sindex.extend_from_slice(&tile_sindex[offsets[i]..offsets[i + 1]]);
    }

    let mut plan = RearrangePlan::default();
    plan.scount = scount;
    plan.sindex = sindex;
    (plan, holes)
}

/// Complete the I/O-side half of the plan: exchange `scount`/`rcount`
/// over `comm`, then exchange the actual global indices so this I/O
/// task can place each incoming element at the right offset in its own
/// tile (`rindex`), and derive the region list / fill metadata for its
/// tile.
///
/// `comm` must be the union communicator of the IOSystem (every
/// compute and I/O rank participates in the two exchanges below, even
/// ranks sending/receiving nothing).
pub fn complete_io_side(
    comm: &SimpleCommunicator,
    gdims: &[usize],
    my_tile: Option<&StartCount>,
    compute_plan: &RearrangePlan,
    compute_map: &[i64],
) -> Result<(RearrangePlan, FillMetadata, Vec<Region>), PioError> {
    let size = comm.size() as usize;

    let scount32: Vec<i32> = compute_plan.scount.iter().map(|&c| c as i32).collect();
    if scount32.len() != size {
        return Err(PioError::InvalidArgument);
    }
    let mut rcount32 = vec![0i32; size];
    comm.all_to_all_into(&scount32, &mut rcount32);
    let rcount: Vec<usize> = rcount32.iter().map(|&c| c as usize).collect();

    // Sind exchange: ship the actual 1-based global indices (not the
    // data itself) so each I/O task can compute rindex locally.
    let sendbuf: Vec<i64> = compute_plan
        .sindex
        .iter()
        .map(|&pos| compute_map[pos])
        .collect();
    let mut sdispls = vec![0i32; size];
    for i in 1..size {
        sdispls[i] = sdispls[i - 1] + scount32[i - 1];
    }
    let mut rdispls = vec![0i32; size];
    for i in 1..size {
        rdispls[i] = rdispls[i - 1] + rcount32[i - 1];
    }
    let total_recv: i32 = rcount32.iter().sum();
    let mut recv_indices = vec![0i64; total_recv as usize];
    {
        let send_part = mpi::datatype::Partition::new(&sendbuf, scount32.clone(), sdispls.clone());
        let mut recv_part = mpi::datatype::PartitionMut::new(&mut recv_indices[..], rcount32.clone(), rdispls.clone());
        comm.all_to_all_varcount_into(&send_part, &mut recv_part);
    }

    let mut plan = RearrangePlan::default();
    plan.rcount = rcount.clone();
    plan.rfrom = (0..size as i32).filter(|&p| rcount[p as usize] > 0).collect();

    let mut fill = FillMetadata::default();
    let mut regions = Vec::new();

    let Some(tile) = my_tile else {
        return Ok((plan, fill, regions));
    };

    // rindex: local offset within this I/O task's tile for every
    // received element, in the same order the data itself will arrive.
    let tile_dims = tile.count.clone();
    let mut rindex = Vec::with_capacity(recv_indices.len());
    let mut covered = vec![false; tile.volume()];
    for &gidx1 in &recv_indices {
        let gidx = (gidx1 - 1) as usize;
        let gcoord = idx_to_dim_list(gdims, gidx);
        let local_coord: Vec<usize> = (0..gdims.len()).map(|d| gcoord[d] - tile.start[d]).collect();
        let lidx = coord_to_lindex(&tile_dims, &local_coord);
        covered[lidx] = true;
        rindex.push(lidx);
    }
    plan.rindex = rindex;

    // Fill metadata: any local position in this tile no compute rank
    // claimed becomes a fillregion, and needsfill flips on.
    let uncovered: Vec<i64> = (0..tile.volume() as i64).filter(|&i| !covered[i as usize]).map(|i| i + 1).collect();
    if !uncovered.is_empty() {
        fill.needsfill = true;
        fill.holegridsize = uncovered.len();
        fill.fillregions = map_to_regions(&tile_dims, &uncovered);
    }

    regions = vec![Region { start: tile.start.clone(), count: tile.count.clone() }];

    Ok((plan, fill, regions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pio_core::planner::calc_start_and_count;

    #[test]
    fn compute_side_plan_groups_by_tile() {
        let tiles = calc_start_and_count(&[8], 2).unwrap();
        let io_ranks = [2i32, 3]; // union ranks 0,1 are compute; 2,3 are I/O
        let map = vec![1, 2, 5, 6];
        let (plan, holes) = compute_side_plan(&[8], &tiles, &io_ranks, 4, &map);
        assert_eq!(holes, 0);
        assert_eq!(plan.scount.len(), 4);
        assert_eq!(plan.scount[0], 0);
        assert_eq!(plan.scount[1], 0);
        assert_eq!(plan.scount.iter().sum::<usize>(), 4);
    }
}
