//! Decomposition initialization (C4): turn a compute-map into a fully
//! planned [`IoDesc`] by calling the BOX or SUBSET plan builder and
//! merging both halves of the exchange into one [`RearrangePlan`].
//!
//! Reference: spec.md §4.3–§4.5, `pio_darray.c` (`PIOc_InitDecomp`).

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use pio_core::elem_type::ElemType;
use pio_core::error::PioError;
use pio_core::iodesc::IoDesc;
use pio_core::iosystem::{IoSystem, RearrangerKind};
use pio_core::planner::calc_start_and_count;
use pio_core::region::Region;
use pio_rearrange::box_rearr::{compute_side_plan, complete_io_side};
use pio_rearrange::subset_rearr::build_group_plan;

/// Build a BOX-rearranged [`IoDesc`] plus this rank's own tile region
/// (`None` unless this rank is one of the I/O tasks the C3 planner
/// actually assigned a slab to — fewer tiles than I/O tasks can come
/// back when a dimension is too short to split further).
pub fn init_box_decomp(
    iosys: &IoSystem,
    gdims: Vec<usize>,
    elem_type: ElemType,
    compute_map: Vec<i64>,
) -> Result<(IoDesc, Option<Region>), PioError> {
    let tiles = calc_start_and_count(&gdims, iosys.num_iotasks())?;
    let active_io_ranks = &iosys.io_ranks[..tiles.len()];
    let union_size = iosys.union_comm.size() as usize;

    let (compute_plan, _holes) = compute_side_plan(&gdims, &tiles, active_io_ranks, union_size, &compute_map);

    let my_rank = iosys.union_comm.rank();
    let my_tile_idx = active_io_ranks.iter().position(|&r| r == my_rank);
    let my_tile = my_tile_idx.map(|i| &tiles[i]);

    let (io_side, fill, regions) =
        complete_io_side(&iosys.union_comm, &gdims, my_tile, &compute_plan, &compute_map)?;

    let mut plan = compute_plan;
    plan.rcount = io_side.rcount;
    plan.rfrom = io_side.rfrom;
    plan.rindex = io_side.rindex;

    let region = my_tile.map(|t| Region { start: t.start.clone(), count: t.count.clone() });

    let iodesc = IoDesc {
        handle: 0,
        gdims,
        elem_type,
        compute_map,
        rearranger: RearrangerKind::Box,
        plan,
        regions,
        fill,
    };
    Ok((iodesc, region))
}

/// Build a SUBSET-rearranged [`IoDesc`] for one already-formed group.
/// `group_comm` contains exactly the I/O task and the compute ranks it
/// alone serves; building that partition (assigning every compute rank
/// to one serving I/O task and `MPI_Comm_split`-ing accordingly) is the
/// caller's job. Unlike [`init_box_decomp`], the region list here may
/// hold more than one entry (see `pio_rearrange::subset_rearr`'s module
/// docs) — every region in `iodesc.regions` belongs to this I/O task
/// and partitions its packed receive buffer in order.
pub fn init_subset_decomp(
    group_comm: &SimpleCommunicator,
    io_rank_in_group: i32,
    gdims: Vec<usize>,
    elem_type: ElemType,
    compute_map: Vec<i64>,
) -> Result<IoDesc, PioError> {
    let (plan, fill, regions) = build_group_plan(group_comm, io_rank_in_group, &gdims, &compute_map)?;
    let regions = if group_comm.rank() == io_rank_in_group { regions } else { Vec::new() };
    Ok(IoDesc {
        handle: 0,
        gdims,
        elem_type,
        compute_map,
        rearranger: RearrangerKind::Subset,
        plan,
        regions,
        fill,
    })
}
