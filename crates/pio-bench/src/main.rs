mod cli;

use clap::Parser;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::*;

use pio_backend::flat::FlatFileBackend;
use pio_backend::mock::MockBackend;
use pio_backend::IoBackend;
use pio_core::elem_type::ElemType;
use pio_core::error::{ErrorHandler, PioError};
use pio_core::iosystem::{AsyncMode, IoSystem, RearrangerKind, RearrangeOptions};
use pio_core::planner::calc_start_and_count;
use pio_core::region::coord_to_lindex;
use pio_io::darray;
use pio_io::decomp::init_box_decomp;

use cli::CliArgs;

/// Every union rank also computes, so this demo always runs the
/// IOSystem in synchronous mode: `comp_comm`/`io_comm`/`union_comm`
/// are the same communicator, and `io_ranks` is just the subset of
/// ranks the BOX planner happened to assign a tile to. A true
/// asynchronous split with disjoint compute/I/O groups needs the
/// two-hop intercommunicator protocol `pio-async` implements at the
/// message level (see DESIGN.md); wiring a live disjoint split into
/// this CLI driver is left for a dedicated async example.
fn build_sync_iosystem(world: &SimpleCommunicator, nio: usize) -> IoSystem {
    let size = world.size();
    let nio = nio.min(size as usize).max(1);
    let io_ranks: Vec<i32> = ((size - nio as i32)..size).collect();

    // A constant color puts every rank in the same single group, so
    // each split below hands back a fresh duplicate of `world` rather
    // than a genuine sub-group. `IoSystem` keeps three separate
    // communicator handles for the asynchronous, disjoint-group case;
    // synchronous mode collapses them onto the same rank set.
    let dup = || {
        world
            .split_by_color(Color::with_value(0))
            .expect("splitting on a constant color never excludes a rank")
    };

    IoSystem {
        handle: 0,
        union_comm: dup(),
        comp_comm: dup(),
        io_comm: dup(),
        io_ranks,
        async_mode: AsyncMode::Synchronous,
        default_rearranger: RearrangerKind::Box,
        error_handler: ErrorHandler::Broadcast,
        rearrange_opts: RearrangeOptions::default(),
    }
}

/// This rank's contiguous share of the global array, expressed as a
/// 1-based compute-map (the same convention `pio_core::iodesc` uses).
fn my_compute_map(gdims: &[usize], world: &SimpleCommunicator) -> Vec<i64> {
    let tiles = calc_start_and_count(gdims, world.size() as usize).expect("gdims large enough to tile");
    let my_rank = world.rank() as usize;
    if my_rank >= tiles.len() {
        return Vec::new();
    }
    let tile = &tiles[my_rank];
    let mut map = Vec::with_capacity(tile.volume());
    let mut coord = tile.start.clone();
    loop {
        let gidx = coord_to_lindex(gdims, &coord);
        map.push(gidx as i64 + 1);

        let mut d = coord.len();
        loop {
            if d == 0 {
                return map;
            }
            d -= 1;
            coord[d] += 1;
            if coord[d] < tile.start[d] + tile.count[d] {
                break;
            }
            coord[d] = tile.start[d];
            if d == 0 {
                return map;
            }
        }
    }
}

fn open_backend(args: &CliArgs) -> Box<dyn IoBackend> {
    match args.backend.as_str() {
        "flat" => Box::new(FlatFileBackend::new()),
        other => {
            if other != "mock" {
                eprintln!("unknown backend {other:?}, falling back to mock");
            }
            Box::new(MockBackend::new())
        }
    }
}

fn run(args: CliArgs, world: &SimpleCommunicator) -> Result<(), PioError> {
    let iosys = build_sync_iosystem(world, args.nio);
    let compute_map = my_compute_map(&args.gdims, world);
    let backend = open_backend(&args);

    let (iodesc, _region) = init_box_decomp(&iosys, args.gdims.clone(), ElemType::I32, compute_map.clone())?;
    let opts = iosys.rearrange_opts.comp2io;
    let fillvalue = ElemType::I32.default_fill_bytes();

    if let Some(path) = &args.wdecomp {
        let handle = backend.create(path, true)?;
        let dim = backend.def_dim(handle, "x", Some(args.gdims.iter().product()))?;
        let varid = backend.def_var(handle, &args.variable, ElemType::I32, &[dim])?;

        let local_data: Vec<u8> = compute_map
            .iter()
            .flat_map(|&g| ((g - 1) as i32).to_le_bytes())
            .collect();

        darray::write_darray(world, backend.as_ref(), handle, varid, &iodesc, -1, Some(&fillvalue), &local_data, opts)?;
        backend.sync(handle)?;
        if world.rank() == 0 {
            println!("wrote {} to {path}", args.variable);
        }
    }

    if let Some(path) = &args.rdecomp {
        let handle = backend.open(path, false)?;
        let varid = 0; // single-variable demo file
        let mut local_out = vec![0u8; compute_map.len() * ElemType::I32.size()];
        darray::read_darray(world, backend.as_ref(), handle, varid, &iodesc, -1, Some(&fillvalue), &mut local_out, opts)?;
        if world.rank() == 0 {
            println!("read back {} from {path}", args.variable);
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();
    let universe = mpi::initialize().expect("MPI_Init failed");
    let world = universe.world();

    let args = CliArgs::parse();
    if args.wdecomp.is_none() && args.rdecomp.is_none() {
        if world.rank() == 0 {
            eprintln!("nothing to do: pass --wdecomp and/or --rdecomp");
        }
        return;
    }

    let code = match run(args, &world) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("rank {}: {e}", world.rank());
            e.code()
        }
    };
    world.barrier();
    std::process::exit(code);
}
