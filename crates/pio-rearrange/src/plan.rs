//! Shared plan-construction helpers used by both rearranger backends.

use pio_core::planner::StartCount;
use pio_core::region::idx_to_dim_list;

/// Which I/O task's tile contains the 0-based global linear index
/// `gidx`, by testing bounding-box membership against every tile.
/// Pure and O(ntiles · ndims); fine for the tile counts this library
/// targets (one tile per I/O task, typically tens to low hundreds).
pub fn owning_tile(gdims: &[usize], tiles: &[StartCount], gidx: usize) -> Option<usize> {
    let coord = idx_to_dim_list(gdims, gidx);
    tiles.iter().position(|t| {
        (0..gdims.len()).all(|d| coord[d] >= t.start[d] && coord[d] < t.start[d] + t.count[d])
    })
}

/// Group a compute-map's non-hole entries by owning I/O task, returning
/// `(scount, sindex)` where `sindex` lists compute-buffer positions in
/// destination-group order (all positions for task 0, then task 1, …).
/// Also returns the count of hole (zero) entries.
pub fn group_by_owner(gdims: &[usize], tiles: &[StartCount], compute_map: &[i64]) -> (Vec<usize>, Vec<usize>, usize) {
    let ntiles = tiles.len();
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); ntiles];
    let mut holes = 0usize;
    for (pos, &v) in compute_map.iter().enumerate() {
        if v == 0 {
            holes += 1;
            continue;
        }
        let gidx = (v - 1) as usize;
        if let Some(owner) = owning_tile(gdims, tiles, gidx) {
            buckets[owner].push(pos);
        }
    }
    let scount: Vec<usize> = buckets.iter().map(Vec::len).collect();
    let sindex: Vec<usize> = buckets.into_iter().flatten().collect();
    (scount, sindex, holes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles_1d(gdims: usize, n: usize) -> Vec<StartCount> {
        pio_core::planner::calc_start_and_count(&[gdims], n).unwrap()
    }

    #[test]
    fn owning_tile_matches_contiguous_split() {
        let tiles = tiles_1d(8, 2); // [0,4) and [4,8)
        assert_eq!(owning_tile(&[8], &tiles, 0), Some(0));
        assert_eq!(owning_tile(&[8], &tiles, 3), Some(0));
        assert_eq!(owning_tile(&[8], &tiles, 4), Some(1));
        assert_eq!(owning_tile(&[8], &tiles, 7), Some(1));
    }

    #[test]
    fn group_by_owner_separates_holes() {
        let tiles = tiles_1d(8, 2);
        // 1-based map with a hole at position 1.
        let map = vec![1, 0, 3, 5, 8];
        let (scount, sindex, holes) = group_by_owner(&[8], &tiles, &map);
        assert_eq!(holes, 1);
        assert_eq!(scount.iter().sum::<usize>(), 4);
        assert_eq!(sindex.len(), 4);
    }
}
