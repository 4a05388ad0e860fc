//! The 16 fixed three-region partition shapes used by Mode 0.
//!
//! Mode 0 only ever selects among the first 16 entries of the BC7
//! three-subset partition table (the full table defines 64, one per
//! 6-bit partition field used by other BC7 modes). Each shape assigns
//! every one of the 16 tile positions to a region in `{0, 1, 2}` and
//! names, for regions 1 and 2, the position whose palette index is
//! stored with one fewer bit. Region 0's anchor is always position 0.

pub const NUM_SHAPES: usize = 16;
pub const NUM_REGIONS: usize = 3;

/// `REGIONS[shape][pos]` is the region (0..3) tile position `pos` (= y*4+x)
/// belongs to under `shape`.
pub const REGIONS: [[u8; 16]; NUM_SHAPES] = [
    [0, 0, 1, 1, 0, 0, 1, 1, 0, 2, 2, 1, 2, 2, 2, 2],
    [0, 0, 0, 1, 0, 0, 1, 1, 2, 2, 1, 1, 2, 2, 2, 1],
    [0, 0, 0, 0, 2, 0, 0, 1, 2, 2, 1, 1, 2, 2, 1, 1],
    [0, 2, 2, 2, 0, 0, 2, 2, 0, 0, 1, 1, 0, 1, 1, 1],
    [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 1, 1, 2, 2],
    [0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 2, 2, 0, 0, 2, 2],
    [0, 0, 2, 2, 0, 0, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1],
    [0, 0, 1, 1, 0, 0, 1, 1, 2, 2, 1, 1, 2, 2, 1, 1],
    [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2],
    [0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2],
    [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2],
    [0, 0, 1, 2, 0, 0, 1, 2, 0, 0, 1, 2, 0, 0, 1, 2],
    [0, 1, 1, 2, 0, 1, 1, 2, 0, 1, 1, 2, 0, 1, 1, 2],
    [0, 1, 2, 2, 0, 1, 2, 2, 0, 1, 2, 2, 0, 1, 2, 2],
    [0, 0, 1, 1, 0, 1, 1, 2, 1, 1, 2, 2, 1, 2, 2, 2],
    [0, 0, 1, 1, 2, 0, 0, 1, 2, 2, 0, 0, 2, 2, 2, 0],
];

/// `ANCHORS[shape][region]` is the anchor position for `region` under
/// `shape`. `ANCHORS[_][0]` is always 0 (region 0's anchor never moves).
pub const ANCHORS: [[u8; NUM_REGIONS]; NUM_SHAPES] = [
    [0, 3, 15],
    [0, 3, 8],
    [0, 15, 8],
    [0, 15, 3],
    [0, 8, 15],
    [0, 3, 15],
    [0, 15, 3],
    [0, 15, 8],
    [0, 8, 15],
    [0, 8, 15],
    [0, 6, 15],
    [0, 6, 15],
    [0, 6, 15],
    [0, 5, 15],
    [0, 3, 15],
    [0, 3, 8],
];

/// The region a tile position belongs to under `shape`.
pub fn region(shape: usize, pos: usize) -> usize {
    REGIONS[shape][pos] as usize
}

/// The anchor tile position for `region` under `shape`.
pub fn anchor(shape: usize, region: usize) -> usize {
    ANCHORS[shape][region] as usize
}

/// Number of tile positions assigned to `region` under `shape`.
pub fn region_count(shape: usize, region: usize) -> usize {
    REGIONS[shape].iter().filter(|&&r| r as usize == region).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shape_covers_all_three_regions() {
        for shape in 0..NUM_SHAPES {
            for region in 0..NUM_REGIONS {
                assert!(region_count(shape, region) > 0, "shape {shape} region {region} is empty");
            }
        }
    }

    #[test]
    fn region_zero_anchor_is_position_zero() {
        for shape in 0..NUM_SHAPES {
            assert_eq!(anchor(shape, 0), 0);
            assert_eq!(region(shape, 0), 0);
        }
    }

    #[test]
    fn anchors_belong_to_their_region_and_are_distinct() {
        for shape in 0..NUM_SHAPES {
            let mut seen = Vec::new();
            for r in 0..NUM_REGIONS {
                let pos = anchor(shape, r);
                assert_eq!(region(shape, pos), r, "anchor {pos} for shape {shape} region {r} belongs elsewhere");
                assert!(!seen.contains(&pos), "duplicate anchor position in shape {shape}");
                seen.push(pos);
            }
        }
    }
}
