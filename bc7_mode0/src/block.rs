//! Block assembly and disassembly (component A) and the outer shape
//! search (component D, spec section 4.10) that ties the rest of the
//! codec together.

use crate::bitstream::{BitReader, BitWriter};
use crate::distortion;
use crate::endpoints::{self, FloatEndpoints};
use crate::error::{DecodeError, EncodeError};
use crate::palette::{self, RegionEndpoints};
use crate::shapes::{self, NUM_REGIONS, NUM_SHAPES};
use crate::tile::Tile;

/// Number of shortlisted shapes carried from the rough pass into the full
/// per-shape refine (spec section 4.10: `NITEMS = NSHAPES / 4`).
const NITEMS: usize = NUM_SHAPES / 4;

const MODE_BITS: u32 = 1;
const SHAPE_BITS: u32 = 4;
const ENDPOINT_BITS: u32 = 4;
const INDEX_BITS: u32 = 3;

/// One fully decoded Mode 0 block: the chosen shape and each region's
/// compressed endpoints and per-pixel palette indices.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub shape: u8,
    pub endpoints: [RegionEndpoints; NUM_REGIONS],
    pub indices: [u8; Tile::PIXEL_COUNT],
}

/// Assign a palette index to every tile pixel under `shape` given each
/// region's compressed endpoints (spec section 4.4), returning the
/// indices in raster order and the total error.
fn assign_indices(
    tile: &Tile,
    shape: usize,
    endpts: &[RegionEndpoints; NUM_REGIONS],
) -> ([u8; Tile::PIXEL_COUNT], f64) {
    let palettes: [[[f32; 4]; palette::NUM_PALETTE_ENTRIES]; NUM_REGIONS] =
        std::array::from_fn(|r| distortion::to_f32_palette(&palette::palette_for_region(&endpts[r])));

    let mut indices = [0u8; Tile::PIXEL_COUNT];
    let mut toterr = 0.0;
    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(shape, pos);
        let (idx, err) = distortion::best_index(tile.pixel(pos), &palettes[region]);
        indices[pos] = idx;
        toterr += err;
    }
    (indices, toterr)
}

/// Normalize a single region's anchor bit (spec section 4.5): if the
/// anchor position's palette index has its high bit set, swap the
/// region's endpoints and complement every index in the region. This
/// makes the anchor index always `< NUM_PALETTE_ENTRIES / 2`, so its top
/// bit never needs to be stored. Idempotent: running it twice in a row
/// leaves the block unchanged.
fn normalize_region(
    shape: usize,
    region: usize,
    endpts: &mut RegionEndpoints,
    indices: &mut [u8; Tile::PIXEL_COUNT],
) {
    let anchor_pos = shapes::anchor(shape, region);
    let anchor_idx = indices[anchor_pos];
    if anchor_idx < (palette::NUM_PALETTE_ENTRIES / 2) as u8 {
        return;
    }

    endpts.swap();
    for pos in 0..Tile::PIXEL_COUNT {
        if shapes::region(shape, pos) == region {
            indices[pos] = (palette::NUM_PALETTE_ENTRIES - 1) as u8 - indices[pos];
        }
    }
}

fn normalize_anchors(
    shape: usize,
    endpts: &mut [RegionEndpoints; NUM_REGIONS],
    indices: &mut [u8; Tile::PIXEL_COUNT],
) {
    for region in 0..NUM_REGIONS {
        normalize_region(shape, region, &mut endpts[region], indices);
    }
}

/// Quantize, assign, normalize, optimize, and reassign for one region,
/// returning its final compressed endpoints, the total region error, and
/// the raw (pre-anchor-normalization) rough seed for reference.
fn refine_region(
    tile: &Tile,
    shape: usize,
    region: usize,
    seed: FloatEndpoints,
) -> (RegionEndpoints, f64) {
    let pixels: Vec<[f32; 4]> = (0..Tile::PIXEL_COUNT)
        .filter(|&pos| shapes::region(shape, pos) == region)
        .map(|pos| tile.pixel(pos))
        .collect();

    let quantized = endpoints::quantize_endpoints(&seed);
    let palette = distortion::to_f32_palette(&palette::palette_for_region(&quantized));
    let (_, quantized_err) = distortion::map_colors(&pixels, &palette, f64::MAX)
        .expect("map_colors with f64::MAX bound never aborts early");

    endpoints::optimize_region(&pixels, quantized_err, &quantized)
}

/// Run the full per-shape refine (spec section 4.10): quantize each
/// region's rough seed, optimize it, assign final indices over the
/// whole tile, and normalize anchors.
fn refine_shape(tile: &Tile, shape: usize) -> DecodedBlock {
    let seeds = endpoints::rough_seed(tile, shape);

    let mut region_endpts: [RegionEndpoints; NUM_REGIONS] = std::array::from_fn(|r| {
        let (endpts, _) = refine_region(tile, shape, r, seeds[r]);
        endpts
    });

    let (mut indices, _) = assign_indices(tile, shape, &region_endpts);
    normalize_anchors(shape, &mut region_endpts, &mut indices);

    DecodedBlock {
        shape: shape as u8,
        endpoints: region_endpts,
        indices,
    }
}

fn block_error(tile: &Tile, block: &DecodedBlock) -> f64 {
    let palettes: [[[f32; 4]; palette::NUM_PALETTE_ENTRIES]; NUM_REGIONS] =
        std::array::from_fn(|r| distortion::to_f32_palette(&palette::palette_for_region(&block.endpoints[r])));

    let mut toterr = 0.0;
    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(block.shape as usize, pos);
        let entry = palettes[region][block.indices[pos] as usize];
        toterr += distortion::metric(tile.pixel(pos), entry);
    }
    toterr
}

/// Search all 16 shapes, shortlist the `NITEMS` cheapest by rough error,
/// fully refine each, and return the best-scoring result.
pub fn search_best_block(tile: &Tile) -> Result<DecodedBlock, EncodeError> {
    let mut ranked: Vec<(usize, f64)> = (0..NUM_SHAPES)
        .map(|shape| {
            let seeds = endpoints::rough_seed(tile, shape);
            (shape, endpoints::rough_error(tile, shape, &seeds))
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut best: Option<(DecodedBlock, f64)> = None;
    for &(shape, _) in ranked.iter().take(NITEMS) {
        let candidate = refine_shape(tile, shape);
        let err = block_error(tile, &candidate);

        let is_better = match &best {
            Some((_, best_err)) => err < *best_err,
            None => true,
        };
        if is_better {
            let exact = err == 0.0;
            best = Some((candidate, err));
            if exact {
                break;
            }
        }
    }

    best.map(|(block, _)| block).ok_or(EncodeError::NoCandidateShape)
}

/// Pack a decoded block into its 128-bit on-wire form (spec section 6).
pub fn write_block(block: &DecodedBlock) -> [u8; 16] {
    let mut w = BitWriter::new();
    w.write(1, MODE_BITS);
    w.write(block.shape as u32, SHAPE_BITS);

    for component in 0..3 {
        for region in 0..NUM_REGIONS {
            w.write(block.endpoints[region].a[component] as u32, ENDPOINT_BITS);
            w.write(block.endpoints[region].b[component] as u32, ENDPOINT_BITS);
        }
    }

    for region in 0..NUM_REGIONS {
        w.write(block.endpoints[region].a_lsb as u32, 1);
        w.write(block.endpoints[region].b_lsb as u32, 1);
    }

    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(block.shape as usize, pos);
        let is_anchor = shapes::anchor(block.shape as usize, region) == pos;
        let bits = if is_anchor { INDEX_BITS - 1 } else { INDEX_BITS };
        w.write(block.indices[pos] as u32, bits);
    }

    w.finish()
}

/// Unpack a 128-bit block (spec section 6), validating the mode bit and
/// shape index.
pub fn read_block(bytes: &[u8; 16]) -> Result<DecodedBlock, DecodeError> {
    let mut r = BitReader::new(bytes);

    if r.read(MODE_BITS) != 1 {
        return Err(DecodeError::WrongMode);
    }
    let shape = r.read(SHAPE_BITS) as u8;
    if shape as usize >= NUM_SHAPES {
        return Err(DecodeError::InvalidShapeIndex(shape));
    }

    let mut endpoints: [RegionEndpoints; NUM_REGIONS] = [RegionEndpoints::default(); NUM_REGIONS];
    for component in 0..3 {
        for region in 0..NUM_REGIONS {
            endpoints[region].a[component] = r.read(ENDPOINT_BITS) as u8;
            endpoints[region].b[component] = r.read(ENDPOINT_BITS) as u8;
        }
    }

    for region in 0..NUM_REGIONS {
        endpoints[region].a_lsb = r.read(1) != 0;
        endpoints[region].b_lsb = r.read(1) != 0;
    }

    let mut indices = [0u8; Tile::PIXEL_COUNT];
    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(shape as usize, pos);
        let is_anchor = shapes::anchor(shape as usize, region) == pos;
        let bits = if is_anchor { INDEX_BITS - 1 } else { INDEX_BITS };
        indices[pos] = r.read(bits) as u8;
    }

    Ok(DecodedBlock { shape, endpoints, indices })
}

/// Reconstruct a tile's pixels from a decoded block.
pub fn decode_tile(block: &DecodedBlock) -> Tile {
    let palettes: [[[u8; 4]; palette::NUM_PALETTE_ENTRIES]; NUM_REGIONS] =
        std::array::from_fn(|r| palette::palette_for_region(&block.endpoints[r]));

    let mut pixels = [[0f32; 4]; Tile::PIXEL_COUNT];
    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(block.shape as usize, pos);
        let entry = palettes[region][block.indices[pos] as usize];
        for c in 0..4 {
            pixels[pos][c] = entry[c] as f32;
        }
    }
    Tile::new(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_anchors_is_idempotent() {
        let tile = Tile::new(std::array::from_fn(|i| {
            let v = (i * 16) as f32;
            [v, 255.0 - v, v / 2.0, 255.0]
        }));
        let block = refine_shape(&tile, 5);

        let mut endpts = block.endpoints;
        let mut indices = block.indices;
        normalize_anchors(5, &mut endpts, &mut indices);

        assert_eq!(endpts, block.endpoints);
        assert_eq!(indices, block.indices);
    }

    #[test]
    fn anchor_indices_never_use_high_bit() {
        let tile = Tile::new(std::array::from_fn(|i| {
            let v = (i * 16) as f32;
            [v, 255.0 - v, v / 2.0, 255.0]
        }));
        let block = refine_shape(&tile, 2);
        for region in 0..NUM_REGIONS {
            let pos = shapes::anchor(2, region);
            assert!(block.indices[pos] < (palette::NUM_PALETTE_ENTRIES / 2) as u8);
        }
    }

    #[test]
    fn block_round_trips_through_wire_format() {
        let tile = Tile::new(std::array::from_fn(|i| {
            let v = (i * 16) as f32;
            [v, 255.0 - v, v / 2.0, 255.0]
        }));
        let block = search_best_block(&tile).unwrap();
        let bytes = write_block(&block);
        let decoded = read_block(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn wrong_mode_bit_is_rejected() {
        let bytes = [0u8; 16];
        assert_eq!(read_block(&bytes), Err(DecodeError::WrongMode));
    }

    #[test]
    fn solid_color_tile_encodes_near_losslessly() {
        let tile = Tile::new([[128.0, 64.0, 200.0, 255.0]; 16]);
        let block = search_best_block(&tile).unwrap();
        let decoded = decode_tile(&block);
        for pos in 0..Tile::PIXEL_COUNT {
            let px = decoded.pixel(pos);
            for c in 0..3 {
                assert!((px[c] - tile.pixel(pos)[c]).abs() <= 4.0);
            }
        }
    }
}
