//! The endpoint search (component D): SVD-seeded rough endpoints, local
//! logarithmic perturbation, bounded exhaustive refinement, and the
//! 4-LSB-configuration optimizer that drives them.

use crate::distortion::{self, map_colors as map_colors_f32};
use crate::palette::{self, RegionEndpoints};
use crate::shapes::{self, NUM_REGIONS};
use crate::tile::Tile;

/// Compressed-channel precision: 4 bits per channel, per spec section 3.
const CHANNEL_PREC: i32 = 4;
const CHANNEL_RANGE: i32 = 1 << CHANNEL_PREC;

/// Unquantized float endpoints for one region, RGB only (alpha is always
/// forced to 255 for Mode 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatEndpoints {
    pub a: [f32; 3],
    pub b: [f32; 3],
}

fn clamp_channel(v: f32) -> f32 {
    v.clamp(0.0, 255.0)
}

fn mean_of(colors: &[[f32; 3]]) -> [f32; 3] {
    let n = colors.len() as f32;
    let mut sum = [0f32; 3];
    for c in colors {
        for i in 0..3 {
            sum[i] += c[i];
        }
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// The principal direction of a centered point cloud, found as the
/// dominant eigenvector of the 3x3 covariance matrix via a fixed number
/// of power-iteration steps (see SPEC_FULL.md section 4.11 -- equivalent
/// to the right-singular vector of largest singular value spec section
/// 4.6 asks for, without factoring the full n x 3 matrix). All arithmetic
/// is single precision, per spec section 5.
fn principal_direction(centered: &[[f32; 3]]) -> [f32; 3] {
    let mut cov = [[0f32; 3]; 3];
    for v in centered {
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += v[i] * v[j];
            }
        }
    }

    let mut axis = 0usize;
    for i in 1..3 {
        if cov[i][i] > cov[axis][axis] {
            axis = i;
        }
    }
    let mut vec = [0f32; 3];
    vec[axis] = 1.0;

    for _ in 0..12 {
        let next = [
            cov[0][0] * vec[0] + cov[0][1] * vec[1] + cov[0][2] * vec[2],
            cov[1][0] * vec[0] + cov[1][1] * vec[1] + cov[1][2] * vec[2],
            cov[2][0] * vec[0] + cov[2][1] * vec[1] + cov[2][2] * vec[2],
        ];
        let norm = (next[0] * next[0] + next[1] * next[1] + next[2] * next[2]).sqrt();
        if norm < 1e-12 {
            // zero-variance region: any direction maps to zero spread, so
            // min/max projections below will both land on the mean.
            return vec;
        }
        vec = [next[0] / norm, next[1] / norm, next[2] / norm];
    }
    vec
}

/// The rough per-region seed endpoints for `shape` (spec section 4.6),
/// computed from the tile directly (no quantization yet).
pub fn rough_seed(tile: &Tile, shape: usize) -> [FloatEndpoints; NUM_REGIONS] {
    let mut out = [FloatEndpoints { a: [0.0; 3], b: [0.0; 3] }; NUM_REGIONS];

    for region in 0..NUM_REGIONS {
        let colors: Vec<[f32; 3]> = (0..Tile::PIXEL_COUNT)
            .filter(|&pos| shapes::region(shape, pos) == region)
            .map(|pos| {
                let px = tile.pixel(pos);
                [px[0], px[1], px[2]]
            })
            .collect();

        let mut endpts = match colors.len() {
            0 => FloatEndpoints { a: [0.0; 3], b: [0.0; 3] },
            1 => FloatEndpoints { a: colors[0], b: colors[0] },
            2 => FloatEndpoints { a: colors[0], b: colors[1] },
            _ => {
                let mean = mean_of(&colors);
                let centered: Vec<[f32; 3]> = colors.iter().map(|&c| sub(c, mean)).collect();
                let direction = principal_direction(&centered);

                let mut min_p = f32::MAX;
                let mut max_p = f32::MIN;
                for c in &centered {
                    let p = dot(*c, direction);
                    min_p = min_p.min(p);
                    max_p = max_p.max(p);
                }

                FloatEndpoints {
                    a: add(mean, scale(direction, min_p)),
                    b: add(mean, scale(direction, max_p)),
                }
            }
        };

        for c in 0..3 {
            endpts.a[c] = clamp_channel(endpts.a[c]);
            endpts.b[c] = clamp_channel(endpts.b[c]);
        }
        out[region] = endpts;
    }

    out
}

fn unquantized_palette(a: [f32; 3], b: [f32; 3]) -> [[f32; 4]; palette::NUM_PALETTE_ENTRIES] {
    let mut out = [[0f32; 4]; palette::NUM_PALETTE_ENTRIES];
    for (i, entry) in out.iter_mut().enumerate() {
        let w = i as f32 / (palette::NUM_PALETTE_ENTRIES - 1) as f32;
        for c in 0..3 {
            entry[c] = a[c] + (b[c] - a[c]) * w;
        }
        entry[3] = 255.0;
    }
    out
}

/// Total reconstruction error for `shape` using the unquantized rough
/// seed endpoints (i.e. before any bit-depth quantization). Includes the
/// tile's real alpha values in the metric even though the palette's
/// alpha is forced to 255, per spec section 4.6.
pub fn rough_error(tile: &Tile, shape: usize, endpts: &[FloatEndpoints; NUM_REGIONS]) -> f64 {
    let palettes: [[[f32; 4]; palette::NUM_PALETTE_ENTRIES]; NUM_REGIONS] =
        std::array::from_fn(|r| unquantized_palette(endpts[r].a, endpts[r].b));

    let mut toterr = 0.0;
    for pos in 0..Tile::PIXEL_COUNT {
        let region = shapes::region(shape, pos);
        let (_, err) = distortion::best_index(tile.pixel(pos), &palettes[region]);
        toterr += err;
    }
    toterr
}

/// Quantize float endpoints down to the compressed on-wire form (spec
/// section 4.3): round-to-nearest into 5-bit space, then split into
/// 4-bit + lsb via the majority rule.
pub fn quantize_endpoints(endpts: &FloatEndpoints) -> RegionEndpoints {
    let a5 = [
        palette::quantize_uncompressed(endpts.a[0]),
        palette::quantize_uncompressed(endpts.a[1]),
        palette::quantize_uncompressed(endpts.a[2]),
    ];
    let b5 = [
        palette::quantize_uncompressed(endpts.b[0]),
        palette::quantize_uncompressed(endpts.b[1]),
        palette::quantize_uncompressed(endpts.b[2]),
    ];
    let (a, a_lsb) = palette::compress_channels(a5);
    let (b, b_lsb) = palette::compress_channels(b5);
    RegionEndpoints { a, b, a_lsb, b_lsb }
}

/// Assign palette indices and error for `pixels` under `endpts`,
/// generating the palette from the compressed endpoints.
fn map_colors(
    pixels: &[[f32; 4]],
    endpts: &RegionEndpoints,
    current_err: f64,
) -> Option<(Vec<u8>, f64)> {
    let palette = distortion::to_f32_palette(&palette::palette_for_region(endpts));
    map_colors_f32(pixels, &palette, current_err)
}

/// The logarithmic single-channel, single-endpoint local search (spec
/// section 4.7): halve the step from `2^(prec-1)` down to 1, and at each
/// step size keep retrying both directions from the latest best point
/// until neither improves, before moving to the next smaller step.
fn perturb_one(
    pixels: &[[f32; 4]],
    endpts: &RegionEndpoints,
    channel: usize,
    perturb_b: bool,
    old_err: f64,
) -> (RegionEndpoints, f64, Option<Vec<u8>>) {
    let mut cur = *endpts;
    let mut min_err = old_err;
    let mut result_indices = None;

    let mut step = 1i32 << (CHANNEL_PREC - 1);
    while step > 0 {
        loop {
            let mut improved = false;
            let mut best_temp = cur;
            let mut best_err = min_err;
            let mut best_indices = None;

            for sign in [-1i32, 1i32] {
                let mut temp = cur;
                let current_value = if perturb_b { temp.b[channel] } else { temp.a[channel] } as i32;
                let candidate = current_value + sign * step;
                if candidate < 0 || candidate >= CHANNEL_RANGE {
                    continue;
                }
                if perturb_b {
                    temp.b[channel] = candidate as u8;
                } else {
                    temp.a[channel] = candidate as u8;
                }

                if let Some((idx, err)) = map_colors(pixels, &temp, best_err) {
                    if err < best_err {
                        improved = true;
                        best_err = err;
                        best_temp = temp;
                        best_indices = Some(idx);
                    }
                }
            }

            if improved {
                cur = best_temp;
                min_err = best_err;
                result_indices = best_indices;
            } else {
                break;
            }
        }
        step >>= 1;
    }

    (cur, min_err, result_indices)
}

/// The bounded exhaustive 2-D grid search over one channel's `(A, B)`
/// pair (spec section 4.8). Window half-width is keyed to the current
/// error, enlarged to a minimum of 3, and ordering (`A <= B` or
/// `A >= B`) present on entry is preserved. The `b < bhigh` / `a <= ahigh`
/// asymmetry between the two ordering branches is intentional -- see
/// DESIGN.md.
fn exhaustive(
    pixels: &[[f32; 4]],
    endpts: &RegionEndpoints,
    channel: usize,
    orig_err: f64,
) -> Option<(f64, RegionEndpoints, Vec<u8>)> {
    if orig_err == 0.0 {
        return None;
    }

    let thr_scale = pixels.len() as f64 / Tile::PIXEL_COUNT as f64;
    let mut delta = 0i32;
    if orig_err > 5000.0 * thr_scale {
        delta = CHANNEL_RANGE / 2;
    } else if orig_err > 1000.0 * thr_scale {
        delta = CHANNEL_RANGE / 4;
    } else if orig_err > 200.0 * thr_scale {
        delta = CHANNEL_RANGE / 8;
    } else if orig_err > 40.0 * thr_scale {
        delta = CHANNEL_RANGE / 16;
    }
    let delta = delta.max(3);

    let a0 = endpts.a[channel] as i32;
    let b0 = endpts.b[channel] as i32;
    let alow = (a0 - delta).max(0);
    let ahigh = (a0 + delta).min(CHANNEL_RANGE - 1);
    let blow = (b0 - delta).max(0);
    let bhigh = (b0 + delta).min(CHANNEL_RANGE - 1);

    let mut best_err = orig_err;
    let mut best_a = a0;
    let mut best_b = b0;
    let mut best_indices: Option<Vec<u8>> = None;

    let try_pair = |a: i32, b: i32, best_err: &mut f64, best_a: &mut i32, best_b: &mut i32, best_indices: &mut Option<Vec<u8>>| {
        let mut temp = *endpts;
        temp.a[channel] = a as u8;
        temp.b[channel] = b as u8;
        if let Some((idx, err)) = map_colors(pixels, &temp, *best_err) {
            if err < *best_err {
                *best_err = err;
                *best_a = a;
                *best_b = b;
                *best_indices = Some(idx);
            }
        }
    };

    if a0 <= b0 {
        for a in alow..=ahigh {
            for b in a.max(blow)..bhigh {
                try_pair(a, b, &mut best_err, &mut best_a, &mut best_b, &mut best_indices);
            }
        }
    } else {
        for b in blow..bhigh {
            for a in b.max(alow)..=ahigh {
                try_pair(a, b, &mut best_err, &mut best_a, &mut best_b, &mut best_indices);
            }
        }
    }

    if best_err < orig_err {
        let mut new_endpts = *endpts;
        new_endpts.a[channel] = best_a as u8;
        new_endpts.b[channel] = best_b as u8;
        Some((best_err, new_endpts, best_indices.unwrap()))
    } else {
        None
    }
}

/// The per-channel optimization loop (spec section 4.9 steps 2-3):
/// alternate A/B perturbation per channel with a restart-on-index-change
/// rule, then one bounded exhaustive pass per channel with the same rule.
fn optimize_one(pixels: &[[f32; 4]], orig_err: f64, orig_endpts: &RegionEndpoints) -> (f64, RegionEndpoints) {
    let mut opt_err = orig_err;
    let mut opt_endpts = *orig_endpts;

    let mut ch = 0usize;
    while ch < 3 {
        let (new_a, err0, idx0) = perturb_one(pixels, &opt_endpts, ch, false, opt_err);
        let (new_b, err1, idx1) = perturb_one(pixels, &opt_endpts, ch, true, opt_err);

        let (mut perturb_b, baseline_indices) = if err0 < err1 {
            if err0 >= opt_err {
                ch += 1;
                continue;
            }
            opt_endpts.a[ch] = new_a.a[ch];
            opt_err = err0;
            (true, idx0.expect("perturb_one reported improvement without indices"))
        } else {
            if err1 >= opt_err {
                ch += 1;
                continue;
            }
            opt_endpts.b[ch] = new_b.b[ch];
            opt_err = err1;
            (false, idx1.expect("perturb_one reported improvement without indices"))
        };

        let mut latest_indices = baseline_indices.clone();
        loop {
            let (new_endpt, err, idx) = perturb_one(pixels, &opt_endpts, ch, perturb_b, opt_err);
            if err >= opt_err {
                break;
            }
            latest_indices = idx.expect("perturb_one reported improvement without indices");
            if perturb_b {
                opt_endpts.b[ch] = new_endpt.b[ch];
            } else {
                opt_endpts.a[ch] = new_endpt.a[ch];
            }
            opt_err = err;
            perturb_b = !perturb_b;
        }

        if latest_indices != baseline_indices {
            ch = 0;
            continue;
        }
        ch += 1;
    }

    // Bounded exhaustive pass, same restart-once rule.
    let mut first = true;
    let mut baseline_indices = Vec::new();
    let mut ch = 0usize;
    while ch < 3 {
        if let Some((new_err, new_endpts, idx)) = exhaustive(pixels, &opt_endpts, ch, opt_err) {
            opt_endpts = new_endpts;
            opt_err = new_err;
            if first {
                baseline_indices = idx;
                first = false;
            } else if idx != baseline_indices {
                ch = 0;
                first = true;
                continue;
            }
        }
        ch += 1;
    }

    (opt_err, opt_endpts)
}

/// The full per-region optimizer (spec section 4.9): try all four
/// `(a_lsb, b_lsb)` configurations, optimize each, and keep the best.
pub fn optimize_region(
    pixels: &[[f32; 4]],
    orig_err: f64,
    orig_endpts: &RegionEndpoints,
) -> (f64, RegionEndpoints) {
    let mut best_err = orig_err;
    let mut best_endpts = *orig_endpts;

    for a_lsb in [false, true] {
        for b_lsb in [false, true] {
            let mut temp_in = *orig_endpts;
            temp_in.a_lsb = a_lsb;
            temp_in.b_lsb = b_lsb;

            let (_, temp_in_err) = map_colors(pixels, &temp_in, f64::MAX)
                .expect("map_colors with f64::MAX bound never aborts early");

            let (temp_out_err, temp_out) = optimize_one(pixels, temp_in_err, &temp_in);

            if temp_out_err < best_err {
                best_err = temp_out_err;
                best_endpts = temp_out;
            }
        }
    }

    (best_err, best_endpts)
}

/// Run the full endpoint optimizer over every region of `shape`, given
/// each region's post-quantization endpoints and error.
pub fn optimize_endpoints(
    tile: &Tile,
    shape: usize,
    orig_err: &[f64; NUM_REGIONS],
    orig_endpts: &[RegionEndpoints; NUM_REGIONS],
) -> ([f64; NUM_REGIONS], [RegionEndpoints; NUM_REGIONS]) {
    let mut opt_err = *orig_err;
    let mut opt_endpts = *orig_endpts;

    for region in 0..NUM_REGIONS {
        let pixels: Vec<[f32; 4]> = (0..Tile::PIXEL_COUNT)
            .filter(|&pos| shapes::region(shape, pos) == region)
            .map(|pos| tile.pixel(pos))
            .collect();

        let (err, endpts) = optimize_region(&pixels, orig_err[region], &orig_endpts[region]);
        opt_err[region] = err;
        opt_endpts[region] = endpts;
    }

    (opt_err, opt_endpts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimizer_never_increases_error() {
        let tile = Tile::new([[10.0, 200.0, 30.0, 255.0]; 16]);
        let shape = 0;
        let rough = rough_seed(&tile, shape);
        let orig: [RegionEndpoints; NUM_REGIONS] = std::array::from_fn(|r| quantize_endpoints(&rough[r]));
        let pixels_per_region: Vec<Vec<[f32; 4]>> = (0..NUM_REGIONS)
            .map(|region| {
                (0..Tile::PIXEL_COUNT)
                    .filter(|&pos| shapes::region(shape, pos) == region)
                    .map(|pos| tile.pixel(pos))
                    .collect()
            })
            .collect();
        let orig_err: [f64; NUM_REGIONS] = std::array::from_fn(|r| {
            map_colors(&pixels_per_region[r], &orig[r], f64::MAX).unwrap().1
        });

        let (opt_err, _) = optimize_endpoints(&tile, shape, &orig_err, &orig);
        for r in 0..NUM_REGIONS {
            assert!(opt_err[r] <= orig_err[r] + 1e-9);
        }
    }

    #[test]
    fn zero_variance_region_has_equal_endpoints() {
        let tile = Tile::new([[42.0, 42.0, 42.0, 255.0]; 16]);
        let seed = rough_seed(&tile, 0);
        for region in seed {
            assert_eq!(region.a, region.b);
        }
    }
}
