//! # Introduction
//! BC7 is a fixed-rate GPU texture compression format that encodes 4x4
//! pixel tiles into 128-bit blocks. The format defines eight encoding
//! modes that trade off region count, endpoint precision, and alpha
//! support; this crate implements Mode 0 only: three-region partitioning
//! with 4-bit (plus one shared low bit) RGB endpoints and a 3-bit index
//! per pixel. Alpha is not modeled by Mode 0 and is always reconstructed
//! as fully opaque.
//!
//! A conversion pipeline typically looks like RGBA8 tile -> [encode_block]
//! -> 128-bit block -> [decode_block] -> reconstructed RGBA8 tile, with
//! [encode_block_rgba8] and [decode_block_rgba8] provided as convenience
//! wrappers over raw byte buffers for callers that don't want to build a
//! [Tile] themselves.
//!
//! # Limitations
//! Only Mode 0 is implemented; the other seven BC7 modes, and the other
//! BCn formats more broadly, are out of scope. Encoding operates on a
//! single 4x4 tile at a time -- surface-level mipmap or array-layer
//! batching is left to the caller.

mod bitstream;
mod block;
mod distortion;
mod endpoints;
mod palette;
mod shapes;
mod tile;

pub mod error;
use error::{DecodeError, EncodeError};

pub use tile::Tile;

/// Find the best-scoring Mode 0 encoding of `tile` and pack it into its
/// 128-bit on-wire block.
///
/// Internally this ranks all 16 partition shapes by a cheap rough
/// estimate, fully refines the best few, and keeps the lowest-error
/// result. See the crate's design notes for the search strategy.
pub fn encode_block(tile: &Tile) -> Result<[u8; 16], EncodeError> {
    let decoded = block::search_best_block(tile)?;
    Ok(block::write_block(&decoded))
}

/// Decode a 128-bit Mode 0 block back into its reconstructed tile.
///
/// Returns [DecodeError::WrongMode] if the block's mode bit doesn't
/// identify it as Mode 0, or [DecodeError::InvalidShapeIndex] if the
/// shape field names a partition outside the 16 Mode 0 uses (this can
/// only happen for corrupt or non-Mode-0 input, since a well-formed
/// shape field is always 4 bits wide).
pub fn decode_block(bytes: &[u8; 16]) -> Result<Tile, DecodeError> {
    let decoded = block::read_block(bytes)?;
    Ok(block::decode_tile(&decoded))
}

/// Encode 64 bytes of row-major RGBA8 tile data directly to a block.
pub fn encode_block_rgba8(rgba8: &[u8; 64]) -> Result<[u8; 16], EncodeError> {
    encode_block(&Tile::from_rgba8(rgba8))
}

/// Decode a block directly to 64 bytes of row-major RGBA8 tile data.
pub fn decode_block_rgba8(bytes: &[u8; 16]) -> Result<[u8; 64], DecodeError> {
    Ok(decode_block(bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_through_rgba8() {
        let mut rgba8 = [0u8; 64];
        for (i, b) in rgba8.iter_mut().enumerate() {
            *b = ((i * 37) % 256) as u8;
        }
        // force alpha to opaque since mode 0 can't reconstruct it
        for pos in 0..16 {
            rgba8[pos * 4 + 3] = 255;
        }

        let block = encode_block_rgba8(&rgba8).unwrap();
        let decoded = decode_block_rgba8(&block).unwrap();

        for pos in 0..16 {
            for c in 0..3 {
                let original = rgba8[pos * 4 + c] as i32;
                let reconstructed = decoded[pos * 4 + c] as i32;
                assert!(
                    (original - reconstructed).abs() <= 40,
                    "pixel {pos} channel {c}: {original} vs {reconstructed}"
                );
            }
            assert_eq!(decoded[pos * 4 + 3], 255);
        }
    }

    #[test]
    fn decode_rejects_non_mode0_block() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0b0000_0000; // mode bit 0 unset
        assert_eq!(decode_block(&bytes), Err(DecodeError::WrongMode));
    }
}
