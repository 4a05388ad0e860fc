#![no_main]

use bc7_mode0::Tile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|tile: Tile| {
    if let Ok(block) = bc7_mode0::encode_block(&tile) {
        // A block we just produced must always decode as mode 0.
        let _ = bc7_mode0::decode_block(&block).expect("freshly encoded block failed to decode");
    }
});
