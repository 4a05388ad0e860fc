#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|bytes: [u8; 16]| {
    let _result = bc7_mode0::decode_block(&bytes);
});
