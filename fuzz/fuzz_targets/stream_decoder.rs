#![no_main]

use libfuzzer_sys::fuzz_target;
use posestream_wire::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size so split points vary
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut decoder = FrameDecoder::new();
    for piece in rest.chunks(chunk) {
        decoder.extend(piece);
        loop {
            match decoder.next_frame() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
