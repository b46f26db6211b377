#![no_main]

use libfuzzer_sys::fuzz_target;
use posestream_wire::{decode_frame, encode_frame};

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = decode_frame(data) {
        // Anything accepted must re-encode to a frame that decodes the same
        let bytes = encode_frame(&frame);
        let again = decode_frame(&bytes).expect("re-encoded frame must decode");
        assert_eq!(again.seq, frame.seq);
        assert_eq!(again.pose.len(), frame.pose.len());
    }
});
