//! Fuzz target: `BatchBuffer::append` + JSON array streaming
//!
//! Splits the input into records on `\n` and appends them to a small
//! buffer.  Asserts that the slot bookkeeping never overruns and that the
//! precomputed Content-Length always equals the streamed body.
//!
//! cargo fuzz run fuzz_batch_buffer

#![no_main]

use hmd_sensor::batch::BatchBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buf = BatchBuffer::new(8, 48);

    for record in data.split(|&b| b == b'\n') {
        let before = buf.len();
        match buf.append(record) {
            Ok(()) => assert_eq!(buf.len(), before + 1),
            Err(_) => assert_eq!(buf.len(), before, "failed append must not change the buffer"),
        }
        assert!(buf.len() <= buf.capacity());
    }

    let mut streamed = 0usize;
    let _ = buf.write_json_array(|chunk| {
        streamed += chunk.len();
        Ok::<(), ()>(())
    });
    assert_eq!(streamed, buf.json_array_len());

    buf.clear();
    assert!(buf.is_empty());
    assert_eq!(buf.json_array_len(), 2);
});
