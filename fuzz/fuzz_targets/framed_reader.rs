#![no_main]

use libfuzzer_sys::fuzz_target;
use ringbuf::HeapRb;
use spa::{Error, FramedReader};

// Arbitrary bytes in the ring must never make the reader panic or deliver
// more than the caller's buffer holds.
fuzz_target!(|data: &[u8]| {
    let (mut producer, consumer) = HeapRb::<u8>::new(1024).split();
    producer.push_slice(data);
    let mut reader = FramedReader::new(consumer);
    let mut scratch = [0u8; 64];
    loop {
        match reader.read_msg(&mut scratch) {
            Ok(Some(len)) => assert!(len <= scratch.len()),
            Ok(None) => break,
            Err(Error::OutOfRange { .. }) => {
                reader.discard_pending();
            }
            Err(err) => {
                assert!(err.is_fatal());
                break;
            }
        }
    }
});
