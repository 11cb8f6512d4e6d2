use proptest::prelude::*;
use spa::{framed_channel, Error, LENGTH_PREFIX};

const CAPACITY: usize = 512;

fn payloads() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 1..16)
}

proptest! {
    #[test]
    fn frames_come_out_in_write_order(messages in payloads()) {
        let total: usize = messages.iter().map(|m| m.len() + LENGTH_PREFIX).sum();
        prop_assume!(total <= CAPACITY);

        let (mut writer, mut reader) = framed_channel(CAPACITY);
        for message in &messages {
            prop_assert!(writer.write_with_length(message));
        }

        let mut scratch = [0u8; 64];
        for message in &messages {
            let len = reader.read_msg(&mut scratch).unwrap();
            prop_assert_eq!(len, Some(message.len()));
            prop_assert_eq!(&scratch[..message.len()], message.as_slice());
        }
        prop_assert_eq!(reader.read_msg(&mut scratch).unwrap(), None);
    }

    #[test]
    fn refused_writes_leave_the_ring_untouched(fill in 0usize..60, extra in 1usize..32) {
        let capacity = 64;
        let (mut writer, mut reader) = framed_channel(capacity);
        writer.write_with_length(&vec![1u8; fill]);
        let space = writer.write_space();
        let readable = reader.read_space();

        let too_big = vec![2u8; space.saturating_sub(LENGTH_PREFIX) + extra];
        prop_assert!(!writer.write_with_length(&too_big));
        prop_assert_eq!(writer.write_space(), space);
        prop_assert_eq!(reader.read_space(), readable);
        prop_assert_eq!(writer.dropped(), 1);
    }
}

#[test]
fn interleaved_reads_and_writes_wrap_around() {
    let (mut writer, mut reader) = framed_channel(32);
    let mut scratch = [0u8; 16];
    for round in 0u8..50 {
        let payload = [round; 11];
        assert!(writer.write_with_length(&payload), "round {round}");
        assert_eq!(reader.read_msg(&mut scratch).unwrap(), Some(11));
        assert_eq!(scratch[..11], payload);
    }
}

#[test]
fn reader_can_grow_its_buffer_and_continue() {
    let (mut writer, mut reader) = framed_channel(128);
    writer.write_with_length(&[9u8; 40]);
    writer.write_with_length(b"next");

    let mut small = vec![0u8; 8];
    assert!(matches!(
        reader.read_msg(&mut small),
        Err(Error::OutOfRange {
            accessed: 40,
            size: 8
        })
    ));
    small.resize(64, 0);
    assert_eq!(reader.read_msg(&mut small).unwrap(), Some(40));
    assert_eq!(reader.read_msg(&mut small).unwrap(), Some(4));
    assert_eq!(&small[..4], b"next");
}

#[test]
fn concurrent_writer_and_reader_agree() {
    let (mut writer, mut reader) = framed_channel(256);
    let producer = std::thread::spawn(move || {
        let mut sent = 0u32;
        while sent < 1000 {
            if writer.write_with_length(&sent.to_be_bytes()) {
                sent += 1;
            } else {
                std::thread::yield_now();
            }
        }
    });

    let mut scratch = [0u8; 4];
    let mut expected = 0u32;
    while expected < 1000 {
        match reader.read_msg(&mut scratch).unwrap() {
            Some(4) => {
                assert_eq!(u32::from_be_bytes(scratch), expected);
                expected += 1;
            }
            Some(len) => panic!("unexpected frame length {len}"),
            None => std::thread::yield_now(),
        }
    }
    producer.join().unwrap();
}
