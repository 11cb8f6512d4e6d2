//! Length-prefixed messages over a lock-free SPSC byte ring.
//!
//! Every frame is a 4-byte big-endian payload length followed by the payload.
//! The writer publishes a frame in a single push, so the reader observes
//! either the whole frame or nothing of it.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

use crate::error::{Error, Result};

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX: usize = 4;

/// Creates a connected writer/reader pair over a ring of `capacity` bytes.
pub fn framed_channel(capacity: usize) -> (FramedWriter, FramedReader) {
    let rb = HeapRb::<u8>::new(capacity);
    let (producer, consumer) = rb.split();
    (FramedWriter::new(producer), FramedReader::new(consumer))
}

/// Producer half. Owned by exactly one thread.
pub struct FramedWriter {
    producer: HeapProducer<u8>,
    frame: Vec<u8>,
    dropped: u64,
}

impl FramedWriter {
    pub fn new(producer: HeapProducer<u8>) -> Self {
        let frame = Vec::with_capacity(producer.capacity());
        Self {
            producer,
            frame,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// Bytes that can currently be written, prefixes included.
    pub fn write_space(&self) -> usize {
        self.producer.free_len()
    }

    /// Frames refused because the ring was too full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Writes `payload` as one frame.
    ///
    /// Returns `false` and leaves the ring untouched when fewer than
    /// `payload.len() + 4` bytes are free. Never blocks.
    pub fn write_with_length(&mut self, payload: &[u8]) -> bool {
        let Ok(length) = u32::try_from(payload.len()) else {
            self.dropped += 1;
            return false;
        };
        let frame_len = LENGTH_PREFIX + payload.len();
        if self.producer.free_len() < frame_len {
            self.dropped += 1;
            return false;
        }

        // Fits in the preallocated capacity: frame_len <= free_len <= capacity.
        self.frame.clear();
        self.frame.extend_from_slice(&length.to_be_bytes());
        self.frame.extend_from_slice(payload);
        let pushed = self.producer.push_slice(&self.frame);
        debug_assert_eq!(pushed, frame_len);
        true
    }
}

/// Consumer half. Owned by exactly one thread.
pub struct FramedReader {
    consumer: HeapConsumer<u8>,
    pending: Option<usize>,
}

impl FramedReader {
    pub fn new(consumer: HeapConsumer<u8>) -> Self {
        Self {
            consumer,
            pending: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity()
    }

    /// Bytes currently readable, counting a consumed but undelivered prefix.
    pub fn read_space(&self) -> usize {
        self.consumer.len()
    }

    /// Length of a frame whose prefix has been consumed but whose payload did
    /// not fit the caller's buffer yet.
    pub fn pending_len(&self) -> Option<usize> {
        self.pending
    }

    /// Reads the next frame into `scratch`.
    ///
    /// * `Ok(None)` when no frame is available.
    /// * `Ok(Some(len))` with the payload in `scratch[..len]`.
    /// * [`Error::OutOfRange`] when the payload does not fit in `scratch`. The
    ///   frame stays pending and is delivered by a later call with a larger
    ///   buffer.
    /// * [`Error::CorruptedChannel`] when a prefix or payload is torn, which
    ///   cannot happen with a well-behaved writer.
    pub fn read_msg(&mut self, scratch: &mut [u8]) -> Result<Option<usize>> {
        let length = match self.pending {
            Some(length) => length,
            None => {
                let available = self.consumer.len();
                if available == 0 {
                    return Ok(None);
                }
                if available < LENGTH_PREFIX {
                    return Err(Error::CorruptedChannel {
                        expected: LENGTH_PREFIX,
                        available,
                    });
                }
                let mut prefix = [0u8; LENGTH_PREFIX];
                self.consumer.pop_slice(&mut prefix);
                let length = u32::from_be_bytes(prefix) as usize;
                self.pending = Some(length);
                length
            }
        };

        let available = self.consumer.len();
        if available < length {
            return Err(Error::CorruptedChannel {
                expected: length,
                available,
            });
        }
        if length > scratch.len() {
            return Err(Error::OutOfRange {
                accessed: length,
                size: scratch.len(),
            });
        }

        let popped = self.consumer.pop_slice(&mut scratch[..length]);
        debug_assert_eq!(popped, length);
        self.pending = None;
        Ok(Some(length))
    }

    /// Drops the payload of a pending frame, for readers that cannot grow
    /// their buffer. Returns the number of bytes skipped.
    pub fn discard_pending(&mut self) -> usize {
        match self.pending.take() {
            Some(length) => self.consumer.skip(length),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_delivered_whole() {
        let (mut writer, mut reader) = framed_channel(64);
        assert!(writer.write_with_length(b"hello"));
        assert_eq!(writer.write_space(), 64 - 9);

        let mut scratch = [0u8; 16];
        assert_eq!(reader.read_msg(&mut scratch).unwrap(), Some(5));
        assert_eq!(&scratch[..5], b"hello");
        assert_eq!(reader.read_msg(&mut scratch).unwrap(), None);
    }

    #[test]
    fn full_ring_drops_the_frame() {
        let (mut writer, mut reader) = framed_channel(8);
        assert!(!writer.write_with_length(b"12345"));
        assert_eq!(writer.dropped(), 1);
        assert_eq!(reader.read_space(), 0);
        assert!(writer.write_with_length(b"1234"));
        assert_eq!(writer.write_space(), 0);

        let mut scratch = [0u8; 4];
        assert_eq!(reader.read_msg(&mut scratch).unwrap(), Some(4));
    }

    #[test]
    fn zero_length_frames_are_valid() {
        let (mut writer, mut reader) = framed_channel(8);
        assert!(writer.write_with_length(&[]));
        let mut scratch = [0u8; 0];
        assert_eq!(reader.read_msg(&mut scratch).unwrap(), Some(0));
    }

    #[test]
    fn small_buffer_keeps_frame_pending() {
        let (mut writer, mut reader) = framed_channel(32);
        writer.write_with_length(&[7u8; 10]);

        let mut small = [0u8; 4];
        match reader.read_msg(&mut small) {
            Err(Error::OutOfRange { accessed, size }) => {
                assert_eq!(accessed, 10);
                assert_eq!(size, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(reader.pending_len(), Some(10));

        let mut large = [0u8; 16];
        assert_eq!(reader.read_msg(&mut large).unwrap(), Some(10));
        assert_eq!(&large[..10], &[7u8; 10]);
        assert_eq!(reader.pending_len(), None);
    }

    #[test]
    fn discarding_an_oversized_frame_keeps_the_stream_aligned() {
        let (mut writer, mut reader) = framed_channel(64);
        writer.write_with_length(&[1u8; 20]);
        writer.write_with_length(b"ok");

        let mut small = [0u8; 4];
        assert!(reader.read_msg(&mut small).is_err());
        assert_eq!(reader.discard_pending(), 20);
        assert_eq!(reader.read_msg(&mut small).unwrap(), Some(2));
        assert_eq!(&small[..2], b"ok");
        assert_eq!(reader.discard_pending(), 0);
    }

    #[test]
    fn torn_prefix_is_corruption() {
        let rb = HeapRb::<u8>::new(16);
        let (mut producer, consumer) = rb.split();
        producer.push_slice(&[0, 0]);
        let mut reader = FramedReader::new(consumer);
        let mut scratch = [0u8; 8];
        let err = reader.read_msg(&mut scratch).unwrap_err();
        assert!(matches!(
            err,
            Error::CorruptedChannel {
                expected: 4,
                available: 2
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn torn_payload_is_corruption() {
        let rb = HeapRb::<u8>::new(16);
        let (mut producer, consumer) = rb.split();
        producer.push_slice(&8u32.to_be_bytes());
        producer.push_slice(&[1, 2, 3]);
        let mut reader = FramedReader::new(consumer);
        let mut scratch = [0u8; 8];
        assert!(matches!(
            reader.read_msg(&mut scratch),
            Err(Error::CorruptedChannel {
                expected: 8,
                available: 3
            })
        ));
    }
}
