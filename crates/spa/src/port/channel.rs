use super::{Direction, Port};
use crate::channel::{FramedReader, FramedWriter};
use crate::error::Result;
use crate::osc::{encode, OscArg, OscMessage};
use crate::visitor::Visitor;

/// Largest OSC message a port accepts unless told otherwise.
pub const DEFAULT_MAX_MESSAGE: usize = 1024;

/// Framed byte channel from host to plugin. The plugin chooses the ring
/// capacity; the host creates the ring and keeps the writing half.
pub struct ChannelIn {
    capacity: usize,
    reader: Option<FramedReader>,
    compulsory: bool,
}

impl ChannelIn {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reader: None,
            compulsory: false,
        }
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn connect(&mut self, reader: FramedReader) {
        self.reader = Some(reader);
    }

    /// See [`FramedReader::read_msg`]. An unbound channel never has messages.
    pub fn read_msg(&mut self, scratch: &mut [u8]) -> Result<Option<usize>> {
        match &mut self.reader {
            Some(reader) => reader.read_msg(scratch),
            None => Ok(None),
        }
    }

    /// See [`FramedReader::discard_pending`].
    pub fn discard_pending(&mut self) -> usize {
        self.reader.as_mut().map_or(0, FramedReader::discard_pending)
    }
}

impl Port for ChannelIn {
    fn directions(&self) -> Direction {
        Direction::INPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.reader.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_channel_in(self)
    }
}

/// Framed byte channel from plugin to host.
pub struct ChannelOut {
    capacity: usize,
    writer: Option<FramedWriter>,
    compulsory: bool,
}

impl ChannelOut {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            writer: None,
            compulsory: false,
        }
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn connect(&mut self, writer: FramedWriter) {
        self.writer = Some(writer);
    }

    /// `false` when unbound or when the ring is too full for the frame.
    pub fn write_with_length(&mut self, payload: &[u8]) -> bool {
        match &mut self.writer {
            Some(writer) => writer.write_with_length(payload),
            None => false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.writer.as_ref().map_or(0, FramedWriter::dropped)
    }
}

impl Port for ChannelOut {
    fn directions(&self) -> Direction {
        Direction::OUTPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.writer.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_channel_out(self)
    }
}

/// Control channel carrying OSC messages into the plugin.
///
/// Owns a scratch buffer sized at construction, so reading on the real-time
/// thread never allocates.
pub struct OscIn {
    channel: ChannelIn,
    buffer: Box<[u8]>,
    len: usize,
}

impl OscIn {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_message(capacity, DEFAULT_MAX_MESSAGE)
    }

    pub fn with_max_message(capacity: usize, max_message: usize) -> Self {
        Self {
            channel: ChannelIn::new(capacity),
            buffer: vec![0u8; max_message].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn max_message(&self) -> usize {
        self.buffer.len()
    }

    pub fn channel_mut(&mut self) -> &mut ChannelIn {
        &mut self.channel
    }

    /// Pulls the next frame into the scratch buffer. `Ok(false)` once the
    /// channel is drained.
    pub fn read_msg(&mut self) -> Result<bool> {
        match self.channel.read_msg(&mut self.buffer)? {
            Some(len) => {
                self.len = len;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Skips a frame that did not fit the scratch buffer.
    pub fn discard_pending(&mut self) -> usize {
        self.channel.discard_pending()
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Decodes the frame read by the last successful [`OscIn::read_msg`].
    pub fn message(&self) -> Result<OscMessage<'_>> {
        OscMessage::parse(self.payload())
    }
}

impl Port for OscIn {
    fn directions(&self) -> Direction {
        Direction::INPUT
    }

    fn compulsory(&self) -> bool {
        self.channel.compulsory()
    }

    fn is_bound(&self) -> bool {
        self.channel.is_bound()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_osc_in(self)
    }
}

/// Control channel carrying OSC messages out of the plugin.
pub struct OscOut {
    channel: ChannelOut,
    buffer: Box<[u8]>,
}

impl OscOut {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_message(capacity, DEFAULT_MAX_MESSAGE)
    }

    pub fn with_max_message(capacity: usize, max_message: usize) -> Self {
        Self {
            channel: ChannelOut::new(capacity),
            buffer: vec![0u8; max_message].into_boxed_slice(),
        }
    }

    pub fn max_message(&self) -> usize {
        self.buffer.len()
    }

    pub fn channel_mut(&mut self) -> &mut ChannelOut {
        &mut self.channel
    }

    /// Encodes and sends one message. `Ok(false)` when it was dropped.
    pub fn write(&mut self, path: &str, args: &[OscArg<'_>]) -> Result<bool> {
        let len = encode(&mut self.buffer, path, args)?;
        Ok(self.channel.write_with_length(&self.buffer[..len]))
    }
}

impl Port for OscOut {
    fn directions(&self) -> Direction {
        Direction::OUTPUT
    }

    fn compulsory(&self) -> bool {
        self.channel.compulsory()
    }

    fn is_bound(&self) -> bool {
        self.channel.is_bound()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_osc_out(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::framed_channel;

    #[test]
    fn unbound_channel_reads_nothing() {
        let mut osc = OscIn::new(256);
        assert!(!osc.is_bound());
        assert!(!osc.read_msg().unwrap());
        assert_eq!(osc.max_message(), DEFAULT_MAX_MESSAGE);
    }

    #[test]
    fn osc_out_reaches_host_reader() {
        let mut port = OscOut::with_max_message(128, 64);
        let (writer, mut reader) = framed_channel(port.channel_mut().capacity());
        port.channel_mut().connect(writer);
        assert!(port.write("/level", &[OscArg::Float(0.5)]).unwrap());

        let mut scratch = [0u8; 64];
        let len = reader.read_msg(&mut scratch).unwrap().unwrap();
        let msg = OscMessage::parse(&scratch[..len]).unwrap();
        assert_eq!(msg.path(), "/level");
    }
}
