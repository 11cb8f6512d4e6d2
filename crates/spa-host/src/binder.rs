use std::ptr::NonNull;

use spa::port::{
    AudioIn, AudioOut, BufferSize, ChannelIn, ChannelOut, OscIn, OscOut, SampleCount, SampleRate,
    ScalarPort, StereoIn, StereoOut,
};
use spa::{framed_channel, Error, OscReader, OscWriter, Port, SlotArena, Visitor};

use crate::HostConfig;

/// Storage the host binds plugin ports to. Buffers and slots keep their
/// addresses when this value moves.
pub struct HostPorts {
    input: [Box<[f32]>; 2],
    output: [Box<[f32]>; 2],
    arena: SlotArena,
    block_size: NonNull<u32>,
    sample_rate: NonNull<i64>,
    sample_count: NonNull<u32>,
    control: Option<OscWriter>,
    replies: Option<OscReader>,
    max_message: usize,
    channel_capacity: usize,
}

// SAFETY: the slot pointers point into `arena`, which moves with this value.
unsafe impl Send for HostPorts {}

impl HostPorts {
    pub fn new(config: &HostConfig) -> Self {
        let frames = config.block_size as usize;
        let mut arena = SlotArena::new();
        let block_size = arena.alloc(config.block_size);
        let sample_rate = arena.alloc(config.sample_rate);
        let sample_count = arena.alloc(config.block_size);
        Self {
            input: [
                vec![0.0; frames].into_boxed_slice(),
                vec![0.0; frames].into_boxed_slice(),
            ],
            output: [
                vec![0.0; frames].into_boxed_slice(),
                vec![0.0; frames].into_boxed_slice(),
            ],
            arena,
            block_size,
            sample_rate,
            sample_count,
            control: None,
            replies: None,
            max_message: config.max_message,
            channel_capacity: config.channel_capacity,
        }
    }

    pub fn block_size(&self) -> u32 {
        unsafe { *self.block_size.as_ptr() }
    }

    pub fn sample_rate(&self) -> i64 {
        unsafe { *self.sample_rate.as_ptr() }
    }

    pub fn sample_count(&self) -> u32 {
        unsafe { *self.sample_count.as_ptr() }
    }

    /// Frames the plugin processes in the next block, capped at the block
    /// size.
    pub fn set_sample_count(&mut self, frames: u32) {
        let frames = frames.min(self.block_size());
        unsafe { self.sample_count.as_ptr().write(frames) };
    }

    pub fn input_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let [left, right] = &mut self.input;
        (left, right)
    }

    pub fn output(&self) -> (&[f32], &[f32]) {
        (&self.output[0], &self.output[1])
    }

    pub fn control(&mut self) -> Option<&mut OscWriter> {
        self.control.as_mut()
    }

    pub fn replies(&mut self) -> Option<&mut OscReader> {
        self.replies.as_mut()
    }

    /// Control messages dropped because the plugin's ring was full.
    pub fn dropped_messages(&self) -> u64 {
        self.control.as_ref().map_or(0, OscWriter::dropped)
    }

    /// Number of scalar slots handed out, well-known controls included.
    pub fn slot_count(&self) -> usize {
        self.arena.len()
    }

    fn ring_capacity(&self, requested: usize) -> spa::Result<usize> {
        match requested {
            0 if self.channel_capacity == 0 => {
                Err(Error::Rejected("channel capacity must be non-zero"))
            }
            0 => Ok(self.channel_capacity),
            requested => Ok(requested),
        }
    }
}

/// Binds plugin ports to a [`HostPorts`].
///
/// Supports one control channel in each direction; a second one of the same
/// direction is refused.
pub struct HostBinder<'a> {
    ports: &'a mut HostPorts,
    port_name: String,
}

impl<'a> HostBinder<'a> {
    pub fn new(ports: &'a mut HostPorts) -> Self {
        Self {
            ports,
            port_name: String::new(),
        }
    }

    /// Name used in log output for the ports that follow.
    pub fn set_port_name(&mut self, name: &str) {
        self.port_name.clear();
        self.port_name.push_str(name);
    }

    fn connect_control(&mut self, channel: &mut ChannelIn, max_message: usize) -> spa::Result<()> {
        if self.ports.control.is_some() {
            return Err(Error::Rejected("host supports a single control input channel"));
        }
        let capacity = self.ports.ring_capacity(channel.capacity())?;
        let (writer, reader) = framed_channel(capacity);
        channel.connect(reader);
        self.ports.control = Some(OscWriter::new(writer, max_message));
        tracing::debug!(port = %self.port_name, capacity, "bound control input channel");
        Ok(())
    }

    fn connect_replies(&mut self, channel: &mut ChannelOut) -> spa::Result<()> {
        if self.ports.replies.is_some() {
            return Err(Error::Rejected("host supports a single control output channel"));
        }
        let capacity = self.ports.ring_capacity(channel.capacity())?;
        let (writer, reader) = framed_channel(capacity);
        channel.connect(writer);
        self.ports.replies = Some(OscReader::new(reader, self.ports.max_message));
        tracing::debug!(port = %self.port_name, capacity, "bound control output channel");
        Ok(())
    }
}

impl Visitor for HostBinder<'_> {
    fn visit_unknown(&mut self, port: &mut dyn Port) -> spa::Result<()> {
        if port.requires_binding() {
            tracing::warn!(port = %self.port_name, "required port has a kind this host does not know");
            return Err(Error::UnsupportedPort);
        }
        tracing::info!(port = %self.port_name, "leaving optional port of unknown kind unbound");
        Ok(())
    }

    fn visit_scalar(&mut self, port: &mut dyn ScalarPort) -> spa::Result<()> {
        if port.initial() {
            tracing::warn!(
                port = %self.port_name,
                kind = port.type_name(),
                "initial control has no meaning to this host"
            );
            return Err(Error::InitialUnbound);
        }
        port.bind_default(&mut self.ports.arena);
        tracing::info!(
            port = %self.port_name,
            kind = port.type_name(),
            "unknown control bound to a default slot"
        );
        Ok(())
    }

    fn visit_buffer_size(&mut self, port: &mut BufferSize) -> spa::Result<()> {
        unsafe { port.connect(self.ports.block_size) };
        Ok(())
    }

    fn visit_sample_rate(&mut self, port: &mut SampleRate) -> spa::Result<()> {
        unsafe { port.connect(self.ports.sample_rate) };
        Ok(())
    }

    fn visit_sample_count(&mut self, port: &mut SampleCount) -> spa::Result<()> {
        unsafe { port.connect(self.ports.sample_count) };
        Ok(())
    }

    fn visit_stereo_in(&mut self, port: &mut StereoIn) -> spa::Result<()> {
        let [left, right] = &self.ports.input;
        unsafe { port.connect(left, right) };
        Ok(())
    }

    fn visit_stereo_out(&mut self, port: &mut StereoOut) -> spa::Result<()> {
        let [left, right] = &mut self.ports.output;
        unsafe { port.connect(left, right) };
        Ok(())
    }

    fn visit_audio_in(&mut self, port: &mut AudioIn) -> spa::Result<()> {
        match self.ports.input.get(port.channel) {
            Some(samples) => {
                unsafe { port.connect(samples) };
                Ok(())
            }
            None => self.visit_unknown(port),
        }
    }

    fn visit_audio_out(&mut self, port: &mut AudioOut) -> spa::Result<()> {
        match self.ports.output.get_mut(port.channel) {
            Some(samples) => {
                unsafe { port.connect(samples) };
                Ok(())
            }
            None => self.visit_unknown(port),
        }
    }

    fn visit_channel_in(&mut self, port: &mut ChannelIn) -> spa::Result<()> {
        let max_message = self.ports.max_message;
        self.connect_control(port, max_message)
    }

    fn visit_channel_out(&mut self, port: &mut ChannelOut) -> spa::Result<()> {
        self.connect_replies(port)
    }

    fn visit_osc_in(&mut self, port: &mut OscIn) -> spa::Result<()> {
        let max_message = self.ports.max_message.min(port.max_message());
        self.connect_control(port.channel_mut(), max_message)
    }

    fn visit_osc_out(&mut self, port: &mut OscOut) -> spa::Result<()> {
        self.connect_replies(port.channel_mut())
    }
}
