use super::{Direction, Port, RawSlice};
use crate::error::Result;
use crate::visitor::Visitor;

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

/// Stereo audio input. The host binds one buffer per channel.
#[derive(Default)]
pub struct StereoIn {
    channels: Option<[RawSlice<f32>; 2]>,
    compulsory: bool,
}

// SAFETY: buffers are host memory that is only read inside `run`, while the
// host is not touching them.
unsafe impl Send for StereoIn {}

impl StereoIn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    /// # Safety
    /// Both buffers must outlive the binding and must not be written by the
    /// host while the plugin runs.
    pub unsafe fn connect(&mut self, left: &[f32], right: &[f32]) {
        self.channels = Some([RawSlice::from_slice(left), RawSlice::from_slice(right)]);
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        match &self.channels {
            Some(channels) if index < 2 => unsafe { channels[index].as_slice() },
            _ => &[],
        }
    }

    pub fn left(&self) -> &[f32] {
        self.channel(LEFT)
    }

    pub fn right(&self) -> &[f32] {
        self.channel(RIGHT)
    }

    /// Frames available in the shorter of the two channels.
    pub fn frames(&self) -> usize {
        self.channels
            .as_ref()
            .map(|[l, r]| l.len().min(r.len()))
            .unwrap_or(0)
    }
}

impl Port for StereoIn {
    fn directions(&self) -> Direction {
        Direction::INPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.channels.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_stereo_in(self)
    }
}

/// Stereo audio output written by the plugin.
#[derive(Default)]
pub struct StereoOut {
    channels: Option<[RawSlice<f32>; 2]>,
    compulsory: bool,
}

// SAFETY: see `StereoIn`.
unsafe impl Send for StereoOut {}

impl StereoOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    /// # Safety
    /// Both buffers must outlive the binding and must not be accessed by the
    /// host while the plugin runs.
    pub unsafe fn connect(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.channels = Some([
            RawSlice::from_mut_slice(left),
            RawSlice::from_mut_slice(right),
        ]);
    }

    pub fn frames(&self) -> usize {
        self.channels
            .as_ref()
            .map(|[l, r]| l.len().min(r.len()))
            .unwrap_or(0)
    }

    /// Both channels at once, as `(left, right)`.
    pub fn channels_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        match &mut self.channels {
            Some([left, right]) => unsafe { (left.as_mut_slice(), right.as_mut_slice()) },
            None => (&mut [], &mut []),
        }
    }

    pub fn left_mut(&mut self) -> &mut [f32] {
        self.channels_mut().0
    }

    pub fn right_mut(&mut self) -> &mut [f32] {
        self.channels_mut().1
    }
}

impl Port for StereoOut {
    fn directions(&self) -> Direction {
        Direction::OUTPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.channels.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_stereo_out(self)
    }
}

/// Single-channel audio input tagged with the channel index it represents.
pub struct AudioIn {
    buffer: Option<RawSlice<f32>>,
    pub channel: usize,
    compulsory: bool,
}

// SAFETY: see `StereoIn`.
unsafe impl Send for AudioIn {}

impl AudioIn {
    pub fn new(channel: usize) -> Self {
        Self {
            buffer: None,
            channel,
            compulsory: false,
        }
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    /// # Safety
    /// See [`StereoIn::connect`].
    pub unsafe fn connect(&mut self, samples: &[f32]) {
        self.buffer = Some(RawSlice::from_slice(samples));
    }

    pub fn samples(&self) -> &[f32] {
        match &self.buffer {
            Some(buffer) => unsafe { buffer.as_slice() },
            None => &[],
        }
    }
}

impl Port for AudioIn {
    fn directions(&self) -> Direction {
        Direction::INPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.buffer.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_audio_in(self)
    }
}

pub struct AudioOut {
    buffer: Option<RawSlice<f32>>,
    pub channel: usize,
    compulsory: bool,
}

// SAFETY: see `StereoIn`.
unsafe impl Send for AudioOut {}

impl AudioOut {
    pub fn new(channel: usize) -> Self {
        Self {
            buffer: None,
            channel,
            compulsory: false,
        }
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    /// # Safety
    /// See [`StereoOut::connect`].
    pub unsafe fn connect(&mut self, samples: &mut [f32]) {
        self.buffer = Some(RawSlice::from_mut_slice(samples));
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        match &mut self.buffer {
            Some(buffer) => unsafe { buffer.as_mut_slice() },
            None => &mut [],
        }
    }
}

impl Port for AudioOut {
    fn directions(&self) -> Direction {
        Direction::OUTPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.buffer.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        visitor.visit_audio_out(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_stereo_ports_are_empty() {
        let input = StereoIn::new();
        assert!(!input.is_bound());
        assert_eq!(input.frames(), 0);
        assert!(input.left().is_empty());

        let mut output = StereoOut::new();
        assert!(output.left_mut().is_empty());
    }

    #[test]
    fn stereo_out_writes_into_host_buffers() {
        let mut left = vec![0.0f32; 4];
        let mut right = vec![0.0f32; 4];
        let mut output = StereoOut::new();
        unsafe { output.connect(&mut left, &mut right) };
        {
            let (l, r) = output.channels_mut();
            l.fill(0.5);
            r[3] = 1.0;
        }
        assert_eq!(output.frames(), 4);
        assert_eq!(left, [0.5; 4]);
        assert_eq!(right, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn mono_ports_carry_their_channel() {
        let samples = [0.1f32; 8];
        let mut input = AudioIn::new(RIGHT);
        unsafe { input.connect(&samples) };
        assert_eq!(input.channel, RIGHT);
        assert_eq!(input.samples().len(), 8);
    }
}
