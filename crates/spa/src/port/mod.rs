//! Ports: named connection points through which the host binds its data.
//!
//! A plugin owns its ports; the host owns the memory they reference. Binding
//! stores a non-owning reference inside the port and never transfers
//! ownership, so every `connect` that takes host memory is `unsafe`: the
//! caller promises the memory outlives the binding.

mod audio;
mod channel;
mod control;

use std::ops::BitOr;
use std::ptr::NonNull;

pub use audio::{AudioIn, AudioOut, StereoIn, StereoOut, LEFT, RIGHT};
pub use channel::{ChannelIn, ChannelOut, OscIn, OscOut, DEFAULT_MAX_MESSAGE};
pub use control::{
    BufferSize, ControlIn, ControlOut, SampleCount, SampleRate, Scalar, ScalarPort, ScaleType,
};

use crate::error::Result;
use crate::visitor::Visitor;

/// Direction of data flow as seen from the plugin. A bit-set: a port may be
/// both input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction(u8);

impl Direction {
    /// Data from host to plugin.
    pub const INPUT: Direction = Direction(1);
    /// Data from plugin to host.
    pub const OUTPUT: Direction = Direction(2);
    pub const BOTH: Direction = Direction(3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Direction) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_input(self) -> bool {
        self.contains(Direction::INPUT)
    }

    pub const fn is_output(self) -> bool {
        self.contains(Direction::OUTPUT)
    }
}

impl BitOr for Direction {
    type Output = Direction;

    fn bitor(self, rhs: Direction) -> Direction {
        Direction(self.0 | rhs.0)
    }
}

/// Type-erased port handle.
///
/// The host never inspects the concrete type. It hands a [`Visitor`] to
/// [`Port::accept`] and the port calls back into the visitor operation for
/// its own kind.
pub trait Port {
    fn directions(&self) -> Direction;

    /// The host must bind this port for the plugin to work correctly.
    fn compulsory(&self) -> bool {
        false
    }

    /// The host must bind this port with a sane value before `init`.
    /// Initial ports are compulsory, whatever [`Port::compulsory`] says.
    fn initial(&self) -> bool {
        false
    }

    fn is_bound(&self) -> bool;

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()>;

    fn requires_binding(&self) -> bool {
        self.compulsory() || self.initial()
    }
}

/// Non-owning view of a run of samples owned by the other side.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawSlice<T> {
    ptr: NonNull<T>,
    len: usize,
}

impl<T> RawSlice<T> {
    pub(crate) fn from_slice(slice: &[T]) -> Self {
        Self {
            ptr: NonNull::from(slice).cast(),
            len: slice.len(),
        }
    }

    pub(crate) fn from_mut_slice(slice: &mut [T]) -> Self {
        let len = slice.len();
        Self {
            ptr: NonNull::from(slice).cast(),
            len,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    /// The referenced memory must still be alive and not mutably borrowed.
    pub(crate) unsafe fn as_slice<'a>(&self) -> &'a [T] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// # Safety
    /// The referenced memory must still be alive and not otherwise borrowed.
    pub(crate) unsafe fn as_mut_slice<'a>(&mut self) -> &'a mut [T] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_a_bit_set() {
        let both = Direction::INPUT | Direction::OUTPUT;
        assert_eq!(both, Direction::BOTH);
        assert!(both.is_input() && both.is_output());
        assert!(!Direction::INPUT.is_output());
        assert_eq!(Direction::OUTPUT.bits(), 2);
    }

    #[test]
    fn raw_slices_see_the_whole_buffer() {
        let mut samples = vec![0.0f32; 6];
        let mut view = RawSlice::from_mut_slice(&mut samples);
        assert_eq!(view.len(), 6);
        unsafe { view.as_mut_slice()[5] = 1.5 };
        assert_eq!(samples[5], 1.5);

        let view = RawSlice::from_slice(&samples[..2]);
        assert_eq!(unsafe { view.as_slice() }, &[0.0, 0.0]);
    }
}
