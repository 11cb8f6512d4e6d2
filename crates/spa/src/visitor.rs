//! Double-dispatch binding.
//!
//! A port's `accept` calls the [`Visitor`] method for its exact kind. Every
//! method has a default that forwards to the next more general one:
//!
//! ```text
//! visit_sample_rate  -> visit_control_in_i64 -> visit_scalar -> visit_unknown
//! visit_osc_in       -> visit_channel_in                     -> visit_unknown
//! visit_stereo_in                                            -> visit_unknown
//! ```
//!
//! A binder therefore only overrides the kinds it understands, and anything
//! else ends up in [`Visitor::visit_unknown`], which refuses ports that must
//! be bound and ignores optional ones.

use crate::error::{Error, Result};
use crate::port::{
    AudioIn, AudioOut, BufferSize, ChannelIn, ChannelOut, ControlIn, ControlOut, OscIn, OscOut,
    Port, SampleCount, SampleRate, Scalar, ScalarPort, StereoIn, StereoOut,
};

macro_rules! define_visitor {
    ($(
        $ty:ty => $visit_in:ident, $visit_out:ident,
            [$min:expr, $max:expr, $zero:expr, $one:expr];
    )*) => {
        pub trait Visitor {
            fn visit_unknown(&mut self, port: &mut dyn Port) -> Result<()> {
                if port.requires_binding() {
                    Err(Error::UnsupportedPort)
                } else {
                    Ok(())
                }
            }

            /// Any control port whose typed method was not overridden.
            fn visit_scalar(&mut self, port: &mut dyn ScalarPort) -> Result<()> {
                self.visit_unknown(port.as_port_mut())
            }

            $(
                fn $visit_in(&mut self, port: &mut ControlIn<$ty>) -> Result<()> {
                    self.visit_scalar(port)
                }

                fn $visit_out(&mut self, port: &mut ControlOut<$ty>) -> Result<()> {
                    self.visit_scalar(port)
                }
            )*

            fn visit_sample_rate(&mut self, port: &mut SampleRate) -> Result<()> {
                self.visit_control_in_i64(port)
            }

            fn visit_buffer_size(&mut self, port: &mut BufferSize) -> Result<()> {
                self.visit_control_in_u32(port)
            }

            fn visit_sample_count(&mut self, port: &mut SampleCount) -> Result<()> {
                self.visit_control_in_u32(port)
            }

            fn visit_stereo_in(&mut self, port: &mut StereoIn) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_stereo_out(&mut self, port: &mut StereoOut) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_audio_in(&mut self, port: &mut AudioIn) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_audio_out(&mut self, port: &mut AudioOut) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_channel_in(&mut self, port: &mut ChannelIn) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_channel_out(&mut self, port: &mut ChannelOut) -> Result<()> {
                self.visit_unknown(port)
            }

            fn visit_osc_in(&mut self, port: &mut OscIn) -> Result<()> {
                self.visit_channel_in(port.channel_mut())
            }

            fn visit_osc_out(&mut self, port: &mut OscOut) -> Result<()> {
                self.visit_channel_out(port.channel_mut())
            }
        }

        $(
            impl Scalar for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);
                const MIN: Self = $min;
                const MAX: Self = $max;
                const ZERO: Self = $zero;
                const ONE: Self = $one;

                fn accept_control_in(
                    port: &mut ControlIn<Self>,
                    visitor: &mut dyn Visitor,
                ) -> Result<()> {
                    visitor.$visit_in(port)
                }

                fn accept_control_out(
                    port: &mut ControlOut<Self>,
                    visitor: &mut dyn Visitor,
                ) -> Result<()> {
                    visitor.$visit_out(port)
                }
            }
        )*
    };
}

define_visitor! {
    bool => visit_control_in_bool, visit_control_out_bool, [false, true, false, true];
    i8 => visit_control_in_i8, visit_control_out_i8, [i8::MIN, i8::MAX, 0, 1];
    u8 => visit_control_in_u8, visit_control_out_u8, [u8::MIN, u8::MAX, 0, 1];
    i16 => visit_control_in_i16, visit_control_out_i16, [i16::MIN, i16::MAX, 0, 1];
    u16 => visit_control_in_u16, visit_control_out_u16, [u16::MIN, u16::MAX, 0, 1];
    i32 => visit_control_in_i32, visit_control_out_i32, [i32::MIN, i32::MAX, 0, 1];
    u32 => visit_control_in_u32, visit_control_out_u32, [u32::MIN, u32::MAX, 0, 1];
    i64 => visit_control_in_i64, visit_control_out_i64, [i64::MIN, i64::MAX, 0, 1];
    u64 => visit_control_in_u64, visit_control_out_u64, [u64::MIN, u64::MAX, 0, 1];
    f32 => visit_control_in_f32, visit_control_out_f32, [f32::MIN, f32::MAX, 0.0, 1.0];
    f64 => visit_control_in_f64, visit_control_out_f64, [f64::MIN, f64::MAX, 0.0, 1.0];
}
