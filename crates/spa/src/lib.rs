//! SPA: a simple plugin ABI
//! ========================
//!
//! Contract between a host and separately compiled audio plugins. Covers ABI
//! version negotiation, binding of typed ports through double dispatch, a
//! framed lock-free control channel into the plugin's real-time loop, and the
//! plugin lifecycle including ticketed save/load/restore.
//!
//! Plugins implement [`Plugin`] and [`Descriptor`] and export the descriptor
//! with [`export_descriptor!`]. Hosts resolve [`plugin::DESCRIPTOR_SYMBOL`],
//! implement a [`Visitor`] to bind ports and drive the plugin through an
//! [`Instance`].

pub mod channel;
pub mod containers;
pub mod error;
pub mod lifecycle;
pub mod osc;
pub mod plugin;
pub mod port;
pub mod slots;
pub mod ticket;
pub mod version;
pub mod visitor;

pub use channel::{framed_channel, FramedReader, FramedWriter, LENGTH_PREFIX};
pub use containers::{ModuleBox, SimpleStr, SimpleVec};
pub use error::{BindError, Error, Result};
pub use lifecycle::{Instance, State};
pub use osc::{assert_types_are, OscArg, OscMessage, OscReader, OscWriter};
pub use plugin::{
    unique_name, Descriptor, DescriptorExport, DescriptorLoader, Hoster, License, Plugin,
    Properties, Ticket,
};
pub use port::{Direction, Port};
pub use slots::SlotArena;
pub use ticket::{Operation, TicketBook, TicketStatus};
pub use version::{AbiVersion, VersionMismatch, ABI_VERSION, LEAST_ABI_VERSION};
pub use visitor::Visitor;

/// Common imports for plugin authors.
pub mod prelude {
    pub use crate::port::{
        AudioIn, AudioOut, BufferSize, ChannelIn, ChannelOut, ControlIn, ControlOut, Direction,
        OscIn, OscOut, Port, SampleCount, SampleRate, ScaleType, StereoIn, StereoOut,
    };
    pub use crate::{
        assert_types_are, export_descriptor, Descriptor, Error, Hoster, License, ModuleBox,
        OscArg, Plugin, Properties, Result, SimpleStr, SimpleVec, Ticket,
    };
}
