use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use super::{Direction, Port};
use crate::error::Result;
use crate::slots::SlotArena;
use crate::visitor::Visitor;

/// Primitive value types a control port can carry.
///
/// Each implementation routes [`Port::accept`] to the visitor operation for
/// its own type, which is how typed control ports reach the right binder
/// method without the host looking at type tags.
pub trait Scalar: Copy + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const MIN: Self;
    const MAX: Self;
    const ZERO: Self;
    const ONE: Self;

    fn accept_control_in(port: &mut ControlIn<Self>, visitor: &mut dyn Visitor) -> Result<()>;
    fn accept_control_out(port: &mut ControlOut<Self>, visitor: &mut dyn Visitor) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleType {
    #[default]
    Linear,
    Logarithmic,
}

/// Scalar port of any type, for binders that handle a control generically.
pub trait ScalarPort: Port {
    fn type_name(&self) -> &'static str;

    /// Bind a single default-valued slot owned by `arena`.
    fn bind_default(&mut self, arena: &mut SlotArena);

    fn as_port_mut(&mut self) -> &mut dyn Port;
}

/// Control value read by the plugin.
pub struct ControlIn<T: Scalar> {
    slot: Option<NonNull<T>>,
    pub scale_type: ScaleType,
    pub min: T,
    pub max: T,
    pub step: T,
    pub def: T,
    compulsory: bool,
    initial: bool,
}

// SAFETY: the slot is only dereferenced under the binding contract of
// `connect`; the host does not write it while `run` executes.
unsafe impl<T: Scalar> Send for ControlIn<T> {}

impl<T: Scalar> ControlIn<T> {
    pub fn new() -> Self {
        Self {
            slot: None,
            scale_type: ScaleType::Linear,
            min: T::MIN,
            max: T::MAX,
            step: T::ONE,
            def: T::ZERO,
            compulsory: false,
            initial: false,
        }
    }

    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_step(mut self, step: T) -> Self {
        self.step = step;
        self
    }

    pub fn with_default(mut self, def: T) -> Self {
        self.def = def;
        self
    }

    pub fn with_scale(mut self, scale_type: ScaleType) -> Self {
        self.scale_type = scale_type;
        self
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    pub fn mark_initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Point the port at host-owned storage.
    ///
    /// # Safety
    /// `slot` must stay valid for as long as it is bound to this port.
    pub unsafe fn connect(&mut self, slot: NonNull<T>) {
        self.slot = Some(slot);
    }

    pub fn disconnect(&mut self) {
        self.slot = None;
    }

    /// Current value, or `None` while unbound.
    pub fn get(&self) -> Option<T> {
        self.slot.map(|slot| unsafe { slot.as_ptr().read() })
    }

    /// Current value, falling back to the declared default while unbound.
    pub fn value(&self) -> T {
        self.get().unwrap_or(self.def)
    }
}

impl<T: Scalar> Default for ControlIn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Port for ControlIn<T> {
    fn directions(&self) -> Direction {
        Direction::INPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn initial(&self) -> bool {
        self.initial
    }

    fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        T::accept_control_in(self, visitor)
    }
}

impl<T: Scalar> ScalarPort for ControlIn<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn bind_default(&mut self, arena: &mut SlotArena) {
        let slot = arena.alloc(self.def);
        // SAFETY: arena slots live as long as the arena, which the host keeps
        // alive for the lifetime of the instance.
        unsafe { self.connect(slot) };
    }

    fn as_port_mut(&mut self) -> &mut dyn Port {
        self
    }
}

/// Control value written by the plugin.
pub struct ControlOut<T: Scalar> {
    slot: Option<NonNull<T>>,
    pub scale_type: ScaleType,
    pub min: T,
    pub max: T,
    compulsory: bool,
}

// SAFETY: see `ControlIn`.
unsafe impl<T: Scalar> Send for ControlOut<T> {}

impl<T: Scalar> ControlOut<T> {
    pub fn new() -> Self {
        Self {
            slot: None,
            scale_type: ScaleType::Linear,
            min: T::MIN,
            max: T::MAX,
            compulsory: false,
        }
    }

    pub fn with_range(mut self, min: T, max: T) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn mark_compulsory(mut self) -> Self {
        self.compulsory = true;
        self
    }

    /// # Safety
    /// `slot` must stay valid for as long as it is bound to this port.
    pub unsafe fn connect(&mut self, slot: NonNull<T>) {
        self.slot = Some(slot);
    }

    pub fn get(&self) -> Option<T> {
        self.slot.map(|slot| unsafe { slot.as_ptr().read() })
    }

    /// Publish a value to the host. Returns `false` while unbound.
    pub fn set(&mut self, value: T) -> bool {
        match self.slot {
            Some(slot) => {
                unsafe { slot.as_ptr().write(value) };
                true
            }
            None => false,
        }
    }
}

impl<T: Scalar> Default for ControlOut<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Port for ControlOut<T> {
    fn directions(&self) -> Direction {
        Direction::OUTPUT
    }

    fn compulsory(&self) -> bool {
        self.compulsory
    }

    fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        T::accept_control_out(self, visitor)
    }
}

impl<T: Scalar> ScalarPort for ControlOut<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn bind_default(&mut self, arena: &mut SlotArena) {
        let slot = arena.alloc(T::ZERO);
        // SAFETY: see `ControlIn::bind_default`.
        unsafe { self.connect(slot) };
    }

    fn as_port_mut(&mut self) -> &mut dyn Port {
        self
    }
}

macro_rules! well_known_control {
    ($(#[$meta:meta])* $name:ident($ty:ty), $visit:ident, initial = $initial:expr) => {
        $(#[$meta])*
        pub struct $name(ControlIn<$ty>);

        impl $name {
            pub fn new() -> Self {
                let control = ControlIn::new();
                Self(if $initial { control.mark_initial() } else { control })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Deref for $name {
            type Target = ControlIn<$ty>;

            fn deref(&self) -> &ControlIn<$ty> {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut ControlIn<$ty> {
                &mut self.0
            }
        }

        impl Port for $name {
            fn directions(&self) -> Direction {
                self.0.directions()
            }

            fn compulsory(&self) -> bool {
                self.0.compulsory()
            }

            fn initial(&self) -> bool {
                self.0.initial()
            }

            fn is_bound(&self) -> bool {
                self.0.is_bound()
            }

            fn accept(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
                visitor.$visit(self)
            }
        }
    };
}

well_known_control!(
    /// Sample rate in Hz. Must be known before `init`.
    SampleRate(i64),
    visit_sample_rate,
    initial = true
);

well_known_control!(
    /// Maximum number of frames per block. Must be known before `init` so the
    /// plugin can size its buffers.
    BufferSize(u32),
    visit_buffer_size,
    initial = true
);

well_known_control!(
    /// Number of frames to process in the current block. Changes never require
    /// buffers to be resized.
    SampleCount(u32),
    visit_sample_count,
    initial = false
);
