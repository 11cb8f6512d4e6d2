use std::ptr::NonNull;

use crate::port::Scalar;

struct Slot {
    ptr: NonNull<u8>,
    release: unsafe fn(NonNull<u8>),
}

unsafe fn release_slot<T>(ptr: NonNull<u8>) {
    drop(Box::from_raw(ptr.cast::<T>().as_ptr()));
}

/// Host-owned storage for control values of any scalar type.
///
/// Addresses handed out stay stable until the arena is dropped.
#[derive(Default)]
pub struct SlotArena {
    slots: Vec<Slot>,
}

// SAFETY: slots only hold `Scalar` values, which are `Send`.
unsafe impl Send for SlotArena {}

impl SlotArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc<T: Scalar>(&mut self, value: T) -> NonNull<T> {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        self.slots.push(Slot {
            ptr: ptr.cast(),
            release: release_slot::<T>,
        });
        ptr
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Drop for SlotArena {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            unsafe { (slot.release)(slot.ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_keep_their_address() {
        let mut arena = SlotArena::new();
        let first = arena.alloc(1.5f64);
        for i in 0..64u32 {
            arena.alloc(i);
        }
        assert_eq!(unsafe { *first.as_ptr() }, 1.5);
        assert_eq!(arena.len(), 65);
    }
}
