//! Containers for data that crosses the host/plugin boundary.
//!
//! Host and plugin are compiled separately and may link different allocators.
//! Every container here captures a release function in the module that
//! allocated it, so dropping the value always runs the allocating module's
//! deallocation code, whichever side performs the drop.

use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use crate::error::Error;

unsafe extern "C" fn release_boxed_slice<T>(data: *mut T, len: usize) {
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)));
}

/// Fixed-size heap array that is released by the module which created it.
///
/// An empty vector never allocates.
#[repr(C)]
pub struct SimpleVec<T> {
    data: *mut T,
    len: usize,
    release: Option<unsafe extern "C" fn(*mut T, usize)>,
    _marker: PhantomData<T>,
}

// SAFETY: the vector uniquely owns its elements, like `Box<[T]>`.
unsafe impl<T: Send> Send for SimpleVec<T> {}
unsafe impl<T: Sync> Sync for SimpleVec<T> {}

impl<T> SimpleVec<T> {
    pub const fn new() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
            release: None,
            _marker: PhantomData,
        }
    }

    pub fn from_vec(vec: Vec<T>) -> Self {
        if vec.is_empty() {
            return Self::new();
        }
        let boxed = vec.into_boxed_slice();
        let len = boxed.len();
        let data = Box::into_raw(boxed) as *mut T;
        Self {
            data,
            len,
            release: Some(release_boxed_slice::<T>),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        if self.data.is_null() {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.data, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.data.is_null() {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(self.data, self.len) }
    }

    /// Bounds-checked element access.
    pub fn get(&self, index: usize) -> Result<&T, Error> {
        self.as_slice().get(index).ok_or(Error::OutOfRange {
            accessed: index,
            size: self.len,
        })
    }

    /// Releases the storage through the module that allocated it.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl<T> Drop for SimpleVec<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            unsafe { release(self.data, self.len) };
        }
    }
}

impl<T> Default for SimpleVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for SimpleVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for SimpleVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> From<Vec<T>> for SimpleVec<T> {
    fn from(vec: Vec<T>) -> Self {
        Self::from_vec(vec)
    }
}

impl<T> FromIterator<T> for SimpleVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a SimpleVec<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<T: Clone> Clone for SimpleVec<T> {
    fn clone(&self) -> Self {
        Self::from_vec(self.as_slice().to_vec())
    }
}

impl<T: fmt::Debug> fmt::Debug for SimpleVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq> PartialEq for SimpleVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

/// NUL-terminated UTF-8 string built on [`SimpleVec`].
#[repr(C)]
#[derive(Clone, Default, PartialEq)]
pub struct SimpleStr {
    bytes: SimpleVec<u8>,
}

impl SimpleStr {
    pub const fn new() -> Self {
        Self {
            bytes: SimpleVec::new(),
        }
    }

    /// Number of bytes before the terminating NUL.
    pub fn len(&self) -> usize {
        self.bytes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &str {
        match self.bytes.as_slice().split_last() {
            // SAFETY: only ever built from `&str`, plus the trailing NUL.
            Some((_, text)) => unsafe { std::str::from_utf8_unchecked(text) },
            None => "",
        }
    }

    /// Borrow as a C string. `None` if the text contains an interior NUL.
    pub fn as_c_str(&self) -> Option<&CStr> {
        if self.bytes.is_empty() {
            return Some(<&CStr>::default());
        }
        CStr::from_bytes_with_nul(self.bytes.as_slice()).ok()
    }

    /// Append `rhs`. The old buffer is released by its own module and the new
    /// one is allocated by the caller's module.
    pub fn push_str(&mut self, rhs: &str) {
        let mut joined = String::with_capacity(self.len() + rhs.len());
        joined.push_str(self.as_str());
        joined.push_str(rhs);
        *self = SimpleStr::from(joined.as_str());
    }
}

impl From<&str> for SimpleStr {
    fn from(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        Self {
            bytes: SimpleVec::from_vec(bytes),
        }
    }
}

impl PartialEq<str> for SimpleStr {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for SimpleStr {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for SimpleStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SimpleStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

unsafe fn release_box<T: ?Sized>(ptr: NonNull<T>) {
    drop(Box::from_raw(ptr.as_ptr()));
}

/// Owning box for objects (usually trait objects) created inside a plugin
/// module. Dropping it runs the creating module's drop and deallocation.
pub struct ModuleBox<T: ?Sized> {
    ptr: NonNull<T>,
    release: unsafe fn(NonNull<T>),
}

// SAFETY: `ModuleBox` has the same ownership semantics as `Box<T>`.
unsafe impl<T: ?Sized + Send> Send for ModuleBox<T> {}
unsafe impl<T: ?Sized + Sync> Sync for ModuleBox<T> {}

impl<T: ?Sized> ModuleBox<T> {
    /// Must be called from the module that allocated `boxed`, which is where
    /// the release function gets monomorphised.
    pub fn new(boxed: Box<T>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            release: release_box::<T>,
        }
    }
}

impl<T: ?Sized> Deref for ModuleBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for ModuleBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: ?Sized> Drop for ModuleBox<T> {
    fn drop(&mut self) {
        unsafe { (self.release)(self.ptr) };
    }
}

impl<T: ?Sized> fmt::Debug for ModuleBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleBox").field("ptr", &self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn empty_vec_does_not_allocate() {
        let vec: SimpleVec<u32> = SimpleVec::new();
        assert!(vec.release.is_none());
        assert!(vec.as_slice().is_empty());
        let vec: SimpleVec<u32> = SimpleVec::from_vec(Vec::new());
        assert!(vec.release.is_none());
    }

    #[test]
    fn checked_access_reports_out_of_range() {
        let vec: SimpleVec<u32> = vec![1, 2, 3].into();
        assert_eq!(*vec.get(2).unwrap(), 3);
        match vec.get(3) {
            Err(Error::OutOfRange { accessed, size }) => {
                assert_eq!(accessed, 3);
                assert_eq!(size, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn strings_keep_a_terminating_nul() {
        let mut name = SimpleStr::from("buffer");
        assert_eq!(name.len(), 6);
        assert_eq!(name.as_c_str().unwrap().to_bytes(), b"buffer");
        name.push_str("size");
        assert_eq!(name, "buffersize");
        assert_eq!(SimpleStr::new().as_str(), "");
        assert!(SimpleStr::from("a\0b").as_c_str().is_none());
    }

    #[test]
    fn port_name_lists_collect() {
        let names: SimpleVec<SimpleStr> = ["in", "out", "osc"]
            .into_iter()
            .map(SimpleStr::from)
            .collect();
        let joined: Vec<&str> = names.iter().map(SimpleStr::as_str).collect();
        assert_eq!(joined, ["in", "out", "osc"]);
    }

    #[test]
    fn module_box_runs_drop_once() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        trait Marker {}
        impl Marker for Tracked {}

        let drops = Arc::new(AtomicUsize::new(0));
        let boxed: ModuleBox<dyn Marker> = ModuleBox::new(Box::new(Tracked(drops.clone())));
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(boxed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
