// In: src/handle.rs

//! Ownership-tracked references to native objects.
//!
//! A `NativeHandle` owns exactly one native reference. Release is explicit
//! (`release`) or happens on `Drop`; either way the native side sees it once.

use std::ffi::c_void;

use crate::error::{CarrowError, Result};
use crate::native::{carrow_object_free, carrow_object_retain};
use crate::result::unmarshal;

pub struct NativeHandle {
    ptr: *mut c_void,
    kind: &'static str,
    released: bool,
}

// SAFETY: the objects behind a handle are either immutable (`Arc`ed arrow data)
// or synchronize internally (store connections). Mutable objects (builders,
// lists, metadata) are only reachable through `&mut self` on their wrappers.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    /// Takes ownership of a native reference. Null pointers are rejected.
    pub(crate) fn new(ptr: *mut c_void, kind: &'static str) -> Result<Self> {
        if ptr.is_null() {
            return Err(CarrowError::Creation(kind.to_string()));
        }
        Ok(Self {
            ptr,
            kind,
            released: false,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The raw pointer for a native call. Fails once the handle is released.
    pub(crate) fn as_ptr(&self) -> Result<*mut c_void> {
        if self.released {
            return Err(CarrowError::UseAfterRelease(self.kind));
        }
        Ok(self.ptr)
    }

    /// Returns a new handle to the same native object.
    pub(crate) fn try_clone(&self) -> Result<Self> {
        let res = unsafe { carrow_object_retain(self.as_ptr()?) };
        let ptr = unmarshal(res)?.ptr;
        Self::new(ptr, self.kind)
    }

    /// Drops the native reference. A second call fails with `DoubleRelease`.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(CarrowError::DoubleRelease(self.kind));
        }
        self.released = true;
        unsafe { carrow_object_free(self.ptr) };
        self.ptr = std::ptr::null_mut();
        log::trace!("released {} handle", self.kind);
        Ok(())
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("released", &self.released)
            .finish()
    }
}

/// Builds a handle directly around a native object. Used by tests that poke
/// the native layer without going through a wrapper.
#[cfg(test)]
pub(crate) fn from_object(obj: crate::native::NativeObject, kind: &'static str) -> NativeHandle {
    NativeHandle {
        ptr: crate::native::into_raw(obj),
        kind,
        released: false,
    }
}
