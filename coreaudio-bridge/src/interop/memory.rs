//! Task-allocator memory handed across the boundary.
//!
//! Strings returned through out-parameters (`IMMDevice::GetId`,
//! `VT_LPWSTR` property values) are allocated by the callee with the COM
//! task allocator and must be freed by the caller with the same allocator.

use std::ffi::c_void;
use std::fmt;
use std::ptr;

#[cfg(windows)]
mod imp {
    use std::ffi::c_void;
    use windows::Win32::System::Com::{CoTaskMemAlloc, CoTaskMemFree};

    pub unsafe fn alloc(size: usize) -> *mut c_void {
        CoTaskMemAlloc(size)
    }

    pub unsafe fn free(block: *mut c_void) {
        CoTaskMemFree(Some(block as *const c_void));
    }
}

// Without COM the only callee is in-process, so a size-prefixed block from
// the Rust allocator gives the same alloc/free pairing.
#[cfg(not(windows))]
mod imp {
    use std::alloc::{alloc as raw_alloc, dealloc, Layout};
    use std::ffi::c_void;

    const HEADER: usize = 16;

    pub unsafe fn alloc(size: usize) -> *mut c_void {
        let Some(total) = size.checked_add(HEADER) else {
            return std::ptr::null_mut();
        };
        let Ok(layout) = Layout::from_size_align(total, HEADER) else {
            return std::ptr::null_mut();
        };
        let base = raw_alloc(layout);
        if base.is_null() {
            return std::ptr::null_mut();
        }
        (base as *mut usize).write(total);
        base.add(HEADER) as *mut c_void
    }

    pub unsafe fn free(block: *mut c_void) {
        let base = (block as *mut u8).sub(HEADER);
        let total = (base as *const usize).read();
        dealloc(base, Layout::from_size_align_unchecked(total, HEADER));
    }
}

/// Allocate `size` bytes with the task allocator. Null on exhaustion.
pub fn task_mem_alloc(size: usize) -> *mut c_void {
    unsafe { imp::alloc(size) }
}

/// Free a block from [`task_mem_alloc`] (or a foreign callee). Null is ignored.
///
/// # Safety
///
/// `block` must be null or a live task-allocator block, freed only once.
pub unsafe fn task_mem_free(block: *mut c_void) {
    if !block.is_null() {
        imp::free(block);
    }
}

/// Encode `s` as a NUL-terminated UTF-16 buffer.
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Read a NUL-terminated UTF-16 string. Null reads as `None`; unpaired
/// surrogates are replaced.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated buffer.
#[cfg(windows)]
pub unsafe fn wide_to_string(ptr: *const u16) -> Option<String> {
    let wide = windows_core::PCWSTR::from_raw(ptr);
    (!wide.is_null()).then(|| String::from_utf16_lossy(wide.as_wide()))
}

/// Read a NUL-terminated UTF-16 string. Null reads as `None`; unpaired
/// surrogates are replaced.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated buffer.
#[cfg(not(windows))]
pub unsafe fn wide_to_string(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    Some(String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len)))
}

/// Copy `s` into a task-allocator buffer the receiver is expected to free.
pub fn alloc_wide(s: &str) -> *mut u16 {
    let wide = to_wide(s);
    let bytes = wide.len() * std::mem::size_of::<u16>();
    let block = task_mem_alloc(bytes) as *mut u16;
    if !block.is_null() {
        unsafe { ptr::copy_nonoverlapping(wide.as_ptr(), block, wide.len()) };
    }
    block
}

/// An owned task-allocator UTF-16 string, freed on drop.
///
/// `Default` is the null string, which is what an out-parameter slot
/// starts as.
pub struct TaskString(*mut u16);

impl TaskString {
    /// # Safety
    ///
    /// `ptr` must be null or an owned task-allocator string.
    pub unsafe fn from_raw(ptr: *mut u16) -> Self {
        Self(ptr)
    }

    pub fn as_mut_ptr(&mut self) -> *mut *mut u16 {
        &mut self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn to_string_lossy(&self) -> Option<String> {
        unsafe { wide_to_string(self.0) }
    }
}

impl Default for TaskString {
    fn default() -> Self {
        Self(ptr::null_mut())
    }
}

impl Drop for TaskString {
    fn drop(&mut self) {
        unsafe { task_mem_free(std::mem::replace(&mut self.0, ptr::null_mut()) as *mut c_void) }
    }
}

impl fmt::Debug for TaskString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskString").field(&self.to_string_lossy()).finish()
    }
}

unsafe impl Send for TaskString {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wide_round_trip_through_task_memory() {
        let id = "{0.0.0.00000000}.{8c2b4f1e-a1e3-4ad5-9b2c-3d7f1e0c9a11}";
        let owned = unsafe { TaskString::from_raw(alloc_wide(id)) };
        assert!(!owned.is_null());
        assert_eq!(owned.to_string_lossy().as_deref(), Some(id));
    }

    #[test]
    fn test_null_reads_as_none() {
        assert_eq!(TaskString::default().to_string_lossy(), None);
        assert_eq!(unsafe { wide_to_string(ptr::null()) }, None);
    }

    #[test]
    fn test_to_wide_terminates() {
        assert_eq!(to_wide("ab"), vec![b'a' as u16, b'b' as u16, 0]);
        assert_eq!(unsafe { wide_to_string(to_wide("").as_ptr()) }.as_deref(), Some(""));
    }
}
