//! Aligned buffer allocation.
//!
//! Frame headers, data blocks and table arrays are held in buffers aligned
//! to [`DATA_ALIGNMENT`](crate::types::DATA_ALIGNMENT) so they can be handed
//! to unbuffered (direct) I/O. Allocation and release go through the same
//! pair; an [`AlignedBuf`] owns its memory exclusively and frees it on drop.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::types::DATA_ALIGNMENT;

/// An exclusively owned, zero-initialized byte buffer with a fixed alignment.
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    align: usize,
}

impl AlignedBuf {
    /// Allocate a zeroed buffer of `len` bytes aligned to `align`.
    ///
    /// `align` must be a power of two. A zero-length buffer allocates
    /// nothing.
    pub fn zeroed(len: usize, align: usize) -> Self {
        assert!(align.is_power_of_two());
        if len == 0 {
            return AlignedBuf {
                ptr: NonNull::dangling(),
                len: 0,
                align,
            };
        }
        let layout = Layout::from_size_align(len, align)
            .expect("invalid aligned buffer layout");
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        AlignedBuf { ptr, len, align }
    }

    /// Allocate a zeroed buffer with the format's frame alignment.
    pub fn frame_aligned(len: usize) -> Self {
        Self::zeroed(len, DATA_ALIGNMENT as usize)
    }

    /// Empty buffer (no allocation).
    pub fn empty() -> Self {
        Self::zeroed(0, DATA_ALIGNMENT as usize)
    }

    /// Number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: ptr is valid for len bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: ptr is valid for len bytes and exclusively owned.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.len != 0 {
            let layout = Layout::from_size_align(self.len, self.align)
                .expect("invalid aligned buffer layout");
            // SAFETY: allocated with the identical layout in zeroed().
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.align)
            .finish()
    }
}

// The buffer is exclusively owned plain memory.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_zeroing() {
        let buf = AlignedBuf::frame_aligned(4096);
        assert_eq!(buf.len(), 4096);
        assert_eq!(buf.as_slice().as_ptr() as usize % 4096, 0);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty() {
        let buf = AlignedBuf::empty();
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn test_write_read() {
        let mut buf = AlignedBuf::zeroed(64, 32);
        buf.as_mut_slice()[0] = 0xAB;
        buf.as_mut_slice()[63] = 0xCD;
        assert_eq!(buf[0], 0xAB);
        assert_eq!(buf[63], 0xCD);
    }
}
