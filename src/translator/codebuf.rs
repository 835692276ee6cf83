//! Executable memory management for compiled blocks.
//!
//! Mirrors the reference translator's `xlat_alloc_block`/`xlat_free_block`: a single
//! anonymous mapping sized to hold one block's machine code. Unlike the reference, which maps
//! the page `PROT_READ | PROT_WRITE | PROT_EXEC` up front, this writes the code as plain
//! read/write memory first and only flips it executable once emission is complete, so the page
//! is never simultaneously writable and executable.

use crate::error::ErrorDetail;

/// A single page-granular mapping holding one compiled block's machine code.
pub(crate) struct CodeBuffer {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for CodeBuffer {}

impl CodeBuffer {
    /// Maps `len` bytes (rounded up to a whole page) of fresh read/write memory.
    #[cfg(unix)]
    pub(crate) fn new(len: usize) -> Result<Self, ErrorDetail> {
        let len = page_align(len);
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(ErrorDetail::TranslationError { address: 0 });
        }
        Ok(CodeBuffer {
            ptr: ptr as *mut u8,
            len,
        })
    }

    #[cfg(windows)]
    pub(crate) fn new(len: usize) -> Result<Self, ErrorDetail> {
        use windows::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};
        let len = page_align(len);
        let ptr = unsafe { VirtualAlloc(None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };
        if ptr.is_null() {
            return Err(ErrorDetail::TranslationError { address: 0 });
        }
        Ok(CodeBuffer {
            ptr: ptr as *mut u8,
            len,
        })
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Flips the mapping from read/write to read/execute. After this call the buffer's contents
    /// must not be modified again.
    #[cfg(unix)]
    pub(crate) fn make_executable(&self) -> Result<(), ErrorDetail> {
        let result = unsafe { libc::mprotect(self.ptr as *mut libc::c_void, self.len, libc::PROT_READ | libc::PROT_EXEC) };
        if result != 0 {
            return Err(ErrorDetail::TranslationError { address: 0 });
        }
        Ok(())
    }

    #[cfg(windows)]
    pub(crate) fn make_executable(&self) -> Result<(), ErrorDetail> {
        use windows::Win32::System::Memory::{VirtualProtect, PAGE_EXECUTE_READ, PAGE_PROTECTION_FLAGS};
        let mut old = PAGE_PROTECTION_FLAGS(0);
        let result = unsafe {
            VirtualProtect(
                self.ptr as *mut core::ffi::c_void,
                self.len,
                PAGE_EXECUTE_READ,
                &mut old,
            )
        };
        if result.as_bool() {
            Ok(())
        } else {
            Err(ErrorDetail::TranslationError { address: 0 })
        }
    }

    /// Returns the entry point as a callable function pointer. Only valid after
    /// [CodeBuffer::make_executable] has succeeded.
    pub(crate) unsafe fn entry_point(&self) -> *const u8 {
        self.ptr
    }
}

impl Drop for CodeBuffer {
    #[cfg(unix)]
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }

    #[cfg(windows)]
    fn drop(&mut self) {
        use windows::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
        unsafe {
            let _ = VirtualFree(self.ptr as *mut core::ffi::c_void, 0, MEM_RELEASE);
        }
    }
}

fn page_align(len: usize) -> usize {
    const PAGE_SIZE: usize = 4096;
    (len + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_writable() {
        let mut buffer = CodeBuffer::new(16).unwrap();
        let slice = buffer.as_mut_slice();
        slice[0] = 0xC3;
        assert_eq!(slice[0], 0xC3);
    }

    #[test]
    fn test_make_executable_succeeds() {
        let mut buffer = CodeBuffer::new(16).unwrap();
        buffer.as_mut_slice()[0] = 0xC3;
        assert!(buffer.make_executable().is_ok());
    }
}
