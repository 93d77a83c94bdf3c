//! Executable Memory
//!
//! Owns the anonymous private mapping a JIT kernel runs from. The region is
//! written exactly once while read+write, then sealed read+exec; it is never
//! writable and executable at the same time (W^X). Dropping the value unmaps
//! the region with the size recorded at creation.

use memmap2::Mmap;

use crate::{RecurError, Result};

/// A sealed, executable copy of emitted machine code.
pub struct ExecutableCode {
    map: Mmap,
}

impl ExecutableCode {
    /// Map `code` into fresh executable memory.
    ///
    /// Allocates a read+write anonymous mapping of exactly `code.len()`
    /// bytes, copies the code in, and flips the protection to read+exec.
    /// Either step failing surfaces the OS error; no mapping is leaked.
    pub fn new(code: &[u8]) -> Result<Self> {
        let mut map = memmap2::MmapMut::map_anon(code.len()).map_err(|source| {
            RecurError::JitError {
                message: "cannot allocate code pages".to_string(),
                source,
            }
        })?;
        map.copy_from_slice(code);
        let map = map.make_exec().map_err(|source| RecurError::JitError {
            message: "cannot mark code pages executable".to_string(),
            source,
        })?;
        Ok(Self { map })
    }

    /// Size of the mapped region in bytes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entry point of the mapped code.
    ///
    /// Callers transmute this to the exact signature the back end emitted;
    /// calling through any other signature is undefined behavior.
    pub fn entry(&self) -> *const u8 {
        self.map.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_exact_size() {
        let code = [0xC3u8; 7];
        let exec = ExecutableCode::new(&code).unwrap();
        assert_eq!(exec.len(), 7);
        assert!(!exec.is_empty());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_mapped_code_is_callable() {
        // mov eax, 42; ret
        let code = [0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3];
        let exec = ExecutableCode::new(&code).unwrap();
        let f: unsafe extern "C" fn() -> u32 = unsafe { std::mem::transmute(exec.entry()) };
        assert_eq!(unsafe { f() }, 42);
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_mapped_code_is_callable() {
        // movz x0, #42; ret
        let mut code = Vec::new();
        code.extend_from_slice(&0xD2800540u32.to_le_bytes());
        code.extend_from_slice(&0xD65F03C0u32.to_le_bytes());
        let exec = ExecutableCode::new(&code).unwrap();
        let f: unsafe extern "C" fn() -> u64 = unsafe { std::mem::transmute(exec.entry()) };
        assert_eq!(unsafe { f() }, 42);
    }
}
