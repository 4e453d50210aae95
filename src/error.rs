//! Crate-wide error type.

use core::fmt;

/// Failure modes surfaced across the kernel's fallible entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A page or heap allocation could not be satisfied.
    OutOfMemory,
    /// A virtual address fell outside any window this kernel can map.
    OutOfAddressSpace,
    /// A caller passed an argument this subsystem does not recognize.
    InvalidArgument,
    /// The operation could not make progress right now; retry later.
    WouldBlock,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::OutOfMemory => "out of memory",
            KernelError::OutOfAddressSpace => "out of address space",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::WouldBlock => "would block",
        };
        f.write_str(msg)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
