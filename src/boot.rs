//! The external firmware-handoff seam. UEFI mode setting, GOP probing,
//! RSDP discovery, and font loading all happen before the kernel proper
//! takes over; this module only describes the shape of what that
//! collaborator hands over.

use crate::memory::{MemoryKind, MemoryMapEntry};

/// Pixel layout the framebuffer collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgbx8,
    Bgrx8,
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferInfo {
    pub physical_base: u64,
    pub size: u64,
    pub width: usize,
    pub height: usize,
    pub pixels_per_scanline: usize,
    pub format: PixelFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct Rsdp {
    pub address: u64,
    pub acpi_revision: u8,
}

/// Everything the firmware bridge must hand the kernel before boot
/// services are exited and `memory::frame_allocator::init` runs.
pub struct Handoff<'a> {
    pub memory_map: &'a [MemoryMapEntry],
    pub framebuffer: Option<FramebufferInfo>,
    pub font_blob: &'static [u8],
    pub rsdp: Option<Rsdp>,
    pub boot_config_blob: Option<&'a [u8]>,
}

impl<'a> Handoff<'a> {
    /// Total page count across every conventional-memory entry in the map,
    /// used only for early log narration before the allocator ledger exists.
    pub fn conventional_pages(&self) -> u64 {
        self.memory_map
            .iter()
            .filter(|e| e.kind == MemoryKind::Conventional)
            .map(|e| e.page_count)
            .sum()
    }
}
