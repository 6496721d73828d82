//! Error record register access.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// Access to 32-bit memory mapped error record registers.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait ErrorRecordRegisters {
    /// Reads the register at `address`.
    fn read32(&self, address: u64) -> u32;
    /// Writes `value` to the register at `address`.
    fn write32(&mut self, address: u64, value: u32);
}

/// Memory mapped error record registers accessed with volatile loads and stores.
#[derive(Debug)]
pub struct MmioErrorRecord {
    _private: (),
}

impl MmioErrorRecord {
    /// Creates the register accessor.
    ///
    /// # Safety
    ///
    /// Every address later passed to [`ErrorRecordRegisters`] must be a mapped, 4-byte aligned device register.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl ErrorRecordRegisters for MmioErrorRecord {
    #[cfg_attr(coverage_nightly, coverage(off))]
    fn read32(&self, address: u64) -> u32 {
        // SAFETY: The creator of this accessor guaranteed that the address is a mapped, aligned register.
        unsafe { core::ptr::read_volatile(address as *const u32) }
    }

    #[cfg_attr(coverage_nightly, coverage(off))]
    fn write32(&mut self, address: u64, value: u32) {
        // SAFETY: The creator of this accessor guaranteed that the address is a mapped, aligned register.
        unsafe { core::ptr::write_volatile(address as *mut u32, value) }
    }
}
