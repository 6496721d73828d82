//! Platform configuration for the error sources.
//!
//! Nothing in this crate hard codes platform values: error source identifiers, SDEI events, handler GUIDs, the
//! firmware reserved memory and the error record register layout all come from here.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use r_efi::efi;

use crate::{error::RasError, region::ErrorStatusRegion};

/// Configuration of one HEST error source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSourceConfig {
    /// HEST source id published in the descriptor.
    pub source_id: u16,
    /// SDEI event the operating system is notified through.
    pub sdei_event: u32,
    /// GUID the MMI handler is registered under.
    pub mmi_handler_guid: efi::Guid,
    /// Physical base of the firmware reserved memory holding the error status region.
    pub region_base: u64,
    /// Size of the firmware reserved memory in bytes.
    pub region_size: usize,
}

impl ErrorSourceConfig {
    /// Creates a new error source configuration.
    pub const fn new(
        source_id: u16,
        sdei_event: u32,
        mmi_handler_guid: efi::Guid,
        region_base: u64,
        region_size: usize,
    ) -> Self {
        Self { source_id, sdei_event, mmi_handler_guid, region_base, region_size }
    }

    /// Creates the error status region described by this configuration.
    ///
    /// # Safety
    ///
    /// `region_base` must be the address of `region_size` bytes of firmware reserved memory that is mapped for the
    /// lifetime of the firmware and not aliased by any other Rust reference.
    pub unsafe fn region(&self, max_section_length: usize) -> Result<ErrorStatusRegion, RasError> {
        // SAFETY: The caller upholds the mapping and aliasing requirements for the configured memory.
        unsafe { ErrorStatusRegion::from_firmware_region(self.region_base, self.region_size, max_section_length) }
    }
}

/// Layout of a RAM ECC error record register bank.
///
/// Offsets are relative to the bank base. Bit values are masks within the 32-bit registers except for the multi-bit
/// type, which is extracted as `(code >> multibit_shift) & multibit_mask` and compared to `multibit_ce` and
/// `multibit_ue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramRecordFormat {
    /// Offset of the ERRSTATUS register.
    pub status_offset: u64,
    /// Offset of the ERRCODE register.
    pub code_offset: u64,
    /// Offset of the ERRADDR register.
    pub address_offset: u64,
    /// Corrected error bit in ERRSTATUS.
    pub ce_bit: u32,
    /// Uncorrected error bit in ERRSTATUS.
    pub ue_bit: u32,
    /// Shift of the multi-bit error type in ERRCODE.
    pub multibit_shift: u32,
    /// Mask of the multi-bit error type after shifting.
    pub multibit_mask: u32,
    /// Multi-bit type value of a multi-bit corrected error.
    pub multibit_ce: u32,
    /// Multi-bit type value of a multi-bit uncorrected error.
    pub multibit_ue: u32,
}

/// Configuration of the RAM ECC error source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramConfig {
    /// Base of the secure error record bank.
    pub secure_record_base: u64,
    /// Base of the non-secure error record bank.
    pub non_secure_record_base: u64,
    /// Register layout shared by both banks.
    pub format: SramRecordFormat,
}

impl SramConfig {
    /// Returns the bank base for an event raised by the secure or non-secure RAM.
    pub const fn record_base(&self, non_secure: bool) -> u64 {
        if non_secure { self.non_secure_record_base } else { self.secure_record_base }
    }
}
