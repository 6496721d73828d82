//! Error status region layout manager.
//!
//! The error status region is firmware reserved memory shared with the operating system. It is laid out as four
//! zones at fixed offsets from the region base:
//!
//! ```text
//!  offset
//!  0                 ┌──────────────────┐
//!                    │ Ack-Register     │ ──────────────┐  address of Ack-Data
//!  8                 ├──────────────────┤               │
//!                    │ Status-Register  │ ───┐          │  address of Status-Data (base + 16)
//!  16                ├──────────────────┤ <──┘          │
//!                    │ Status-Data      │               │  status header, data entry, section
//!  16 + block length ├──────────────────┤ <─────────────┘
//!                    │ Ack-Data         │                  written by the operating system
//!                    └──────────────────┘
//! ```
//!
//! The operating system follows the registers from the HEST descriptor, so the region must be initialized before
//! the descriptor is handed out.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::mem;

use patina_cper::{GenericErrorDataEntry, GenericErrorStatus};
use r_efi::efi;
use zerocopy::IntoBytes;

use crate::{encoder::SectionSummary, error::RasError};

/// Offset of the Ack-Register.
pub const ACK_REGISTER_OFFSET: usize = 0;
/// Offset of the Status-Register.
pub const STATUS_REGISTER_OFFSET: usize = 8;
/// Offset of the Status-Data.
pub const STATUS_DATA_OFFSET: usize = 16;

const REGISTER_SIZE: usize = mem::size_of::<u64>();
const DATA_ENTRY_OFFSET: usize = STATUS_DATA_OFFSET + GenericErrorStatus::SIZE;
const SECTION_OFFSET: usize = DATA_ENTRY_OFFSET + GenericErrorDataEntry::SIZE;

/// Typed view over the error status region of one error source.
#[derive(Debug)]
pub struct ErrorStatusRegion {
    memory: &'static mut [u8],
    base: u64,
    max_section_length: usize,
    initialized: bool,
}

impl ErrorStatusRegion {
    /// Length of a status block whose section is at most `max_section_length` bytes.
    pub const fn status_block_length_for(max_section_length: usize) -> usize {
        GenericErrorStatus::SIZE + GenericErrorDataEntry::SIZE + max_section_length
    }

    /// Bytes of memory needed for a region whose section is at most `max_section_length` bytes.
    pub const fn required_size(max_section_length: usize) -> usize {
        STATUS_DATA_OFFSET + Self::status_block_length_for(max_section_length) + REGISTER_SIZE
    }

    /// Creates a region over `memory`, using its address as the region base.
    ///
    /// Returns [`RasError::RegionTooSmall`] when `memory` cannot hold every zone.
    pub fn new(memory: &'static mut [u8], max_section_length: usize) -> Result<Self, RasError> {
        if memory.len() < Self::required_size(max_section_length) {
            log::error!(
                target: "ras",
                "Error status region of {:#x} bytes cannot hold a {:#x} byte section",
                memory.len(),
                max_section_length
            );
            return Err(RasError::RegionTooSmall);
        }

        let base = memory.as_ptr() as u64;
        Ok(Self { memory, base, max_section_length, initialized: false })
    }

    /// Creates a region over firmware reserved memory.
    ///
    /// # Safety
    ///
    /// `base` must be the address of `size` bytes of memory that stays mapped for the lifetime of the firmware and
    /// is not referenced by any other Rust reference.
    pub unsafe fn from_firmware_region(base: u64, size: usize, max_section_length: usize) -> Result<Self, RasError> {
        if base == 0 {
            return Err(RasError::InvalidParameter);
        }
        if size < Self::required_size(max_section_length) {
            log::error!(target: "ras", "Error status region at {:#x} is only {:#x} bytes", base, size);
            return Err(RasError::RegionTooSmall);
        }

        // SAFETY: The caller guarantees `base` points to `size` bytes of exclusively owned, permanently mapped memory.
        let memory = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, size) };
        Ok(Self { memory, base, max_section_length, initialized: false })
    }

    /// Zero fills the region and points both registers at their data.
    ///
    /// Only the first call has an effect, later calls leave the published data alone.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        self.memory.fill(0);
        self.write_u64(STATUS_REGISTER_OFFSET, self.status_data_address());
        self.write_u64(ACK_REGISTER_OFFSET, self.ack_data_address());
        self.initialized = true;

        log::info!(
            target: "ras",
            "Initialized error status region at {:#x}, status block length {:#x}",
            self.base,
            self.status_block_length()
        );
    }

    /// Whether [`ErrorStatusRegion::initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Address of the start of the region.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Size of the region in bytes.
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Largest section the region was laid out for.
    pub fn max_section_length(&self) -> usize {
        self.max_section_length
    }

    /// Length of the Status-Data in bytes.
    pub fn status_block_length(&self) -> usize {
        Self::status_block_length_for(self.max_section_length)
    }

    /// Address of the Ack-Register.
    pub fn ack_register_address(&self) -> u64 {
        self.base + ACK_REGISTER_OFFSET as u64
    }

    /// Address of the Status-Register.
    pub fn status_register_address(&self) -> u64 {
        self.base + STATUS_REGISTER_OFFSET as u64
    }

    /// Address of the Status-Data.
    pub fn status_data_address(&self) -> u64 {
        self.base + STATUS_DATA_OFFSET as u64
    }

    /// Address of the Ack-Data.
    pub fn ack_data_address(&self) -> u64 {
        self.base + self.ack_data_offset() as u64
    }

    fn ack_data_offset(&self) -> usize {
        STATUS_DATA_OFFSET + self.status_block_length()
    }

    /// Current value of the Status-Register.
    pub fn read_status_register(&self) -> u64 {
        self.read_u64(STATUS_REGISTER_OFFSET)
    }

    /// Current value of the Ack-Register.
    pub fn read_ack_register(&self) -> u64 {
        self.read_u64(ACK_REGISTER_OFFSET)
    }

    /// Current value of the Ack-Data.
    pub fn read_ack_data(&self) -> u64 {
        self.read_u64(self.ack_data_offset())
    }

    /// The Status-Data bytes.
    pub fn status_data(&self) -> &[u8] {
        &self.memory[STATUS_DATA_OFFSET..self.ack_data_offset()]
    }

    /// The whole region, including memory past the Ack-Data.
    pub fn as_bytes(&self) -> &[u8] {
        self.memory
    }

    #[cfg(test)]
    pub(crate) fn write_ack_data(&mut self, value: u64) {
        self.write_u64(self.ack_data_offset(), value);
    }

    /// Writes a report into the Status-Data.
    ///
    /// The status header and data entry are rebuilt from `summary` and the length of `section` on every call.
    pub fn write_report(
        &mut self,
        summary: &SectionSummary,
        section_type: &efi::Guid,
        section: &[u8],
    ) -> Result<(), RasError> {
        if !self.initialized {
            return Err(RasError::NotReady);
        }
        if section.len() > self.max_section_length {
            return Err(RasError::SectionTooLarge);
        }

        let header = GenericErrorStatus::single_entry(
            summary.block_status,
            (GenericErrorDataEntry::SIZE + section.len()) as u32,
            summary.severity,
        );
        let entry = GenericErrorDataEntry::new(section_type, summary.severity, summary.flags, section.len() as u32);

        self.memory[STATUS_DATA_OFFSET..DATA_ENTRY_OFFSET].copy_from_slice(header.as_bytes());
        self.memory[DATA_ENTRY_OFFSET..SECTION_OFFSET].copy_from_slice(entry.as_bytes());
        self.memory[SECTION_OFFSET..SECTION_OFFSET + section.len()].copy_from_slice(section);

        log::debug!(
            target: "ras",
            "Wrote {:?} report of {:#x} bytes at {:#x}",
            summary.severity,
            section.len(),
            self.status_data_address()
        );
        Ok(())
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let mut bytes = [0u8; REGISTER_SIZE];
        bytes.copy_from_slice(&self.memory[offset..offset + REGISTER_SIZE]);
        u64::from_le_bytes(bytes)
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.memory[offset..offset + REGISTER_SIZE].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patina_cper::{BlockStatus, ErrorSeverity};
    use zerocopy::FromBytes;
    extern crate std;
    use std::{boxed::Box, vec};

    const MAX_SECTION: usize = 80;

    fn leak(size: usize, fill: u8) -> &'static mut [u8] {
        Box::leak(vec![fill; size].into_boxed_slice())
    }

    fn summary() -> SectionSummary {
        SectionSummary {
            severity: ErrorSeverity::Corrected,
            block_status: BlockStatus::new().with_correctable(true),
            flags: GenericErrorDataEntry::FLAG_OVERFLOW,
        }
    }

    #[test]
    fn test_required_size() {
        assert_eq!(ErrorStatusRegion::status_block_length_for(864), 956);
        assert_eq!(ErrorStatusRegion::required_size(864), 16 + 956 + 8);
        assert_eq!(ErrorStatusRegion::required_size(MAX_SECTION), 16 + 172 + 8);
    }

    #[test]
    fn test_region_too_small() {
        let size = ErrorStatusRegion::required_size(MAX_SECTION) - 1;
        assert_eq!(ErrorStatusRegion::new(leak(size, 0), MAX_SECTION).err(), Some(RasError::RegionTooSmall));

        let exact = ErrorStatusRegion::required_size(MAX_SECTION);
        assert!(ErrorStatusRegion::new(leak(exact, 0), MAX_SECTION).is_ok());
    }

    #[test]
    fn test_from_firmware_region_rejects_null() {
        // SAFETY: A null base is rejected before any memory is touched.
        let result = unsafe { ErrorStatusRegion::from_firmware_region(0, 4096, MAX_SECTION) };
        assert_eq!(result.err(), Some(RasError::InvalidParameter));
    }

    #[test]
    fn test_initialize_zero_fills_and_sets_registers() {
        let mut region = ErrorStatusRegion::new(leak(512, 0xA5), MAX_SECTION).unwrap();
        assert!(!region.is_initialized());

        region.initialize();

        let base = region.base();
        assert!(region.is_initialized());
        assert_eq!(region.read_status_register(), base + 16);
        assert_eq!(region.read_ack_register(), base + 16 + 172);
        assert_eq!(region.read_ack_register(), region.ack_data_address());
        assert_eq!(region.read_ack_data(), 0);
        assert!(region.status_data().iter().all(|b| *b == 0));
        assert!(region.memory[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_initialize_runs_once() {
        let mut region = ErrorStatusRegion::new(leak(512, 0), MAX_SECTION).unwrap();
        region.initialize();
        region.write_report(&summary(), &patina_cper::memory::SECTION_GUID, &[0x11; MAX_SECTION]).unwrap();

        region.initialize();
        assert_eq!(region.status_data()[GenericErrorStatus::SIZE + GenericErrorDataEntry::SIZE], 0x11);
    }

    #[test]
    fn test_write_report_before_initialize() {
        let mut region = ErrorStatusRegion::new(leak(512, 0x5A), MAX_SECTION).unwrap();
        let result = region.write_report(&summary(), &patina_cper::memory::SECTION_GUID, &[0; MAX_SECTION]);
        assert_eq!(result, Err(RasError::NotReady));
        assert!(region.memory.iter().all(|b| *b == 0x5A));
    }

    #[test]
    fn test_write_report_rejects_large_section() {
        let mut region = ErrorStatusRegion::new(leak(512, 0), MAX_SECTION).unwrap();
        region.initialize();
        let result = region.write_report(&summary(), &patina_cper::memory::SECTION_GUID, &[0; MAX_SECTION + 1]);
        assert_eq!(result, Err(RasError::SectionTooLarge));
        assert!(region.status_data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_report_layout() {
        let mut region = ErrorStatusRegion::new(leak(512, 0), MAX_SECTION).unwrap();
        region.initialize();
        region.write_report(&summary(), &patina_cper::memory::SECTION_GUID, &[0x22; MAX_SECTION]).unwrap();

        let data = region.status_data();
        let header = GenericErrorStatus::read_from_bytes(&data[..20]).unwrap();
        let block_status = header.block_status();
        let raw_data_offset = header.raw_data_offset;
        let raw_data_length = header.raw_data_length;
        let data_length = header.data_length;
        let severity = header.error_severity;
        assert!(block_status.correctable());
        assert_eq!(block_status.entry_count(), 1);
        assert_eq!(raw_data_offset, 92);
        assert_eq!(raw_data_length, 0);
        assert_eq!(data_length, 72 + 80);
        assert_eq!(severity, ErrorSeverity::Corrected.as_u32());

        let entry = GenericErrorDataEntry::read_from_bytes(&data[20..92]).unwrap();
        let flags = entry.flags;
        let revision = entry.revision;
        let length = entry.error_data_length;
        assert_eq!(entry.section_type(), patina_cper::memory::SECTION_GUID);
        assert_eq!(flags, 0x80);
        assert_eq!(revision, 0x0300);
        assert_eq!(length, 80);

        assert!(data[92..].iter().all(|b| *b == 0x22));
        assert_eq!(region.read_ack_data(), 0);
    }
}
