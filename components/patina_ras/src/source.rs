//! Error sources.
//!
//! An [`ErrorEventSource`] knows how to turn the payload of an error event into an encoded section. A
//! [`HestErrorSource`] pairs one with its error status region and configuration. It is the context object both the
//! MMI handler and the HEST descriptor protocol operate on.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::{cell::RefCell, mem};

use patina_cper::{arm, memory};
use r_efi::efi;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    config::{ErrorSourceConfig, SramConfig},
    encoder::{
        CpuErrorSection, CpuErrorSnapshot, EncodedSection, MemoryErrorSection, SramErrorRecord, encode_cpu_error,
        encode_memory_error,
    },
    error::RasError,
    mmio::ErrorRecordRegisters,
    region::ErrorStatusRegion,
};

/// A producer of error sections.
pub trait ErrorEventSource {
    /// The section the source encodes.
    type Section: IntoBytes + Immutable;

    /// Section type GUID written into the data entry.
    const SECTION_TYPE: efi::Guid;

    /// Largest section the source produces.
    const MAX_SECTION_LENGTH: usize;

    /// Size of the event payload delivered in the communication buffer.
    const EVENT_SIZE: usize;

    /// Captures the error described by `event` and encodes it.
    ///
    /// `event` is at least [`ErrorEventSource::EVENT_SIZE`] bytes long.
    fn capture(&mut self, event: &[u8]) -> Result<EncodedSection<Self::Section>, RasError>;
}

/// Processor error source. The event payload is a [`CpuErrorSnapshot`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuErrorSource;

impl ErrorEventSource for CpuErrorSource {
    type Section = CpuErrorSection;

    const SECTION_TYPE: efi::Guid = arm::SECTION_GUID;
    const MAX_SECTION_LENGTH: usize = CpuErrorSection::SIZE;
    const EVENT_SIZE: usize = CpuErrorSnapshot::SIZE;

    fn capture(&mut self, event: &[u8]) -> Result<EncodedSection<CpuErrorSection>, RasError> {
        let (snapshot, _) = CpuErrorSnapshot::read_from_prefix(event).map_err(|_| RasError::BadBufferSize)?;
        Ok(encode_cpu_error(&snapshot))
    }
}

/// Event payload of the RAM ECC error source.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SramErrorEvent {
    /// [`SramErrorEvent::NON_SECURE`] when the non-secure RAM raised the event, anything else selects the secure RAM.
    pub non_secure: u64,
}

impl SramErrorEvent {
    /// Value of `non_secure` selecting the non-secure error record bank.
    pub const NON_SECURE: u64 = 1;
}

/// RAM ECC error source.
///
/// Reads the error record bank selected by the event, encodes it and clears the status register.
#[derive(Debug)]
pub struct SramErrorSource<R: ErrorRecordRegisters> {
    config: SramConfig,
    registers: R,
}

impl<R: ErrorRecordRegisters> SramErrorSource<R> {
    /// Creates a RAM error source reading its error records through `registers`.
    pub const fn new(config: SramConfig, registers: R) -> Self {
        Self { config, registers }
    }

    fn read_record(&mut self, base: u64) -> SramErrorRecord {
        let format = &self.config.format;
        let record = SramErrorRecord {
            status: self.registers.read32(base + format.status_offset),
            code: self.registers.read32(base + format.code_offset),
            address: self.registers.read32(base + format.address_offset),
        };

        // ERRSTATUS is write-one-to-clear.
        self.registers.write32(base + format.status_offset, record.status);
        record
    }
}

impl<R: ErrorRecordRegisters> ErrorEventSource for SramErrorSource<R> {
    type Section = MemoryErrorSection;

    const SECTION_TYPE: efi::Guid = memory::SECTION_GUID;
    const MAX_SECTION_LENGTH: usize = mem::size_of::<MemoryErrorSection>();
    const EVENT_SIZE: usize = mem::size_of::<SramErrorEvent>();

    fn capture(&mut self, event: &[u8]) -> Result<EncodedSection<MemoryErrorSection>, RasError> {
        let (event, _) = SramErrorEvent::read_from_prefix(event).map_err(|_| RasError::BadBufferSize)?;
        let base = self.config.record_base(event.non_secure == SramErrorEvent::NON_SECURE);

        let record = self.read_record(base);
        log::debug!(
            target: "ras",
            "RAM error record at {:#x}: status={:#x} code={:#x} address={:#x}",
            base,
            record.status,
            record.code,
            record.address
        );
        Ok(encode_memory_error(&record, &self.config.format))
    }
}

/// A HEST error source: the context shared by the MMI handler and the descriptor protocol.
///
/// Firmware error handling is single threaded and the handler is never armed before the descriptor is published, so
/// interior mutability is through [`RefCell`]. A borrow conflict is reported as [`RasError::Reentrant`].
#[derive(Debug)]
pub struct HestErrorSource<S: ErrorEventSource> {
    pub(crate) config: ErrorSourceConfig,
    pub(crate) region: RefCell<ErrorStatusRegion>,
    pub(crate) source: RefCell<S>,
}

impl<S: ErrorEventSource> HestErrorSource<S> {
    /// Creates an error source publishing into `region`.
    ///
    /// Returns [`RasError::SectionTooLarge`] when the region was laid out for a smaller section than the source
    /// produces.
    pub fn new(config: ErrorSourceConfig, region: ErrorStatusRegion, source: S) -> Result<Self, RasError> {
        if region.max_section_length() < S::MAX_SECTION_LENGTH {
            log::error!(
                target: "ras",
                "Error source {:#x}: region holds {:#x} byte sections, source needs {:#x}",
                config.source_id,
                region.max_section_length(),
                S::MAX_SECTION_LENGTH
            );
            return Err(RasError::SectionTooLarge);
        }

        Ok(Self { config, region: RefCell::new(region), source: RefCell::new(source) })
    }

    /// Creates an error source over the firmware reserved memory named in `config`.
    ///
    /// # Safety
    ///
    /// See [`ErrorSourceConfig::region`].
    pub unsafe fn from_config(config: ErrorSourceConfig, source: S) -> Result<Self, RasError> {
        // SAFETY: The caller upholds the requirements of `ErrorSourceConfig::region`.
        let region = unsafe { config.region(S::MAX_SECTION_LENGTH) }?;
        Self::new(config, region, source)
    }

    /// The configuration of this source.
    pub fn config(&self) -> &ErrorSourceConfig {
        &self.config
    }

    /// Runs `f` with the error status region.
    pub fn with_region<T>(&self, f: impl FnOnce(&ErrorStatusRegion) -> T) -> Result<T, RasError> {
        let region = self.region.try_borrow().map_err(|_| RasError::Reentrant)?;
        Ok(f(&region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SramRecordFormat, mmio::MockErrorRecordRegisters};
    use mockall::{Sequence, predicate::eq};
    use patina_cper::ErrorSeverity;
    extern crate std;
    use std::{boxed::Box, vec};

    const FORMAT: SramRecordFormat = SramRecordFormat {
        status_offset: 0x10,
        code_offset: 0x18,
        address_offset: 0x20,
        ce_bit: 1 << 0,
        ue_bit: 1 << 1,
        multibit_shift: 4,
        multibit_mask: 0x3,
        multibit_ce: 1,
        multibit_ue: 2,
    };

    const SRAM: SramConfig = SramConfig { secure_record_base: 0x1000, non_secure_record_base: 0x2000, format: FORMAT };

    fn config() -> ErrorSourceConfig {
        ErrorSourceConfig::new(0x10, 0x20, efi::Guid::from_fields(1, 2, 3, 4, 5, &[6; 6]), 0, 0)
    }

    fn region(max_section_length: usize) -> ErrorStatusRegion {
        let memory = Box::leak(vec![0u8; ErrorStatusRegion::required_size(max_section_length)].into_boxed_slice());
        ErrorStatusRegion::new(memory, max_section_length).unwrap()
    }

    #[test]
    fn test_sram_capture_reads_and_clears_bank() {
        let mut registers = MockErrorRecordRegisters::new();
        let mut seq = Sequence::new();
        registers.expect_read32().with(eq(0x2010)).times(1).in_sequence(&mut seq).return_const(0x1u32);
        registers.expect_read32().with(eq(0x2018)).times(1).in_sequence(&mut seq).return_const(0u32);
        registers.expect_read32().with(eq(0x2020)).times(1).in_sequence(&mut seq).return_const(0x8000_0040u32);
        registers.expect_write32().with(eq(0x2010), eq(0x1u32)).times(1).in_sequence(&mut seq).return_const(());

        let mut source = SramErrorSource::new(SRAM, registers);
        let event = SramErrorEvent { non_secure: SramErrorEvent::NON_SECURE };
        let encoded = source.capture(event.as_bytes()).unwrap();

        assert_eq!(encoded.summary.severity, ErrorSeverity::Corrected);
        let address = encoded.section.physical_address;
        assert_eq!(address, 0x8000_0040);
    }

    #[test]
    fn test_sram_capture_selects_secure_bank() {
        let mut registers = MockErrorRecordRegisters::new();
        registers.expect_read32().withf(|address| (0x1000..0x1100).contains(address)).times(3).returning(
            |address| match address {
                0x1010 => 0x2,
                0x1018 => 0x2 << 4,
                _ => 0x40,
            },
        );
        registers.expect_write32().with(eq(0x1010), eq(0x2u32)).times(1).return_const(());

        let mut source = SramErrorSource::new(SRAM, registers);
        let encoded = source.capture(SramErrorEvent { non_secure: 0 }.as_bytes()).unwrap();

        assert_eq!(encoded.summary.severity, ErrorSeverity::Fatal);
        assert!(encoded.summary.block_status.multiple_uncorrectable());
    }

    #[test]
    fn test_cpu_capture_rejects_short_event() {
        let mut source = CpuErrorSource;
        let event = [0u8; CpuErrorSnapshot::SIZE - 1];
        assert_eq!(source.capture(&event).err(), Some(RasError::BadBufferSize));
    }

    #[test]
    fn test_source_constants() {
        assert_eq!(CpuErrorSource::MAX_SECTION_LENGTH, 864);
        assert_eq!(CpuErrorSource::EVENT_SIZE, 624);
        assert_eq!(CpuErrorSource::SECTION_TYPE, arm::SECTION_GUID);
        assert_eq!(SramErrorSource::<MockErrorRecordRegisters>::MAX_SECTION_LENGTH, 80);
        assert_eq!(SramErrorSource::<MockErrorRecordRegisters>::EVENT_SIZE, 8);
    }

    #[test]
    fn test_hest_error_source_rejects_small_region() {
        let result = HestErrorSource::new(config(), region(80), CpuErrorSource);
        assert_eq!(result.err(), Some(RasError::SectionTooLarge));

        let source = HestErrorSource::new(config(), region(864), CpuErrorSource).unwrap();
        assert_eq!(source.config().source_id, 0x10);
        assert_eq!(source.with_region(|r| r.max_section_length()), Ok(864));
    }

    #[test]
    fn test_sram_bank_selection_requires_exact_non_secure_value() {
        for (non_secure, base) in [(1u64, 0x2000u64), (0, 0x1000), (2, 0x1000), (0x101, 0x1000), (u64::MAX, 0x1000)] {
            let mut registers = MockErrorRecordRegisters::new();
            registers
                .expect_read32()
                .withf(move |address| (base..base + 0x100).contains(address))
                .times(3)
                .return_const(0u32);
            registers.expect_write32().with(eq(base + 0x10), eq(0u32)).times(1).return_const(());

            let mut source = SramErrorSource::new(SRAM, registers);
            assert!(source.capture(SramErrorEvent { non_secure }.as_bytes()).is_ok());
        }
    }
}
