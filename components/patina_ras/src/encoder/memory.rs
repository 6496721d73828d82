//! RAM ECC error encoder.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use patina_cper::{BlockStatus, ErrorSeverity, memory::PlatformMemoryErrorData};

use super::{EncodedSection, SectionSummary};
use crate::config::SramRecordFormat;

/// The platform memory error section.
pub type MemoryErrorSection = PlatformMemoryErrorData;

/// Physical address mask reported with every RAM error.
pub const PHYSICAL_ADDRESS_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// Register values read from a RAM ECC error record bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SramErrorRecord {
    /// ERRSTATUS.
    pub status: u32,
    /// ERRCODE.
    pub code: u32,
    /// ERRADDR.
    pub address: u32,
}

/// Encodes a RAM ECC error record into a platform memory error section.
///
/// A record with neither the corrected nor the uncorrected bit set is still reported, as a fatal error with no
/// validity bits in the block status.
pub fn encode_memory_error(record: &SramErrorRecord, format: &SramRecordFormat) -> EncodedSection<MemoryErrorSection> {
    let corrected = record.status & format.ce_bit != 0;
    let uncorrectable = !corrected && record.status & format.ue_bit != 0;

    let (multibit_ce, multibit_ue) = if record.code != 0 {
        let multibit = (record.code >> format.multibit_shift) & format.multibit_mask;
        (multibit == format.multibit_ce, multibit == format.multibit_ue)
    } else {
        (false, false)
    };

    let section = PlatformMemoryErrorData {
        valid_fields: PlatformMemoryErrorData::VALID_PHYSICAL_ADDRESS
            | PlatformMemoryErrorData::VALID_PHYSICAL_ADDRESS_MASK,
        physical_address: record.address as u64,
        physical_address_mask: PHYSICAL_ADDRESS_MASK,
        ..Default::default()
    };

    let summary = SectionSummary {
        severity: if corrected { ErrorSeverity::Corrected } else { ErrorSeverity::Fatal },
        block_status: BlockStatus::new()
            .with_correctable(corrected)
            .with_uncorrectable(uncorrectable)
            .with_multiple_correctable(multibit_ce)
            .with_multiple_uncorrectable(multibit_ue),
        flags: 0,
    };

    log::trace!(target: "ras", "Encoded memory error: {:?} at {:#x}", summary.severity, record.address);

    EncodedSection { summary, section }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: SramRecordFormat = SramRecordFormat {
        status_offset: 0x0,
        code_offset: 0x8,
        address_offset: 0x10,
        ce_bit: 1 << 0,
        ue_bit: 1 << 1,
        multibit_shift: 8,
        multibit_mask: 0x3,
        multibit_ce: 0x1,
        multibit_ue: 0x2,
    };

    #[test]
    fn test_corrected_memory_error() {
        let record = SramErrorRecord { status: 0x1, code: 0, address: 0x8000_1000 };
        let encoded = encode_memory_error(&record, &FORMAT);

        assert_eq!(encoded.summary.severity, ErrorSeverity::Corrected);
        assert!(encoded.summary.block_status.correctable());
        assert!(!encoded.summary.block_status.uncorrectable());
        assert!(!encoded.summary.block_status.multiple_correctable());

        let valid = encoded.section.valid_fields;
        let address = encoded.section.physical_address;
        let mask = encoded.section.physical_address_mask;
        assert_eq!(valid, 0x6);
        assert_eq!(address, 0x8000_1000);
        assert_eq!(mask, 0xFFFF_FFFF_FFFF);
        assert_eq!(encoded.bytes().len(), 80);
    }

    #[test]
    fn test_uncorrectable_memory_error_is_fatal() {
        let record = SramErrorRecord { status: 0x2, code: 0x2 << 8, address: 0x4000 };
        let encoded = encode_memory_error(&record, &FORMAT);

        assert_eq!(encoded.summary.severity, ErrorSeverity::Fatal);
        assert!(encoded.summary.block_status.uncorrectable());
        assert!(encoded.summary.block_status.multiple_uncorrectable());
        assert!(!encoded.summary.block_status.multiple_correctable());
    }

    #[test]
    fn test_corrected_bit_wins_over_uncorrected() {
        let record = SramErrorRecord { status: 0x3, code: 0x1 << 8, address: 0 };
        let encoded = encode_memory_error(&record, &FORMAT);

        assert_eq!(encoded.summary.severity, ErrorSeverity::Corrected);
        assert!(!encoded.summary.block_status.uncorrectable());
        assert!(encoded.summary.block_status.multiple_correctable());
    }

    #[test]
    fn test_empty_status_still_reported() {
        let encoded = encode_memory_error(&SramErrorRecord::default(), &FORMAT);
        assert_eq!(encoded.summary.severity, ErrorSeverity::Fatal);
        assert_eq!(encoded.summary.block_status.bits(), 0);
        assert_eq!(encoded.summary.flags, 0);
    }
}
