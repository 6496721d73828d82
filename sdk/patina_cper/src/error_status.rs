//! Generic Error Status Block structures.
//!
//! The Generic Error Status Block is the Status-Data a GHES/GHESv2 error source points the operating system at. It
//! is a [`GenericErrorStatus`] header followed by one [`GenericErrorDataEntry`] per section and the section data.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::mem;

use r_efi::efi;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Severity of an error, shared by the status block header and the section data entries.
///
/// ACPI 6.4, Table 18.11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorSeverity {
    /// Uncorrected error that the operating system may be able to recover from.
    Recoverable = 0,
    /// Uncorrected, unrecoverable error.
    Fatal = 1,
    /// Error corrected by hardware or firmware.
    Corrected = 2,
    /// No severity.
    None = 3,
}

impl ErrorSeverity {
    /// Returns the raw ACPI encoding of the severity.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ErrorSeverity {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Recoverable),
            1 => Ok(Self::Fatal),
            2 => Ok(Self::Corrected),
            3 => Ok(Self::None),
            other => Err(other),
        }
    }
}

/// Block Status field of the [`GenericErrorStatus`] header.
///
/// | bits   | meaning                        |
/// |--------|--------------------------------|
/// | 0      | uncorrectable error valid      |
/// | 1      | correctable error valid        |
/// | 2      | multiple uncorrectable errors  |
/// | 3      | multiple correctable errors    |
/// | 4..=13 | error data entry count         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockStatus(u32);

impl BlockStatus {
    /// At least one uncorrectable error is described by the block.
    pub const UNCORRECTABLE_ERROR_VALID: u32 = 1 << 0;
    /// At least one correctable error is described by the block.
    pub const CORRECTABLE_ERROR_VALID: u32 = 1 << 1;
    /// More than one uncorrectable error occurred.
    pub const MULTIPLE_UNCORRECTABLE_ERRORS: u32 = 1 << 2;
    /// More than one correctable error occurred.
    pub const MULTIPLE_CORRECTABLE_ERRORS: u32 = 1 << 3;

    const ENTRY_COUNT_SHIFT: u32 = 4;
    const ENTRY_COUNT_MASK: u32 = 0x3FF;

    /// Creates an empty block status.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Creates a block status from its raw encoding.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw encoding.
    pub const fn bits(self) -> u32 {
        self.0
    }

    const fn with_flag(self, flag: u32, set: bool) -> Self {
        if set { Self(self.0 | flag) } else { Self(self.0 & !flag) }
    }

    /// Sets or clears the uncorrectable error valid bit.
    pub const fn with_uncorrectable(self, set: bool) -> Self {
        self.with_flag(Self::UNCORRECTABLE_ERROR_VALID, set)
    }

    /// Sets or clears the correctable error valid bit.
    pub const fn with_correctable(self, set: bool) -> Self {
        self.with_flag(Self::CORRECTABLE_ERROR_VALID, set)
    }

    /// Sets or clears the multiple uncorrectable errors bit.
    pub const fn with_multiple_uncorrectable(self, set: bool) -> Self {
        self.with_flag(Self::MULTIPLE_UNCORRECTABLE_ERRORS, set)
    }

    /// Sets or clears the multiple correctable errors bit.
    pub const fn with_multiple_correctable(self, set: bool) -> Self {
        self.with_flag(Self::MULTIPLE_CORRECTABLE_ERRORS, set)
    }

    /// Sets the error data entry count. Counts wider than 10 bits are truncated.
    pub const fn with_entry_count(self, count: u16) -> Self {
        let cleared = self.0 & !(Self::ENTRY_COUNT_MASK << Self::ENTRY_COUNT_SHIFT);
        Self(cleared | ((count as u32 & Self::ENTRY_COUNT_MASK) << Self::ENTRY_COUNT_SHIFT))
    }

    /// Whether the uncorrectable error valid bit is set.
    pub const fn uncorrectable(self) -> bool {
        self.0 & Self::UNCORRECTABLE_ERROR_VALID != 0
    }

    /// Whether the correctable error valid bit is set.
    pub const fn correctable(self) -> bool {
        self.0 & Self::CORRECTABLE_ERROR_VALID != 0
    }

    /// Whether the multiple uncorrectable errors bit is set.
    pub const fn multiple_uncorrectable(self) -> bool {
        self.0 & Self::MULTIPLE_UNCORRECTABLE_ERRORS != 0
    }

    /// Whether the multiple correctable errors bit is set.
    pub const fn multiple_correctable(self) -> bool {
        self.0 & Self::MULTIPLE_CORRECTABLE_ERRORS != 0
    }

    /// Number of error data entries in the block.
    pub const fn entry_count(self) -> u16 {
        ((self.0 >> Self::ENTRY_COUNT_SHIFT) & Self::ENTRY_COUNT_MASK) as u16
    }
}

/// Generic Error Status Block header.
///
/// ACPI 6.4, Table 18.12.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct GenericErrorStatus {
    /// Raw [`BlockStatus`] encoding.
    pub block_status: u32,
    /// Offset of the raw data from the start of the block.
    pub raw_data_offset: u32,
    /// Length of the raw data in bytes.
    pub raw_data_length: u32,
    /// Length of the generic error data (data entries and their sections) in bytes.
    pub data_length: u32,
    /// Raw [`ErrorSeverity`] encoding.
    pub error_severity: u32,
}

impl GenericErrorStatus {
    /// Size of the header in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Creates the header for a block that carries exactly one data entry and no raw data.
    ///
    /// `data_length` is the total length of the data entry plus its section data.
    pub const fn single_entry(block_status: BlockStatus, data_length: u32, severity: ErrorSeverity) -> Self {
        Self {
            block_status: block_status.with_entry_count(1).bits(),
            raw_data_offset: (Self::SIZE + GenericErrorDataEntry::SIZE) as u32,
            raw_data_length: 0,
            data_length,
            error_severity: severity.as_u32(),
        }
    }

    /// Returns the decoded block status.
    pub const fn block_status(&self) -> BlockStatus {
        BlockStatus::from_bits(self.block_status)
    }
}

/// Generic Error Data Entry, the per-section descriptor that follows the status header.
///
/// ACPI 6.4, Table 18.13.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct GenericErrorDataEntry {
    /// Section type GUID identifying the schema of the section data.
    pub section_type: [u8; 16],
    /// Raw [`ErrorSeverity`] encoding.
    pub error_severity: u32,
    /// Revision of this structure.
    pub revision: u16,
    /// Validation bits for the FRU id, FRU text and timestamp fields.
    pub validation_bits: u8,
    /// Section flags, see the `FLAG_*` constants.
    pub flags: u8,
    /// Length of the section data in bytes.
    pub error_data_length: u32,
    /// Field replaceable unit identifier.
    pub fru_id: [u8; 16],
    /// Field replaceable unit text.
    pub fru_text: [u8; 20],
    /// Timestamp of the error.
    pub timestamp: u64,
}

impl GenericErrorDataEntry {
    /// Size of the data entry in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Data entry revision for ACPI 6.3 and later.
    pub const REVISION: u16 = 0x0300;

    /// The section is the primary section of the record.
    pub const FLAG_PRIMARY: u8 = 1 << 0;
    /// The error was not contained within the processor or memory hierarchy.
    pub const FLAG_CONTAINMENT_WARNING: u8 = 1 << 1;
    /// The component was reset.
    pub const FLAG_RESET: u8 = 1 << 2;
    /// The error threshold for the component was exceeded.
    pub const FLAG_ERROR_THRESHOLD_EXCEEDED: u8 = 1 << 3;
    /// The resource could not be accessed.
    pub const FLAG_RESOURCE_NOT_ACCESSIBLE: u8 = 1 << 4;
    /// The error was deferred and has not been consumed yet.
    pub const FLAG_LATENT_ERROR: u8 = 1 << 5;
    /// The error has been propagated.
    pub const FLAG_PROPAGATED: u8 = 1 << 6;
    /// Errors were lost because the error record overflowed.
    pub const FLAG_OVERFLOW: u8 = 1 << 7;

    /// Creates a data entry with no FRU information or timestamp.
    pub fn new(section_type: &efi::Guid, severity: ErrorSeverity, flags: u8, error_data_length: u32) -> Self {
        Self {
            section_type: *section_type.as_bytes(),
            error_severity: severity.as_u32(),
            revision: Self::REVISION,
            validation_bits: 0,
            flags,
            error_data_length,
            fru_id: [0; 16],
            fru_text: [0; 20],
            timestamp: 0,
        }
    }

    /// Returns the section type GUID.
    pub fn section_type(&self) -> efi::Guid {
        efi::Guid::from_bytes(&self.section_type)
    }
}

const _: () = assert!(GenericErrorStatus::SIZE == 20);
const _: () = assert!(GenericErrorDataEntry::SIZE == 72);
