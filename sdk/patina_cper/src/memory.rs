//! Platform Memory Error Section.
//!
//! UEFI Specification 2.9, Section N.2.5.
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

/// Section type GUID of the platform memory error section: A5BC1114-6F64-4EDE-B863-3E83ED7C83B1
pub const SECTION_GUID: efi::Guid =
    efi::Guid::from_fields(0xA5BC1114, 0x6F64, 0x4EDE, 0xB8, 0x63, &[0x3E, 0x83, 0xED, 0x7C, 0x83, 0xB1]);

/// Platform Memory Error Section.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PlatformMemoryErrorData {
    /// Validation bits, see the `VALID_*` constants.
    pub valid_fields: u64,
    /// Error status, UEFI Section N.2.2.
    pub error_status: u64,
    /// Physical address of the error.
    pub physical_address: u64,
    /// Mask of the valid bits of `physical_address`.
    pub physical_address_mask: u64,
    pub node: u16,
    pub card: u16,
    pub module_rank: u16,
    pub bank: u16,
    pub device: u16,
    pub row: u16,
    pub column: u16,
    pub bit_position: u16,
    pub requestor_id: u64,
    pub responder_id: u64,
    pub target_id: u64,
    /// Memory error type encoding.
    pub error_type: u8,
    /// Extended row bits and other extensions.
    pub extended: u8,
    pub rank_num: u16,
    pub card_handle: u16,
    pub module_handle: u16,
}

impl PlatformMemoryErrorData {
    /// Size of the section in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// `error_status` is valid.
    pub const VALID_ERROR_STATUS: u64 = 1 << 0;
    /// `physical_address` is valid.
    pub const VALID_PHYSICAL_ADDRESS: u64 = 1 << 1;
    /// `physical_address_mask` is valid.
    pub const VALID_PHYSICAL_ADDRESS_MASK: u64 = 1 << 2;
    /// `node` is valid.
    pub const VALID_NODE: u64 = 1 << 3;
    /// `card` is valid.
    pub const VALID_CARD: u64 = 1 << 4;
    /// `module_rank` is valid.
    pub const VALID_MODULE: u64 = 1 << 5;
    /// `bank` is valid.
    pub const VALID_BANK: u64 = 1 << 6;
    /// `device` is valid.
    pub const VALID_DEVICE: u64 = 1 << 7;
    /// `row` is valid.
    pub const VALID_ROW: u64 = 1 << 8;
    /// `column` is valid.
    pub const VALID_COLUMN: u64 = 1 << 9;
    /// `bit_position` is valid.
    pub const VALID_BIT_POSITION: u64 = 1 << 10;
    /// `error_type` is valid.
    pub const VALID_ERROR_TYPE: u64 = 1 << 14;
}

const _: () = assert!(PlatformMemoryErrorData::SIZE == 80);
