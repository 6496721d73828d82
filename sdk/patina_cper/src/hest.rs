//! Hardware Error Source Table structures.
//!
//! Only the pieces a firmware-first error source publishes are defined here: the Generic Hardware Error Source
//! version 2 (GHESv2) descriptor and the Generic Address Structure and notification structure it embeds. Building and
//! installing the table itself is left to the platform.
//!
//! ACPI Specification 6.4, Section 18.3.2.8.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::mem;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// ACPI Generic Address Structure.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct GenericAddress {
    /// Address space of the register.
    pub address_space_id: u8,
    /// Width of the register in bits.
    pub register_bit_width: u8,
    /// Bit offset of the register at `address`.
    pub register_bit_offset: u8,
    /// Access size encoding.
    pub access_size: u8,
    /// Address of the register.
    pub address: u64,
}

impl GenericAddress {
    /// Size of the structure in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// System memory address space.
    pub const SYSTEM_MEMORY: u8 = 0;
    /// Quad word (64-bit) access size.
    pub const ACCESS_QWORD: u8 = 4;

    /// A 64-bit register in system memory, accessed as a quad word.
    pub const fn system_memory_qword(address: u64) -> Self {
        Self {
            address_space_id: Self::SYSTEM_MEMORY,
            register_bit_width: 64,
            register_bit_offset: 0,
            access_size: Self::ACCESS_QWORD,
            address,
        }
    }
}

/// Hardware Error Notification Structure.
///
/// ACPI 6.4, Table 18.14.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct HardwareErrorNotification {
    /// Notification type, see the `TYPE_*` constants.
    pub notification_type: u8,
    /// Length of this structure in bytes.
    pub length: u8,
    /// Which of the following fields the operating system may reconfigure.
    pub configuration_write_enable: u16,
    /// Polling interval in milliseconds, for polled notification.
    pub poll_interval: u32,
    /// Interrupt or event vector.
    pub vector: u32,
    pub switch_to_polling_threshold_value: u32,
    pub switch_to_polling_threshold_window: u32,
    pub error_threshold_value: u32,
    pub error_threshold_window: u32,
}

impl HardwareErrorNotification {
    /// Size of the structure in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Polled notification.
    pub const TYPE_POLLED: u8 = 0;
    /// External interrupt notification.
    pub const TYPE_EXTERNAL_INTERRUPT: u8 = 1;
    /// Software Delegated Exception notification.
    pub const TYPE_SDEI: u8 = 11;

    /// Notification through the Software Delegated Exception `event`.
    pub const fn sdei(event: u32) -> Self {
        Self {
            notification_type: Self::TYPE_SDEI,
            length: Self::SIZE as u8,
            configuration_write_enable: 0,
            poll_interval: 0,
            vector: event,
            switch_to_polling_threshold_value: 0,
            switch_to_polling_threshold_window: 0,
            error_threshold_value: 0,
            error_threshold_window: 0,
        }
    }
}

/// Generic Hardware Error Source version 2 descriptor.
///
/// ACPI 6.4, Table 18.15.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Ghesv2ErrorSource {
    /// Error source type, always [`Ghesv2ErrorSource::TYPE`].
    pub source_type: u16,
    /// Identifier of the error source.
    pub source_id: u16,
    /// Identifier of the related alternate error source, `0xFFFF` for none.
    pub related_source_id: u16,
    pub flags: u8,
    pub enabled: u8,
    pub number_of_records_to_preallocate: u32,
    pub max_sections_per_record: u32,
    /// Maximum length of the raw data, sized for the largest section.
    pub max_raw_data_length: u32,
    /// Location of the register holding the address of the error status block.
    pub error_status_address: GenericAddress,
    pub notification_structure: HardwareErrorNotification,
    /// Length of the error status block in bytes.
    pub error_status_block_length: u32,
    /// Location of the register the operating system acknowledges through.
    pub read_ack_register: GenericAddress,
    pub read_ack_preserve: u64,
    pub read_ack_write: u64,
}

impl Ghesv2ErrorSource {
    /// Size of the descriptor in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// HEST error source type of a GHESv2 descriptor.
    pub const TYPE: u16 = 10;

    /// No related error source.
    pub const NO_RELATED_SOURCE: u16 = 0xFFFF;
}

const _: () = assert!(GenericAddress::SIZE == 12);
const _: () = assert!(HardwareErrorNotification::SIZE == 28);
const _: () = assert!(Ghesv2ErrorSource::SIZE == 92);
