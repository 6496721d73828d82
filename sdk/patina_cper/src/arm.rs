//! ARM Processor Error Section.
//!
//! The section is an [`ArmProcessorErrorRecord`] header followed by `err_info_num` [`ArmProcessorErrorInformation`]
//! structures and `context_info_num` [`ArmProcessorContextInformation`] structures.
//!
//! UEFI Specification 2.9, Section N.2.4.4.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::mem;

use r_efi::efi;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// Section type GUID of the ARM processor error section: E19E3D16-BC11-11E4-9CAA-C2051D5D46B0
pub const SECTION_GUID: efi::Guid =
    efi::Guid::from_fields(0xE19E3D16, 0xBC11, 0x11E4, 0x9C, 0xAA, &[0xC2, 0x05, 0x1D, 0x5D, 0x46, 0xB0]);

/// Number of 64-bit registers in the AArch64 general purpose register context (X0-X30, SP).
pub const AARCH64_GPR_COUNT: usize = 32;
/// Number of 64-bit registers in the AArch64 EL1 system register context.
pub const AARCH64_EL1_REGISTER_COUNT: usize = 17;
/// Number of 64-bit registers in the AArch64 EL2 system register context.
pub const AARCH64_EL2_REGISTER_COUNT: usize = 15;
/// Number of 64-bit registers in the AArch64 EL3 system register context.
pub const AARCH64_EL3_REGISTER_COUNT: usize = 10;

/// Index of MIDR_EL1 in the AArch64 EL1 register context.
pub const EL1_MIDR_INDEX: usize = 5;
/// Index of MPIDR_EL1 in the AArch64 EL1 register context.
pub const EL1_MPIDR_INDEX: usize = 6;

/// Number of 64-bit words reserved for a register array. Sized for the largest fixed register context.
pub const REGISTER_ARRAY_WORDS: usize = AARCH64_GPR_COUNT;

/// ARM Processor Error Record, the header of the section.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ArmProcessorErrorRecord {
    /// Validation bits, see the `VALID_*` constants.
    pub valid_fields: u32,
    /// Number of error information structures that follow.
    pub err_info_num: u16,
    /// Number of context information structures that follow the error information.
    pub context_info_num: u16,
    /// Total length of the section in bytes.
    pub section_length: u32,
    /// Error affinity level.
    pub error_affinity_level: u8,
    /// Reserved.
    pub reserved: [u8; 3],
    /// MPIDR_EL1 of the processor that reported the error.
    pub mpidr_el1: u64,
    /// MIDR_EL1 of the processor that reported the error.
    pub midr_el1: u64,
    /// Bit 0 set when the processor is running.
    pub running_state: u32,
    /// PSCI state of the processor when it is not running.
    pub psci_state: u32,
}

impl ArmProcessorErrorRecord {
    /// Size of the record header in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// `mpidr_el1` is valid.
    pub const VALID_MPIDR: u32 = 1 << 0;
    /// `error_affinity_level` is valid.
    pub const VALID_ERROR_AFFINITY_LEVEL: u32 = 1 << 1;
    /// `running_state` is valid.
    pub const VALID_RUNNING_STATE: u32 = 1 << 2;
    /// Vendor specific information is present.
    pub const VALID_VENDOR_SPECIFIC_INFO: u32 = 1 << 3;
}

/// Type of an [`ArmProcessorErrorInformation`] structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorErrorType {
    /// Cache error.
    Cache = 0,
    /// Translation lookaside buffer error.
    Tlb = 1,
    /// Bus error.
    Bus = 2,
    /// Micro-architectural error.
    MicroArchitectural = 3,
}

/// Transaction type of a cache or TLB error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionType {
    /// Instruction fetch.
    Instruction = 0,
    /// Data access.
    DataAccess = 1,
    /// Generic transaction.
    Generic = 2,
}

/// Cache error information.
///
/// The operation field uses the cache operation encoding, where 0 is "generic error".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheErrorInfo {
    /// Type of the failing transaction.
    pub transaction_type: TransactionType,
    /// Cache operation encoding.
    pub operation: u8,
    /// Cache level.
    pub level: u8,
    /// Processor context may have been corrupted.
    pub context_corrupt: bool,
    /// The error was corrected.
    pub corrected: bool,
}

/// TLB error information.
///
/// The operation field uses the TLB operation encoding, where 0 is "generic error".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbErrorInfo {
    /// Type of the failing transaction.
    pub transaction_type: TransactionType,
    /// TLB operation encoding.
    pub operation: u8,
    /// TLB level.
    pub level: u8,
    /// Processor context may have been corrupted.
    pub context_corrupt: bool,
    /// The error was corrected.
    pub corrected: bool,
}

/// Operation code for a generic cache or TLB error.
pub const OPERATION_GENERIC_ERROR: u8 = 0;

// Cache and TLB error information share one bit layout.
const INFO_TRANSACTION_TYPE_VALID: u64 = 1 << 0;
const INFO_OPERATION_VALID: u64 = 1 << 1;
const INFO_LEVEL_VALID: u64 = 1 << 2;
const INFO_CONTEXT_CORRUPT_VALID: u64 = 1 << 3;
const INFO_CORRECTED_VALID: u64 = 1 << 4;
const INFO_TRANSACTION_TYPE_SHIFT: u32 = 16;
const INFO_OPERATION_SHIFT: u32 = 18;
const INFO_LEVEL_SHIFT: u32 = 22;
const INFO_CONTEXT_CORRUPT: u64 = 1 << 25;
const INFO_CORRECTED: u64 = 1 << 26;

fn encode_info(
    transaction_type: TransactionType,
    operation: u8,
    level: u8,
    context_corrupt: bool,
    corrected: bool,
) -> u64 {
    let mut bits = INFO_TRANSACTION_TYPE_VALID
        | INFO_OPERATION_VALID
        | INFO_LEVEL_VALID
        | INFO_CONTEXT_CORRUPT_VALID
        | INFO_CORRECTED_VALID;
    bits |= (transaction_type as u64 & 0x3) << INFO_TRANSACTION_TYPE_SHIFT;
    bits |= (operation as u64 & 0xF) << INFO_OPERATION_SHIFT;
    bits |= (level as u64 & 0x7) << INFO_LEVEL_SHIFT;
    if context_corrupt {
        bits |= INFO_CONTEXT_CORRUPT;
    }
    if corrected {
        bits |= INFO_CORRECTED;
    }
    bits
}

/// The type-specific payload of an [`ArmProcessorErrorInformation`] structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorErrorInfo {
    /// Cache error information.
    Cache(CacheErrorInfo),
    /// TLB error information.
    Tlb(TlbErrorInfo),
}

impl ProcessorErrorInfo {
    /// The error type tag matching the payload.
    pub const fn error_type(&self) -> ProcessorErrorType {
        match self {
            Self::Cache(_) => ProcessorErrorType::Cache,
            Self::Tlb(_) => ProcessorErrorType::Tlb,
        }
    }

    /// Encodes the payload into the 64-bit error information field.
    pub fn to_bits(&self) -> u64 {
        match self {
            Self::Cache(info) => {
                encode_info(info.transaction_type, info.operation, info.level, info.context_corrupt, info.corrected)
            }
            Self::Tlb(info) => {
                encode_info(info.transaction_type, info.operation, info.level, info.context_corrupt, info.corrected)
            }
        }
    }
}

/// ARM Processor Error Information structure.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ArmProcessorErrorInformation {
    /// Structure version.
    pub version: u8,
    /// Structure length in bytes.
    pub length: u8,
    /// Validation bits, see the `VALID_*` constants.
    pub valid_fields: u16,
    /// Raw [`ProcessorErrorType`] encoding.
    pub error_type: u8,
    /// Number of errors that occurred, or zero when unknown.
    pub multiple_error: u16,
    /// Flags, see the `FLAG_*` constants.
    pub flags: u8,
    /// Encoded [`ProcessorErrorInfo`].
    pub error_info: u64,
    /// Virtual address of the fault.
    pub virtual_fault_address: u64,
    /// Physical address of the fault.
    pub physical_fault_address: u64,
}

impl ArmProcessorErrorInformation {
    /// Size of the structure in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Structure version.
    pub const VERSION: u8 = 0;

    /// `multiple_error` is valid.
    pub const VALID_MULTIPLE_ERROR: u16 = 1 << 0;
    /// `flags` is valid.
    pub const VALID_FLAGS: u16 = 1 << 1;
    /// `error_info` is valid.
    pub const VALID_ERROR_INFO: u16 = 1 << 2;
    /// `virtual_fault_address` is valid.
    pub const VALID_VIRTUAL_FAULT_ADDRESS: u16 = 1 << 3;
    /// `physical_fault_address` is valid.
    pub const VALID_PHYSICAL_FAULT_ADDRESS: u16 = 1 << 4;

    /// This is the first error captured.
    pub const FLAG_FIRST_ERROR_CAPTURED: u8 = 1 << 0;
    /// This is the last error captured.
    pub const FLAG_LAST_ERROR_CAPTURED: u8 = 1 << 1;
    /// The error was propagated.
    pub const FLAG_PROPAGATED: u8 = 1 << 2;
    /// Error information was lost due to an overflow.
    pub const FLAG_OVERFLOW: u8 = 1 << 3;
}

/// Register context type of an [`ArmProcessorContextInformation`] structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RegisterContextType {
    /// AArch32 general purpose registers.
    Aarch32Gpr = 0,
    /// AArch32 EL1 context registers.
    Aarch32El1 = 1,
    /// AArch32 EL2 context registers.
    Aarch32El2 = 2,
    /// AArch32 secure context registers.
    Aarch32Secure = 3,
    /// AArch64 general purpose registers.
    Aarch64Gpr = 4,
    /// AArch64 EL1 context registers.
    Aarch64El1 = 5,
    /// AArch64 EL2 context registers.
    Aarch64El2 = 6,
    /// AArch64 EL3 context registers.
    Aarch64El3 = 7,
    /// Miscellaneous system register structure.
    Miscellaneous = 8,
}

/// ARM Processor Context Information structure with a fixed-size register array.
///
/// The register array is sized for the largest fixed context, smaller contexts occupy its leading words and the
/// remainder stays zero.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct ArmProcessorContextInformation {
    /// Structure version.
    pub version: u16,
    /// Raw [`RegisterContextType`] encoding.
    pub register_context_type: u16,
    /// Size of the register array in bytes.
    pub register_array_size: u32,
    /// Register array.
    pub register_array: [u64; REGISTER_ARRAY_WORDS],
}

impl ArmProcessorContextInformation {
    /// Size of the structure in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Size of the register array in bytes.
    pub const REGISTER_ARRAY_SIZE: usize = REGISTER_ARRAY_WORDS * mem::size_of::<u64>();

    /// Creates a context structure holding a copy of `registers`.
    ///
    /// Registers beyond [`REGISTER_ARRAY_WORDS`] are dropped.
    pub fn new(context_type: RegisterContextType, registers: &[u64]) -> Self {
        let mut context = Self::new_zeroed();
        context.register_context_type = context_type as u16;
        context.register_array_size = Self::REGISTER_ARRAY_SIZE as u32;

        let mut array = [0u64; REGISTER_ARRAY_WORDS];
        let count = registers.len().min(REGISTER_ARRAY_WORDS);
        array[..count].copy_from_slice(&registers[..count]);
        context.register_array = array;
        context
    }

    /// Returns the register array as raw bytes.
    pub fn register_bytes(&self) -> &[u8] {
        &self.as_bytes()[8..]
    }
}

const _: () = assert!(ArmProcessorErrorRecord::SIZE == 40);
const _: () = assert!(ArmProcessorErrorInformation::SIZE == 32);
const _: () = assert!(ArmProcessorContextInformation::SIZE == 8 + 256);
