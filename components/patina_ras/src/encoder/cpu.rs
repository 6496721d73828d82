//! Processor error encoder.
//!
//! Translates a snapshot of an AArch64 RAS error record (ERR<n>STATUS, ERR<n>MISC0, ERR<n>ADDR) and the register
//! context captured at the time of the error into an ARM processor error section.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::mem;

use patina_cper::{
    BlockStatus, ErrorSeverity, GenericErrorDataEntry,
    arm::{
        self, AARCH64_EL1_REGISTER_COUNT, AARCH64_EL2_REGISTER_COUNT, AARCH64_EL3_REGISTER_COUNT, AARCH64_GPR_COUNT,
        ArmProcessorContextInformation, ArmProcessorErrorInformation, ArmProcessorErrorRecord, CacheErrorInfo,
        ProcessorErrorInfo, RegisterContextType, TlbErrorInfo, TransactionType,
    },
};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use super::{EncodedSection, SectionSummary};

/// ERR<n>STATUS fields.
pub mod status {
    /// Architecturally defined primary error code.
    pub const SERR_MASK: u64 = 0xFF;
    /// Poison.
    pub const PN: u64 = 1 << 22;
    /// Deferred error.
    pub const DE: u64 = 1 << 23;
    /// Corrected error, two bits.
    pub const CE_MASK: u64 = (1 << 24) | (1 << 25);
    /// Miscellaneous registers valid.
    pub const MV: u64 = 1 << 26;
    /// Overflow.
    pub const OF: u64 = 1 << 27;
    /// Status register valid.
    pub const V: u64 = 1 << 30;
    /// Address valid.
    pub const AV: u64 = 1 << 31;

    /// Primary error codes at or above this value are reported as TLB errors, lower codes as cache errors.
    pub const SERR_TLB_THRESHOLD: u64 = 0x08;
}

/// ERR<n>MISC0 fields.
pub mod misc0 {
    /// Level of the failing structure.
    pub const LEVEL_MASK: u64 = 0b1110;
    pub const LEVEL_SHIFT: u32 = 1;
    /// Corrected error count.
    pub const CE_COUNT_MASK: u64 = 0xFF_0000_0000;
    pub const CE_COUNT_SHIFT: u32 = 32;
}

/// Security state of the processor when the error was taken.
pub const SECURITY_STATE_SECURE: u64 = 0;
/// See [`SECURITY_STATE_SECURE`].
pub const SECURITY_STATE_NON_SECURE: u64 = 1;

const CONTEXT_INFO_NUM: usize = 3;

/// Snapshot of a processor error as delivered in the MMI communication buffer.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CpuErrorSnapshot {
    /// ERR<n>STATUS, see [`status`].
    pub status: u64,
    /// ERR<n>MISC0, see [`misc0`].
    pub misc0: u64,
    /// ERR<n>ADDR, the faulting physical address.
    pub address: u64,
    /// [`SECURITY_STATE_SECURE`] or [`SECURITY_STATE_NON_SECURE`].
    pub security_state: u64,
    /// X0-X30 and SP.
    pub gpr: [u64; AARCH64_GPR_COUNT],
    /// EL1 system registers.
    pub el1_registers: [u64; AARCH64_EL1_REGISTER_COUNT],
    /// EL2 system registers.
    pub el2_registers: [u64; AARCH64_EL2_REGISTER_COUNT],
    /// EL3 system registers. Captured but never published.
    pub el3_registers: [u64; AARCH64_EL3_REGISTER_COUNT],
}

impl CpuErrorSnapshot {
    /// Size of the snapshot in bytes.
    pub const SIZE: usize = mem::size_of::<Self>();

    /// Any of the corrected error bits is set.
    pub const fn is_correctable(&self) -> bool {
        self.status & status::CE_MASK != 0
    }

    /// The processor was in the non-secure state.
    pub const fn is_non_secure(&self) -> bool {
        self.security_state == SECURITY_STATE_NON_SECURE
    }
}

/// The ARM processor error section with one error information structure and three context structures.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct CpuErrorSection {
    pub record: ArmProcessorErrorRecord,
    pub error_info: ArmProcessorErrorInformation,
    /// GPR, EL1 and EL2 context, in that order. All zero for errors taken in the secure state.
    pub context: [ArmProcessorContextInformation; CONTEXT_INFO_NUM],
}

impl CpuErrorSection {
    /// Size of the section in bytes. Reported for every event regardless of security state.
    pub const SIZE: usize = mem::size_of::<Self>();
}

const _: () = assert!(CpuErrorSnapshot::SIZE == 624);
const _: () = assert!(CpuErrorSection::SIZE == 864);

fn classify(snapshot: &CpuErrorSnapshot) -> ProcessorErrorInfo {
    let corrected = snapshot.is_correctable();
    let level = ((snapshot.misc0 & misc0::LEVEL_MASK) >> misc0::LEVEL_SHIFT) as u8;

    if snapshot.status & status::SERR_MASK < status::SERR_TLB_THRESHOLD {
        ProcessorErrorInfo::Cache(CacheErrorInfo {
            transaction_type: TransactionType::Generic,
            operation: arm::OPERATION_GENERIC_ERROR,
            level,
            context_corrupt: false,
            corrected,
        })
    } else {
        ProcessorErrorInfo::Tlb(TlbErrorInfo {
            transaction_type: TransactionType::Generic,
            operation: arm::OPERATION_GENERIC_ERROR,
            level,
            context_corrupt: false,
            corrected,
        })
    }
}

fn error_information(snapshot: &CpuErrorSnapshot) -> ArmProcessorErrorInformation {
    let correctable = snapshot.is_correctable();
    let info = classify(snapshot);

    let multiple_error = if snapshot.status & status::DE != 0 {
        0
    } else {
        ((snapshot.misc0 & misc0::CE_COUNT_MASK) >> misc0::CE_COUNT_SHIFT) as u16
    };

    let flags = match (correctable, snapshot.status & status::OF != 0) {
        (true, true) => ArmProcessorErrorInformation::FLAG_OVERFLOW,
        (true, false) => 0,
        (false, _) => ArmProcessorErrorInformation::FLAG_FIRST_ERROR_CAPTURED,
    };

    ArmProcessorErrorInformation {
        version: ArmProcessorErrorInformation::VERSION,
        length: ArmProcessorErrorInformation::SIZE as u8,
        valid_fields: ArmProcessorErrorInformation::VALID_MULTIPLE_ERROR
            | ArmProcessorErrorInformation::VALID_FLAGS
            | ArmProcessorErrorInformation::VALID_ERROR_INFO
            | ArmProcessorErrorInformation::VALID_PHYSICAL_FAULT_ADDRESS,
        error_type: info.error_type() as u8,
        multiple_error,
        flags,
        error_info: info.to_bits(),
        virtual_fault_address: 0,
        physical_fault_address: snapshot.address,
    }
}

/// Encodes a processor error snapshot into an ARM processor error section.
///
/// Register context is copied only for errors taken in the non-secure state. For secure errors the context
/// structures stay zeroed and `context_info_num` is zero, while the section length stays at
/// [`CpuErrorSection::SIZE`] so the status block length never changes between events.
///
/// A CPER parser that walks the section by `context_info_num` sees the 792 zero bytes after the error information of
/// a secure report as trailing vendor specific data.
pub fn encode_cpu_error(snapshot: &CpuErrorSnapshot) -> EncodedSection<CpuErrorSection> {
    let correctable = snapshot.is_correctable();
    let non_secure = snapshot.is_non_secure();

    let mut section = CpuErrorSection::new_zeroed();

    let el1 = snapshot.el1_registers;
    section.record.valid_fields = ArmProcessorErrorRecord::VALID_MPIDR | ArmProcessorErrorRecord::VALID_RUNNING_STATE;
    section.record.err_info_num = 1;
    section.record.context_info_num = if non_secure { CONTEXT_INFO_NUM as u16 } else { 0 };
    section.record.section_length = CpuErrorSection::SIZE as u32;
    section.record.mpidr_el1 = el1[arm::EL1_MPIDR_INDEX];
    section.record.midr_el1 = el1[arm::EL1_MIDR_INDEX];
    section.record.running_state = 1;
    section.record.psci_state = 0;

    section.error_info = error_information(snapshot);

    if non_secure {
        let gpr = snapshot.gpr;
        let el2 = snapshot.el2_registers;
        section.context = [
            ArmProcessorContextInformation::new(RegisterContextType::Aarch64Gpr, &gpr),
            ArmProcessorContextInformation::new(RegisterContextType::Aarch64El1, &el1),
            ArmProcessorContextInformation::new(RegisterContextType::Aarch64El2, &el2),
        ];
    }

    let overflow = snapshot.status & status::OF != 0;
    let deferred = snapshot.status & status::DE != 0;
    let mut flags = 0;
    if correctable && overflow {
        flags |= GenericErrorDataEntry::FLAG_OVERFLOW;
    }
    if !correctable && deferred {
        flags |= GenericErrorDataEntry::FLAG_LATENT_ERROR;
    }

    let summary = SectionSummary {
        severity: if correctable { ErrorSeverity::Corrected } else { ErrorSeverity::Recoverable },
        block_status: BlockStatus::new().with_correctable(correctable).with_uncorrectable(!correctable),
        flags,
    };

    let error_type = section.error_info.error_type;
    log::trace!(
        target: "ras",
        "Encoded processor error: severity={:?}, type={}, non_secure={}",
        summary.severity,
        error_type,
        non_secure
    );

    EncodedSection { summary, section }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;

    fn snapshot(status: u64, security_state: u64) -> CpuErrorSnapshot {
        let mut snapshot = CpuErrorSnapshot::new_zeroed();
        snapshot.status = status;
        snapshot.address = 0xDEAD_0000;
        snapshot.security_state = security_state;

        let mut gpr = [0u64; AARCH64_GPR_COUNT];
        gpr.iter_mut().enumerate().for_each(|(i, r)| *r = 0x1000 + i as u64);
        let mut el1 = [0u64; AARCH64_EL1_REGISTER_COUNT];
        el1.iter_mut().enumerate().for_each(|(i, r)| *r = 0x2000 + i as u64);
        let mut el2 = [0u64; AARCH64_EL2_REGISTER_COUNT];
        el2.iter_mut().enumerate().for_each(|(i, r)| *r = 0x3000 + i as u64);
        snapshot.gpr = gpr;
        snapshot.el1_registers = el1;
        snapshot.el2_registers = el2;
        snapshot.el3_registers = [0xEEEE_EEEE; AARCH64_EL3_REGISTER_COUNT];
        snapshot
    }

    #[test]
    fn test_severity_is_corrected_only_when_correctable() {
        for bits in [0u64, 1 << 24, 1 << 25, status::CE_MASK, status::DE, status::OF, status::DE | status::OF] {
            let encoded = encode_cpu_error(&snapshot(bits, SECURITY_STATE_NON_SECURE));
            let correctable = bits & status::CE_MASK != 0;
            let expected = if correctable { ErrorSeverity::Corrected } else { ErrorSeverity::Recoverable };
            assert_eq!(encoded.summary.severity, expected);
            assert_eq!(encoded.summary.block_status.correctable(), correctable);
            assert_eq!(encoded.summary.block_status.uncorrectable(), !correctable);
        }
    }

    #[test]
    fn test_secure_error_has_zeroed_context() {
        let encoded = encode_cpu_error(&snapshot(status::CE_MASK | status::OF, SECURITY_STATE_SECURE));

        let context_info_num = encoded.section.record.context_info_num;
        let section_length = encoded.section.record.section_length;
        assert_eq!(context_info_num, 0);
        assert_eq!(section_length, 864);
        assert!(encoded.section.context.as_bytes().iter().all(|b| *b == 0));
        assert_eq!(encoded.bytes().len(), 864);
    }

    #[test]
    fn test_non_secure_error_copies_context() {
        let input = snapshot(status::CE_MASK, SECURITY_STATE_NON_SECURE);
        let encoded = encode_cpu_error(&input);

        let context_info_num = encoded.section.record.context_info_num;
        assert_eq!(context_info_num, 3);

        let context = encoded.section.context;
        let gpr = input.gpr;
        let el1 = input.el1_registers;
        let el2 = input.el2_registers;
        assert_eq!(&context[0].register_bytes()[..gpr.as_bytes().len()], gpr.as_bytes());
        assert_eq!(&context[1].register_bytes()[..el1.as_bytes().len()], el1.as_bytes());
        assert_eq!(&context[2].register_bytes()[..el2.as_bytes().len()], el2.as_bytes());

        let types: std::vec::Vec<u16> = context.iter().map(|c| c.register_context_type).collect();
        assert_eq!(types, [4, 5, 6]);

        // EL3 context never leaves firmware.
        let el3_bytes = 0xEEEE_EEEEu64.to_le_bytes();
        assert!(!encoded.bytes().windows(8).any(|w| w == el3_bytes));
    }

    #[test]
    fn test_correctable_overflow_scenario() {
        let encoded = encode_cpu_error(&snapshot(status::CE_MASK | status::OF, SECURITY_STATE_NON_SECURE));

        let info = encoded.section.error_info;
        let flags = info.flags;
        let address = info.physical_fault_address;
        let valid = info.valid_fields;
        assert_eq!(encoded.summary.severity, ErrorSeverity::Corrected);
        assert_eq!(flags, ArmProcessorErrorInformation::FLAG_OVERFLOW);
        assert_eq!(address, 0xDEAD_0000);
        assert_eq!(valid, 0x17);
        assert_eq!(encoded.summary.flags, GenericErrorDataEntry::FLAG_OVERFLOW);
    }

    #[test]
    fn test_secure_scenario_differs_only_in_context() {
        let non_secure = encode_cpu_error(&snapshot(status::CE_MASK | status::OF, SECURITY_STATE_NON_SECURE));
        let secure = encode_cpu_error(&snapshot(status::CE_MASK | status::OF, SECURITY_STATE_SECURE));

        assert_eq!(secure.summary, non_secure.summary);
        assert_eq!(secure.section.error_info.as_bytes(), non_secure.section.error_info.as_bytes());

        // The record header differs only in context_info_num.
        let mut expected = non_secure.section.record;
        expected.context_info_num = 0;
        assert_eq!(secure.section.record.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_uncorrectable_sets_first_error_captured() {
        let encoded = encode_cpu_error(&snapshot(status::OF, SECURITY_STATE_NON_SECURE));
        let flags = encoded.section.error_info.flags;
        assert_eq!(flags, ArmProcessorErrorInformation::FLAG_FIRST_ERROR_CAPTURED);
        assert_eq!(encoded.summary.flags, 0);

        let deferred = encode_cpu_error(&snapshot(status::DE, SECURITY_STATE_NON_SECURE));
        assert_eq!(deferred.summary.flags, GenericErrorDataEntry::FLAG_LATENT_ERROR);
    }

    #[test]
    fn test_correctable_without_overflow_has_no_flags() {
        let encoded = encode_cpu_error(&snapshot(1 << 24, SECURITY_STATE_NON_SECURE));
        let flags = encoded.section.error_info.flags;
        assert_eq!(flags, 0);
        assert_eq!(encoded.summary.flags, 0);
    }

    #[test]
    fn test_serr_threshold_boundary() {
        let below = encode_cpu_error(&snapshot(0x07, SECURITY_STATE_NON_SECURE));
        let at = encode_cpu_error(&snapshot(0x08, SECURITY_STATE_NON_SECURE));
        let above = encode_cpu_error(&snapshot(0xFF, SECURITY_STATE_NON_SECURE));

        let below_type = below.section.error_info.error_type;
        let at_type = at.section.error_info.error_type;
        let above_type = above.section.error_info.error_type;
        assert_eq!(below_type, arm::ProcessorErrorType::Cache as u8);
        assert_eq!(at_type, arm::ProcessorErrorType::Tlb as u8);
        assert_eq!(above_type, arm::ProcessorErrorType::Tlb as u8);
    }

    #[test]
    fn test_misc0_level_and_count() {
        let mut input = snapshot(status::CE_MASK | 0x09, SECURITY_STATE_NON_SECURE);
        input.misc0 = (0x2A << 32) | (3 << 1);
        let encoded = encode_cpu_error(&input);

        let info = encoded.section.error_info;
        let multiple_error = info.multiple_error;
        let bits = info.error_info;
        assert_eq!(multiple_error, 0x2A);
        assert_eq!((bits >> 22) & 0x7, 3);
        assert_ne!(bits & (1 << 26), 0);
        assert_eq!((bits >> 16) & 0x3, TransactionType::Generic as u64);

        input.status |= status::DE;
        let deferred = encode_cpu_error(&input);
        let multiple_error = deferred.section.error_info.multiple_error;
        assert_eq!(multiple_error, 0);
    }

    #[test]
    fn test_record_header_identity() {
        let encoded = encode_cpu_error(&snapshot(0, SECURITY_STATE_NON_SECURE));
        let record = encoded.section.record;
        let valid = record.valid_fields;
        let mpidr = record.mpidr_el1;
        let midr = record.midr_el1;
        let running = record.running_state;
        let psci = record.psci_state;
        let err_info_num = record.err_info_num;
        assert_eq!(valid, 0x5);
        assert_eq!(mpidr, 0x2006);
        assert_eq!(midr, 0x2005);
        assert_eq!(running, 1);
        assert_eq!(psci, 0);
        assert_eq!(err_info_num, 1);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let input = snapshot(status::CE_MASK | status::OF | 0x03, SECURITY_STATE_NON_SECURE);
        assert_eq!(encode_cpu_error(&input).bytes(), encode_cpu_error(&input).bytes());
    }
}
