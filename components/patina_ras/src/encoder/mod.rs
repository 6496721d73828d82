//! Record encoders.
//!
//! Encoders are pure: they turn a hardware error snapshot into a section and the summary the error status header and
//! data entry are built from. There is no failure path, malformed hardware data is translated as reported.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

pub mod cpu;
pub mod memory;

use patina_cper::{BlockStatus, ErrorSeverity};
use zerocopy::{Immutable, IntoBytes};

pub use cpu::{CpuErrorSection, CpuErrorSnapshot, encode_cpu_error};
pub use memory::{MemoryErrorSection, SramErrorRecord, encode_memory_error};

/// The per-event values of the error status header and data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSummary {
    /// Severity of both the status block and the data entry.
    pub severity: ErrorSeverity,
    /// Block status without the entry count, which the region fills in.
    pub block_status: BlockStatus,
    /// Data entry flags, see [`patina_cper::GenericErrorDataEntry`].
    pub flags: u8,
}

/// An encoded section together with its summary.
#[derive(Debug, Clone, Copy)]
pub struct EncodedSection<S> {
    /// Values for the status header and data entry.
    pub summary: SectionSummary,
    /// The section data.
    pub section: S,
}

impl<S: IntoBytes + Immutable> EncodedSection<S> {
    /// The section data as written into the error status region.
    pub fn bytes(&self) -> &[u8] {
        self.section.as_bytes()
    }
}
