//! Common Platform Error Record (CPER) and HEST wire structures
//!
//! This crate defines the byte-exact structures a firmware-first error handler writes into memory shared with the
//! operating system, and the Hardware Error Source Table (HEST) descriptor that tells the operating system where that
//! memory lives.
//!
//! ```text
//!  error status region (firmware reserved memory)
//! ┌──────────────────────────────┐
//! │ GenericErrorStatus    (20 B) │  block status, severity, data length
//! ├──────────────────────────────┤
//! │ GenericErrorDataEntry (72 B) │  section type GUID, severity, flags
//! ├──────────────────────────────┤
//! │ section data                 │  ARM processor error section or
//! │                              │  platform memory error section
//! └──────────────────────────────┘
//! ```
//!
//! All structures are `#[repr(C, packed)]` and derive the `zerocopy` traits, so they can be written into and read
//! back from unaligned firmware memory without `unsafe`. Fields of packed structures must be copied into locals before
//! a reference is taken.
//!
//! ## Specification References
//!
//! - UEFI Specification 2.9, Appendix N (Common Platform Error Record)
//! - ACPI Specification 6.4, Section 18.3.2 (Hardware Error Source Table)
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

#![cfg_attr(not(test), no_std)]

pub mod arm;
pub mod error_status;
pub mod hest;
pub mod memory;

pub use error_status::{BlockStatus, ErrorSeverity, GenericErrorDataEntry, GenericErrorStatus};
