//! Firmware-first hardware error sources for Patina MM
//!
//! This crate turns hardware error snapshots delivered to an MMI handler into Common Platform Error Records in
//! firmware reserved memory, and publishes a HEST GHESv2 error source descriptor that tells the operating system where
//! that memory is and how it is notified.
//!
//! # Architecture Overview
//!
//! ```text
//!          boot                                          runtime
//!  ┌───────────────────────┐                   ┌───────────────────────┐
//!  │  HEST table builder   │                   │   hardware error      │
//!  └──────────┬────────────┘                   │   (MMI + comm buffer) │
//!             │ GetErrorSourceDescriptors      └──────────┬────────────┘
//!             ▼                                           ▼
//!  ┌───────────────────────┐                   ┌───────────────────────┐
//!  │ descriptor protocol   │                   │  MmiHandler::handle   │
//!  └──────────┬────────────┘                   └──────────┬────────────┘
//!             │                                           │
//!             ▼                                           ▼
//!  ┌─────────────────────────────────────────────────────────────────────┐
//!  │                      HestErrorSource<S>                             │
//!  │  get_descriptors()               handle_event()                     │
//!  │        │                          │  ErrorEventSource::capture()    │
//!  │        │                          │  (encoder: CPU or RAM section)  │
//!  │        ▼                          ▼                                 │
//!  │  ┌───────────────────────────────────────────────────────────────┐  │
//!  │  │ ErrorStatusRegion: Ack-Register, Status-Register,             │  │
//!  │  │                    Status-Data, Ack-Data                      │  │
//!  │  └───────────────────────────────────────────────────────────────┘  │
//!  └─────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼  SDEI notification
//!                          operating system reads the CPER record
//! ```
//!
//! The descriptor must be published before the handler can report anything: publishing initializes the error status
//! region, and an event that arrives earlier is rejected with `EFI_NOT_READY`.
//!
//! # Usage
//!
//! ```ignore
//! use patina_ras::{
//!     component::install_error_source,
//!     config::ErrorSourceConfig,
//!     source::{CpuErrorSource, HestErrorSource},
//! };
//!
//! let config = ErrorSourceConfig::new(SOURCE_ID, SDEI_EVENT, CPU_ERROR_HANDLER_GUID, REGION_BASE, REGION_SIZE);
//! // SAFETY: The region is firmware reserved memory owned by this error source.
//! let source = unsafe { HestErrorSource::from_config(config, CpuErrorSource) }?;
//! install_error_source(&mut mm_services, Box::leak(Box::new(source)))?;
//! ```
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

#![cfg_attr(all(not(feature = "std"), not(test), not(feature = "mockall")), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod component;
pub mod config;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod mmio;
pub mod protocol;
pub mod region;
pub mod source;

pub use error::RasError;
pub use handler::MmiHandler;
pub use region::ErrorStatusRegion;
pub use source::{CpuErrorSource, ErrorEventSource, HestErrorSource, SramErrorSource};
