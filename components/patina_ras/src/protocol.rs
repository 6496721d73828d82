//! MM HEST Error Source Descriptor Protocol
//!
//! C ABI binding of [`HestErrorSource::get_descriptors`]. The HEST table builder locates every instance of this
//! protocol, calls it once without a buffer to learn the descriptor length and count, allocates, and calls it again
//! to receive the descriptors.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::ffi::c_void;

use r_efi::efi;

use crate::{
    descriptor::DESCRIPTORS_LENGTH,
    error::{RasError, to_status},
    source::{ErrorEventSource, HestErrorSource},
};

/// GUID for the MM HEST Error Source Descriptor Protocol
pub const GUID: efi::Guid =
    efi::Guid::from_fields(0x560B_F236, 0xA4A8, 0x4D69, 0xBC, 0xF6, &[0xC2, 0x97, 0x24, 0x10, 0x9D, 0x91]);

/// Returns the error source descriptors of one error source.
///
/// `buffer` points to the caller's descriptor buffer pointer. When either pointer is null the call only reports the
/// length and count, returning `EFI_BUFFER_TOO_SMALL`. A non-null buffer must hold at least the reported length.
pub type GetErrorSourceDescriptors = extern "efiapi" fn(
    this: *const MmHestErrorSourceDescProtocol,
    buffer: *mut *mut c_void,
    length: *mut usize,
    count: *mut usize,
) -> efi::Status;

/// MM HEST Error Source Descriptor Protocol
#[repr(C)]
pub struct MmHestErrorSourceDescProtocol {
    /// Returns the descriptors of the error source that installed this interface.
    pub get_error_source_descriptors: GetErrorSourceDescriptors,
}

/// Protocol interface as installed: the public protocol followed by the error source it serves.
#[repr(C)]
pub(crate) struct ProtocolInterface<S: ErrorEventSource + 'static> {
    protocol: MmHestErrorSourceDescProtocol,
    source: &'static HestErrorSource<S>,
}

impl<S: ErrorEventSource + 'static> ProtocolInterface<S> {
    pub(crate) fn new(source: &'static HestErrorSource<S>) -> Self {
        Self {
            protocol: MmHestErrorSourceDescProtocol { get_error_source_descriptors: get_error_source_descriptors::<S> },
            source,
        }
    }
}

extern "efiapi" fn get_error_source_descriptors<S: ErrorEventSource + 'static>(
    this: *const MmHestErrorSourceDescProtocol,
    buffer: *mut *mut c_void,
    length: *mut usize,
    count: *mut usize,
) -> efi::Status {
    if this.is_null() {
        return efi::Status::INVALID_PARAMETER;
    }

    // SAFETY: Every installed instance of the protocol is the first field of a `ProtocolInterface<S>`, and the
    // function pointer is only reachable through that interface.
    let interface = unsafe { &*(this as *const ProtocolInterface<S>) };

    // SAFETY: Non-null pointers are provided by the caller per the protocol contract.
    let (length, count) = unsafe { (length.as_mut(), count.as_mut()) };

    // SAFETY: A non-null `buffer` points to the caller's buffer pointer.
    let descriptors = unsafe { buffer.as_ref() }.copied().unwrap_or(core::ptr::null_mut());
    let buffer = if descriptors.is_null() {
        None
    } else {
        // SAFETY: The caller allocated the buffer from the length reported by the sizing call.
        Some(unsafe { core::slice::from_raw_parts_mut(descriptors as *mut u8, DESCRIPTORS_LENGTH) })
    };

    let result = interface.source.get_descriptors(buffer, length, count);
    match &result {
        Ok(()) | Err(RasError::BufferTooSmall) => {}
        Err(error) => log::error!(target: "ras", "Failed to return error source descriptors: {:?}", error),
    }
    to_status(result)
}
