//! Error event handler.
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
    error::{RasError, to_status},
    source::{ErrorEventSource, HestErrorSource},
};

/// An MMI handler.
///
/// Mirrors the shape of a PI MMI handler: the dispatch handle and context are passed through from the MM core, and
/// the communication buffer and its size are optional.
pub trait MmiHandler {
    /// Handles one MMI.
    fn handle(
        &self,
        dispatch_handle: efi::Handle,
        context: *const c_void,
        buffer: Option<&mut [u8]>,
        size: Option<&mut usize>,
    ) -> efi::Status;
}

impl<S: ErrorEventSource> HestErrorSource<S> {
    /// Handles one error event.
    ///
    /// `buffer` carries the event payload and `size` its length. On success the error report is published in the
    /// error status region and `size` is set to zero, as nothing is returned to the caller. On failure the region is
    /// left untouched.
    ///
    /// ## Errors
    ///
    /// * [`RasError::InvalidParameter`] - `buffer` or `size` is absent.
    /// * [`RasError::BadBufferSize`] - the payload is smaller than the event the source expects.
    /// * [`RasError::NotReady`] - the descriptor has not been published yet.
    /// * [`RasError::Reentrant`] - the source is already handling an event.
    pub fn handle_event(&self, buffer: Option<&[u8]>, size: Option<&mut usize>) -> Result<(), RasError> {
        let buffer = buffer.ok_or(RasError::InvalidParameter)?;
        let size = size.ok_or(RasError::InvalidParameter)?;

        if *size < S::EVENT_SIZE || buffer.len() < S::EVENT_SIZE {
            log::debug!(target: "ras", "Error event of {:#x} bytes, expected {:#x}", *size, S::EVENT_SIZE);
            return Err(RasError::BadBufferSize);
        }

        let mut region = self.region.try_borrow_mut().map_err(|_| RasError::Reentrant)?;
        if !region.is_initialized() {
            log::warn!(
                target: "ras",
                "Error source {:#x} received an event before its descriptor was published",
                self.config.source_id
            );
            return Err(RasError::NotReady);
        }

        let mut source = self.source.try_borrow_mut().map_err(|_| RasError::Reentrant)?;
        let encoded = source.capture(&buffer[..S::EVENT_SIZE])?;
        region.write_report(&encoded.summary, &S::SECTION_TYPE, encoded.bytes())?;

        *size = 0;
        Ok(())
    }
}

impl<S: ErrorEventSource> MmiHandler for HestErrorSource<S> {
    fn handle(
        &self,
        _dispatch_handle: efi::Handle,
        _context: *const c_void,
        buffer: Option<&mut [u8]>,
        size: Option<&mut usize>,
    ) -> efi::Status {
        let status = to_status(self.handle_event(buffer.as_deref(), size));
        if status.is_error() {
            log::debug!(target: "ras", "Error source {:#x} handler returned {:?}", self.config.source_id, status);
        }
        status
    }
}
