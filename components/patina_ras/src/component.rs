//! Error source registration.
//!
//! Wires a [`HestErrorSource`] into the MM core: the source is registered as the MMI handler for its configured GUID
//! and its descriptor protocol is installed for the HEST table builder to find.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use core::ffi::c_void;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use r_efi::efi;

use crate::{
    error::RasError,
    handler::MmiHandler,
    protocol::{self, ProtocolInterface},
    source::{ErrorEventSource, HestErrorSource},
};

extern crate alloc;
use alloc::boxed::Box;

/// MM core services needed to install an error source.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait MmServices {
    /// Registers `handler` for MMIs raised with `handler_type`, returning the dispatch handle.
    fn register_mmi_handler(
        &mut self,
        handler: &'static dyn MmiHandler,
        handler_type: efi::Guid,
    ) -> Result<efi::Handle, efi::Status>;

    /// Unregisters the handler identified by `dispatch_handle`.
    fn unregister_mmi_handler(&mut self, dispatch_handle: efi::Handle) -> Result<(), efi::Status>;

    /// Installs `interface` as an instance of the protocol `protocol` on a new handle.
    fn install_protocol_interface(
        &mut self,
        protocol: &efi::Guid,
        interface: *mut c_void,
    ) -> Result<efi::Handle, efi::Status>;
}

/// Installs an error source.
///
/// Registers the source as an MMI handler, then installs its HEST error source descriptor protocol. If the protocol
/// cannot be installed the handler is unregistered again, so a failed install leaves nothing behind.
///
/// Returns the handle the protocol was installed on.
pub fn install_error_source<S: ErrorEventSource + 'static>(
    mm: &mut impl MmServices,
    source: &'static HestErrorSource<S>,
) -> Result<efi::Handle, RasError> {
    let config = source.config();

    let dispatch_handle = mm.register_mmi_handler(source, config.mmi_handler_guid).map_err(|status| {
        log::error!(
            target: "ras",
            "Failed to register MMI handler for error source {:#x}: {:?}",
            config.source_id,
            status
        );
        RasError::Mm(status)
    })?;

    let interface = Box::into_raw(Box::new(ProtocolInterface::new(source)));
    match mm.install_protocol_interface(&protocol::GUID, interface as *mut c_void) {
        Ok(handle) => {
            log::info!(
                target: "ras",
                "Installed error source {:#x}: SDEI event {:#x}, region at {:#x}",
                config.source_id,
                config.sdei_event,
                source.with_region(|region| region.base()).unwrap_or_default()
            );
            Ok(handle)
        }
        Err(status) => {
            log::error!(
                target: "ras",
                "Failed to install descriptor protocol for error source {:#x}: {:?}",
                config.source_id,
                status
            );

            // SAFETY: `interface` came from `Box::into_raw` above and the MM core did not take ownership of it.
            drop(unsafe { Box::from_raw(interface) });

            if let Err(unregister_status) = mm.unregister_mmi_handler(dispatch_handle) {
                log::warn!(
                    target: "ras",
                    "Failed to unregister MMI handler for error source {:#x}: {:?}",
                    config.source_id,
                    unregister_status
                );
            }
            Err(RasError::Mm(status))
        }
    }
}
