//! HEST error source descriptor provider.
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use patina_cper::hest::{GenericAddress, Ghesv2ErrorSource, HardwareErrorNotification};
use zerocopy::IntoBytes;

use crate::{
    error::RasError,
    region::ErrorStatusRegion,
    source::{ErrorEventSource, HestErrorSource},
};

/// Number of descriptors each error source publishes.
pub const DESCRIPTOR_COUNT: usize = 1;

/// Total length of the descriptors each error source publishes.
pub const DESCRIPTORS_LENGTH: usize = DESCRIPTOR_COUNT * Ghesv2ErrorSource::SIZE;

impl<S: ErrorEventSource> HestErrorSource<S> {
    /// Returns the error source descriptors.
    ///
    /// `length` and `count` always receive the total length and number of descriptors. Without a `buffer` the call
    /// is a sizing probe that has no side effects. With a `buffer` of at least `length` bytes the error status region
    /// is initialized, if it was not already, and the descriptor is written into the buffer.
    ///
    /// ## Errors
    ///
    /// * [`RasError::InvalidParameter`] - `length` or `count` is absent.
    /// * [`RasError::BufferTooSmall`] - `buffer` is absent or shorter than `length`. Expected for the sizing probe.
    /// * [`RasError::Reentrant`] - the source is handling an event.
    pub fn get_descriptors(
        &self,
        buffer: Option<&mut [u8]>,
        length: Option<&mut usize>,
        count: Option<&mut usize>,
    ) -> Result<(), RasError> {
        let (Some(length), Some(count)) = (length, count) else {
            return Err(RasError::InvalidParameter);
        };

        *length = DESCRIPTORS_LENGTH;
        *count = DESCRIPTOR_COUNT;

        let Some(buffer) = buffer else {
            return Err(RasError::BufferTooSmall);
        };
        if buffer.len() < DESCRIPTORS_LENGTH {
            return Err(RasError::BufferTooSmall);
        }

        let mut region = self.region.try_borrow_mut().map_err(|_| RasError::Reentrant)?;
        region.initialize();

        let descriptor = self.descriptor_for(&region);
        descriptor.write_to_prefix(buffer).map_err(|_| RasError::BufferTooSmall)?;

        log::info!(
            target: "ras",
            "Published GHESv2 error source {:#x} notified through SDEI event {:#x}",
            self.config.source_id,
            self.config.sdei_event
        );
        Ok(())
    }

    /// The descriptor this source published.
    ///
    /// Returns [`RasError::NotReady`] until [`HestErrorSource::get_descriptors`] has initialized the region, as the
    /// registers the descriptor points at hold no valid addresses before that.
    pub fn descriptor(&self) -> Result<Ghesv2ErrorSource, RasError> {
        self.with_region(|region| region.is_initialized().then(|| self.descriptor_for(region)))?
            .ok_or(RasError::NotReady)
    }

    fn descriptor_for(&self, region: &ErrorStatusRegion) -> Ghesv2ErrorSource {
        Ghesv2ErrorSource {
            source_type: Ghesv2ErrorSource::TYPE,
            source_id: self.config.source_id,
            related_source_id: Ghesv2ErrorSource::NO_RELATED_SOURCE,
            flags: 0,
            enabled: 1,
            number_of_records_to_preallocate: 1,
            max_sections_per_record: 1,
            max_raw_data_length: region.max_section_length() as u32,
            error_status_address: GenericAddress::system_memory_qword(region.status_register_address()),
            notification_structure: HardwareErrorNotification::sdei(self.config.sdei_event),
            error_status_block_length: region.status_block_length() as u32,
            read_ack_register: GenericAddress::system_memory_qword(region.ack_register_address()),
            read_ack_preserve: 0,
            read_ack_write: 0,
        }
    }
}
