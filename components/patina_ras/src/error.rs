//! Error types for error source operations
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: Apache-2.0
//!

use r_efi::efi;

/// Error source operation errors
///
/// Hardware error data is never rejected, so every variant describes a caller, configuration or MM core problem.
#[derive(Debug, Clone, PartialEq)]
pub enum RasError {
    // Caller errors
    /// A required buffer, size or count was not provided
    InvalidParameter,
    /// The communication buffer is smaller than the event the source expects
    BadBufferSize,
    /// The descriptor buffer is absent or smaller than the required length
    BufferTooSmall,

    // Configuration errors
    /// The error status region cannot hold the status block and the Ack-Data register
    RegionTooSmall,
    /// A section is larger than the maximum the region was laid out for
    SectionTooLarge,

    // State errors
    /// An event arrived before the region was initialized by publishing the descriptor
    NotReady,
    /// The error source was entered while it was already handling an event
    Reentrant,

    // MM core errors
    /// An MM core service failed with the given status
    Mm(efi::Status),
}

impl From<RasError> for efi::Status {
    fn from(error: RasError) -> Self {
        match error {
            RasError::InvalidParameter => efi::Status::INVALID_PARAMETER,
            RasError::BadBufferSize => efi::Status::BAD_BUFFER_SIZE,
            RasError::BufferTooSmall => efi::Status::BUFFER_TOO_SMALL,
            RasError::RegionTooSmall => efi::Status::OUT_OF_RESOURCES,
            RasError::SectionTooLarge => efi::Status::BAD_BUFFER_SIZE,
            RasError::NotReady => efi::Status::NOT_READY,
            RasError::Reentrant => efi::Status::ACCESS_DENIED,
            RasError::Mm(status) => status,
        }
    }
}

/// Converts a `Result` into the status returned across the C ABI.
pub(crate) fn to_status(result: Result<(), RasError>) -> efi::Status {
    match result {
        Ok(()) => efi::Status::SUCCESS,
        Err(error) => error.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ras_error_status_mapping() {
        assert_eq!(efi::Status::from(RasError::InvalidParameter), efi::Status::INVALID_PARAMETER);
        assert_eq!(efi::Status::from(RasError::BadBufferSize), efi::Status::BAD_BUFFER_SIZE);
        assert_eq!(efi::Status::from(RasError::BufferTooSmall), efi::Status::BUFFER_TOO_SMALL);
        assert_eq!(efi::Status::from(RasError::RegionTooSmall), efi::Status::OUT_OF_RESOURCES);
        assert_eq!(efi::Status::from(RasError::NotReady), efi::Status::NOT_READY);
        assert_eq!(efi::Status::from(RasError::Reentrant), efi::Status::ACCESS_DENIED);
        assert_eq!(efi::Status::from(RasError::Mm(efi::Status::NOT_FOUND)), efi::Status::NOT_FOUND);
    }

    #[test]
    fn test_to_status() {
        assert_eq!(to_status(Ok(())), efi::Status::SUCCESS);
        assert_eq!(to_status(Err(RasError::NotReady)), efi::Status::NOT_READY);
    }

    #[test]
    fn test_ras_error_clone_and_eq() {
        let error = RasError::Mm(efi::Status::OUT_OF_RESOURCES);
        assert_eq!(error.clone(), error);
        assert_ne!(RasError::BufferTooSmall, RasError::BadBufferSize);
    }
}
