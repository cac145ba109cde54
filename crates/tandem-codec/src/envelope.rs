use serde::{Deserialize, Serialize};
use tandem_core::{TransferClass, TransferId, UserInfoRecord};

use crate::error::CodecError;

/// Envelope schema version for `TransferEnvelopeV1`.
pub const TRANSFER_ENVELOPE_V1_VERSION: u16 = 1;

/// Wire wrapper around one user-info transfer.
///
/// The identity and class travel beside the caller's record so the peer can
/// echo them back without touching the record content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEnvelopeV1 {
    /// Wire version.
    pub version: u16,
    /// Identity assigned by the sender at submit time.
    pub id: TransferId,
    /// Delivery class discriminator.
    pub class: TransferClass,
    /// Caller-visible record.
    pub user_info: UserInfoRecord,
}

impl TransferEnvelopeV1 {
    pub fn new(id: TransferId, class: TransferClass, user_info: UserInfoRecord) -> Self {
        Self {
            version: TRANSFER_ENVELOPE_V1_VERSION,
            id,
            class,
            user_info,
        }
    }

    /// Validates envelope schema.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.version != TRANSFER_ENVELOPE_V1_VERSION {
            return Err(CodecError::InvalidEnvelope("unsupported envelope version"));
        }
        Ok(())
    }
}

/// Encodes `TransferEnvelopeV1` as CBOR after validation.
pub fn encode_envelope_cbor(envelope: &TransferEnvelopeV1) -> Result<Vec<u8>, CodecError> {
    envelope.validate()?;
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(envelope, &mut bytes)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes and validates a CBOR transfer envelope.
pub fn decode_envelope_cbor(bytes: &[u8]) -> Result<TransferEnvelopeV1, CodecError> {
    let envelope: TransferEnvelopeV1 =
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    envelope.validate()?;
    Ok(envelope)
}

/// Encodes a generic message record as CBOR.
pub fn encode_message_cbor(message: &UserInfoRecord) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(message, &mut bytes)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a generic message record from CBOR.
pub fn decode_message_cbor(bytes: &[u8]) -> Result<UserInfoRecord, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
