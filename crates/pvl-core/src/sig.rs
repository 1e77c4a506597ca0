//! Signature identifiers and the signature-opening collaborator.

use crate::error::{ProofError, ProofStatus};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const SIG_ID_LEN: usize = 32;
const SIG_ID_SHORT_LEN: usize = 27;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SignatureError(pub String);

impl From<SignatureError> for ProofError {
    fn from(err: SignatureError) -> Self {
        ProofError::new(ProofStatus::BadSignature, format!("Bad signature: {err}"))
    }
}

/// Hex signature id: a 32-byte digest, optionally followed by a type suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SigId {
    hex: String,
    digest: [u8; SIG_ID_LEN],
}

impl SigId {
    pub fn from_hex(hex: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(hex)
            .map_err(|err| SignatureError(format!("sig id {hex:?} is not hex: {err}")))?;
        let digest: [u8; SIG_ID_LEN] = bytes
            .get(..SIG_ID_LEN)
            .and_then(|head| head.try_into().ok())
            .ok_or_else(|| {
                SignatureError(format!(
                    "sig id {hex:?} is shorter than {SIG_ID_LEN} bytes"
                ))
            })?;
        Ok(Self {
            hex: hex.to_string(),
            digest,
        })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn to_medium_id(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.digest)
    }

    pub fn to_short_id(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.digest[..SIG_ID_SHORT_LEN])
    }
}

impl fmt::Display for SigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl TryFrom<String> for SigId {
    type Error = SignatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SigId::from_hex(&value)
    }
}

impl From<SigId> for String {
    fn from(value: SigId) -> Self {
        value.hex
    }
}

/// Signature payload and id recovered from an armored signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedSignature {
    pub body: Vec<u8>,
    pub sig_id: SigId,
}

/// Parses and verifies armored signatures. Cryptography lives behind this
/// boundary; the interpreter only consumes the result.
pub trait SignatureOpener: Send + Sync {
    fn open_signature(&self, armored: &str) -> Result<OpenedSignature, SignatureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff0f";

    #[test]
    fn derives_medium_and_short_ids() {
        let id = SigId::from_hex(HEX).unwrap();
        let digest = hex::decode(&HEX[..64]).unwrap();
        assert_eq!(id.to_medium_id(), URL_SAFE_NO_PAD.encode(&digest));
        assert_eq!(id.to_short_id(), URL_SAFE_NO_PAD.encode(&digest[..27]));
        assert_eq!(id.to_short_id().len(), 36);
        assert_eq!(id.to_string(), HEX);
    }

    #[test]
    fn rejects_short_or_non_hex_ids() {
        assert!(SigId::from_hex("abcd").is_err());
        assert!(SigId::from_hex(&"zz".repeat(33)).is_err());
    }

    #[test]
    fn signature_errors_become_bad_signature() {
        let err: ProofError = SignatureError("armor truncated".into()).into();
        assert_eq!(err.status, ProofStatus::BadSignature);
        assert_eq!(err.desc, "Bad signature: armor truncated");
    }
}
