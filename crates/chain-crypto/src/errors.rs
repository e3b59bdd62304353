use thiserror::Error;

/// Errors produced while decoding or validating crypto primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("base32 decode failed: {0}")]
    Base32Decode(String),

    #[error("encoded value is {0} bytes; minimum valid length is 3")]
    TooShort(usize),

    #[error("unexpected address version {0:#x}")]
    UnexpectedVersion(u8),

    #[error("address checksum mismatch: expected {expected:?}, got {actual:?}")]
    ChecksumMismatch { expected: [u8; 2], actual: [u8; 2] },

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature bytes")]
    InvalidSignature,

    #[error("signature verification failed")]
    VerificationFailed,
}
