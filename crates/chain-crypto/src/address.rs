use crate::base32;
use crate::crc16;
use crate::errors::CryptoError;
use crate::hash::blake2b_256;
use crate::signature::PublicKey;
use std::fmt;

/// Version byte stamped on every address. `11 << 3` so that the base32
/// encoding of an address always starts with `L`.
pub const ADDRESS_VERSION: u8 = 11 << 3;

/// Total wire length of an address: version (1) + public key (32) + CRC16 (2).
pub const ADDRESS_LENGTH: usize = 35;

/// A chain account address: version byte, raw Ed25519 public key and a
/// CRC16 checksum over the first 33 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

/// The zero address, used as the receiver of a contract-deployment transaction.
pub const EMPTY_ADDRESS: Address = Address([0u8; ADDRESS_LENGTH]);

impl Address {
    /// Build the address for a public key, computing and appending its checksum.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let mut payload = Vec::with_capacity(33);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&public_key.0);
        let checksum = crc16::checksum(&payload);

        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[..33].copy_from_slice(&payload);
        bytes[33..].copy_from_slice(&checksum);
        Address(bytes)
    }

    /// Parse an address from its 35-byte wire form, validating version and checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes == [0u8; ADDRESS_LENGTH] || bytes.is_empty() {
            return Ok(EMPTY_ADDRESS);
        }
        Self::validate(bytes)?;
        let mut out = [0u8; ADDRESS_LENGTH];
        let len = bytes.len().min(ADDRESS_LENGTH);
        out[ADDRESS_LENGTH - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        Ok(Address(out))
    }

    /// Parse an address from its base32 text form.
    pub fn from_str(s: &str) -> Result<Self, CryptoError> {
        let raw = base32::decode(s).map_err(CryptoError::Base32Decode)?;
        if raw.len() < 3 {
            return Err(CryptoError::TooShort(raw.len()));
        }
        Self::validate(&raw)?;
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&raw);
        Ok(Address(bytes))
    }

    fn validate(raw: &[u8]) -> Result<(), CryptoError> {
        if raw.len() != ADDRESS_LENGTH {
            return Err(CryptoError::TooShort(raw.len()));
        }
        let version = raw[0];
        if version != ADDRESS_VERSION {
            return Err(CryptoError::UnexpectedVersion(version));
        }
        let payload = &raw[..33];
        let checksum = &raw[33..35];
        let expected = crc16::checksum(payload);
        if expected != checksum {
            return Err(CryptoError::ChecksumMismatch {
                expected,
                actual: [checksum[0], checksum[1]],
            });
        }
        Ok(())
    }

    /// The 32-byte public key embedded in the address.
    pub fn public_key(&self) -> PublicKey {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.0[1..33]);
        PublicKey(key)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Deterministic address for a contract deployed by `sender` at `nonce`,
    /// derived from `Blake2b-256(rlp([sender, nonce]))` treated as a public key.
    pub fn deployment_address(sender: &Address, nonce: u64) -> Self {
        let mut stream = rlp::RlpStream::new_list(2);
        stream.append(&sender.0.as_slice());
        stream.append(&nonce);
        let digest = blake2b_256(&stream.out());
        Self::from_public_key(&PublicKey(digest))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", base32::encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}
