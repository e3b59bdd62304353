//! Hashing, signatures and address encoding shared by every other crate in
//! the execution core.
//!
//! - [`hash`] — Blake2b-256, the chain's sole hash function.
//! - [`address`] — the 35-byte versioned, checksummed account address.
//! - [`signature`] — Ed25519 key pairs and signatures.
//! - [`method_id`] — the 4-byte method/event discriminator used on the wire.
//! - [`crc16`] / [`base32`] — the two codecs address encoding is built from.

pub mod address;
pub mod base32;
pub mod crc16;
pub mod errors;
pub mod hash;
pub mod method_id;
pub mod signature;

pub use address::{Address, ADDRESS_LENGTH, ADDRESS_VERSION, EMPTY_ADDRESS};
pub use errors::CryptoError;
pub use hash::{blake2b_256, blake2b_256_concat, Hash, EMPTY_HASH, EMPTY_TRIE_ROOT};
pub use method_id::MethodId;
pub use signature::{KeyPair, PublicKey, Signature};
