use crate::hash::blake2b_256;
use std::fmt;

/// First 4 bytes of `Blake2b-256(name)`. Used on the wire instead of the
/// method or event name itself, so headers can be matched without carrying
/// strings through the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MethodId(pub [u8; 4]);

impl MethodId {
    pub fn from_name(name: &str) -> Self {
        let digest = blake2b_256(name.as_bytes());
        let mut id = [0u8; 4];
        id.copy_from_slice(&digest[..4]);
        MethodId(id)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 4]> for MethodId {
    fn from(bytes: [u8; 4]) -> Self {
        MethodId(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_id_is_deterministic() {
        assert_eq!(MethodId::from_name("init"), MethodId::from_name("init"));
    }

    #[test]
    fn distinct_names_give_distinct_ids() {
        assert_ne!(MethodId::from_name("init"), MethodId::from_name("transfer"));
    }
}
