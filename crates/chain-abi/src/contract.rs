use crate::errors::AbiError;
use crate::header::Header;
use rlp::{DecoderError, Rlp, RlpStream};

/// A deployed contract: its ABI header and WASM bytecode. On the wire the
/// header is RLP-encoded once into an opaque byte string and embedded
/// inside the outer two-field list, rather than being flattened into the
/// contract's own field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub header: Header,
    pub code: Vec<u8>,
}

impl Contract {
    pub fn new(header: Header, code: Vec<u8>) -> Self {
        Contract { header, code }
    }

    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AbiError> {
        if bytes.is_empty() {
            return Err(AbiError::EmptyContract);
        }
        Ok(rlp::decode(bytes)?)
    }
}

impl rlp::Encodable for Contract {
    fn rlp_append(&self, s: &mut RlpStream) {
        let header_bytes = self.header.encode();
        s.begin_list(2);
        s.append(&header_bytes);
        s.append(&self.code);
    }
}

impl rlp::Decodable for Contract {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let header_bytes: Vec<u8> = rlp.val_at(0)?;
        let header = Header::decode(&header_bytes)
            .map_err(|_| DecoderError::Custom("malformed nested contract header"))?;
        let code: Vec<u8> = rlp.val_at(1)?;
        Ok(Contract { header, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Function;
    use crate::parameter::Parameter;
    use crate::primitive_type::PrimitiveType;

    fn sample() -> Contract {
        let mut header = Header::new(1);
        header.add_function(Function::new(
            "init",
            vec![Parameter::new("owner", PrimitiveType::Address)],
        ));
        Contract::new(header, vec![0x00, 0x61, 0x73, 0x6d])
    }

    #[test]
    fn encode_decode_roundtrip() {
        let contract = sample();
        let bytes = contract.encode();
        let decoded = Contract::decode(&bytes).unwrap();
        assert_eq!(contract, decoded);
    }

    #[test]
    fn header_is_nested_as_opaque_bytes() {
        let contract = sample();
        let bytes = contract.encode();
        let rlp = Rlp::new(&bytes);
        assert_eq!(rlp.item_count().unwrap(), 2);
        let header_bytes: Vec<u8> = rlp.val_at(0).unwrap();
        assert_eq!(header_bytes, contract.header.encode());
    }

    #[test]
    fn empty_bytes_is_rejected() {
        assert!(Contract::decode(&[]).is_err());
    }
}
