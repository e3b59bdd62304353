use chain_crypto::{blake2b_256, Address, Hash, MethodId};
use rlp::{DecoderError, Rlp, RlpStream};

/// A side effect emitted while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: MethodId,
    pub args: Vec<u8>,
    pub contract: Address,
}

impl rlp::Encodable for Event {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.id.0.as_slice());
        s.append(&self.args);
        s.append(&self.contract.as_bytes().as_slice());
    }
}

impl rlp::Decodable for Event {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let id_bytes: Vec<u8> = rlp.val_at(0)?;
        if id_bytes.len() != 4 {
            return Err(DecoderError::Custom("method id must be 4 bytes"));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&id_bytes);
        let contract_bytes: Vec<u8> = rlp.val_at(2)?;
        let contract = Address::from_bytes(&contract_bytes)
            .map_err(|_| DecoderError::Custom("bad contract address"))?;
        Ok(Event {
            id: MethodId(id),
            args: rlp.val_at(1)?,
            contract,
        })
    }
}

/// Outcome of applying a transaction. Matches the wire values expected by
/// the consensus adapter and by light clients reading receipts back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiptCode {
    Ok = 0x0,
    OutOfGas = 0x1,
    IgniteError = 0x2,
    ContractNotFound = 0x3,
    MethodNotFound = 0x4,
}

impl ReceiptCode {
    pub fn is_ok(self) -> bool {
        matches!(self, ReceiptCode::Ok)
    }

    fn from_byte(byte: u8) -> Result<Self, DecoderError> {
        match byte {
            0x0 => Ok(ReceiptCode::Ok),
            0x1 => Ok(ReceiptCode::OutOfGas),
            0x2 => Ok(ReceiptCode::IgniteError),
            0x3 => Ok(ReceiptCode::ContractNotFound),
            0x4 => Ok(ReceiptCode::MethodNotFound),
            _ => Err(DecoderError::Custom("unknown receipt code")),
        }
    }
}

impl rlp::Encodable for ReceiptCode {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&(*self as u8));
    }
}

impl rlp::Decodable for ReceiptCode {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        ReceiptCode::from_byte(rlp.as_val()?)
    }
}

/// Result of applying a single transaction within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction: Hash,
    pub index: u32,
    pub result: u64,
    pub gas_used: u32,
    pub code: ReceiptCode,
    pub events: Vec<Event>,
    pub post_state: Hash,
}

impl rlp::Encodable for Receipt {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(7);
        s.append(&self.transaction.as_slice());
        s.append(&self.index);
        s.append(&self.result);
        s.append(&self.gas_used);
        s.append(&self.code);
        s.append_list(&self.events);
        s.append(&self.post_state.as_slice());
    }
}

impl rlp::Decodable for Receipt {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let tx_bytes: Vec<u8> = rlp.val_at(0)?;
        let transaction = to_hash(&tx_bytes)?;
        let post_bytes: Vec<u8> = rlp.val_at(6)?;
        let post_state = to_hash(&post_bytes)?;
        Ok(Receipt {
            transaction,
            index: rlp.val_at(1)?,
            result: rlp.val_at(2)?,
            gas_used: rlp.val_at(3)?,
            code: rlp.val_at(4)?,
            events: rlp.list_at(5)?,
            post_state,
        })
    }
}

fn to_hash(bytes: &[u8]) -> Result<Hash, DecoderError> {
    if bytes.len() != 32 {
        return Err(DecoderError::Custom("hash must be 32 bytes"));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(bytes);
    Ok(hash)
}

impl Receipt {
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(raw)
    }

    pub fn hash(&self) -> Hash {
        blake2b_256(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Receipt {
        Receipt {
            transaction: [1u8; 32],
            index: 0,
            result: 42,
            gas_used: 2100,
            code: ReceiptCode::Ok,
            events: vec![Event {
                id: MethodId::from_name("Transfer"),
                args: vec![9, 9],
                contract: chain_crypto::EMPTY_ADDRESS,
            }],
            post_state: [2u8; 32],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let receipt = sample();
        let encoded = receipt.encode();
        assert_eq!(Receipt::decode(&encoded).unwrap(), receipt);
    }

    #[test]
    fn failure_codes_are_not_ok() {
        assert!(!ReceiptCode::OutOfGas.is_ok());
        assert!(!ReceiptCode::IgniteError.is_ok());
        assert!(ReceiptCode::Ok.is_ok());
    }

    #[test]
    fn hash_changes_with_gas_used() {
        let mut r = sample();
        let h1 = r.hash();
        r.gas_used += 1;
        assert_ne!(h1, r.hash());
    }
}
