use chain_crypto::{blake2b_256, Address, Hash, MethodId, PublicKey, Signature};
use rlp::{DecoderError, Rlp, RlpStream};

/// Sender half of a transaction: the signer's raw public key and the nonce
/// the sender claims, checked against the account's stored nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSender {
    pub public_key: PublicKey,
    pub nonce: u64,
}

impl rlp::Encodable for TxSender {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.public_key.0.as_slice());
        s.append(&self.nonce);
    }
}

impl rlp::Decodable for TxSender {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let bytes: Vec<u8> = rlp.val_at(0)?;
        let public_key =
            PublicKey::from_bytes(&bytes).map_err(|_| DecoderError::Custom("bad public key"))?;
        Ok(TxSender {
            public_key,
            nonce: rlp.val_at(1)?,
        })
    }
}

/// Instructions for the execution engine: which method to invoke (by its
/// [`MethodId`]), its ABI-encoded arguments, and — for deployments — the
/// contract's code bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxPayload {
    pub id: MethodId,
    pub args: Vec<u8>,
    pub contract: Vec<u8>,
}

impl TxPayload {
    /// A deploy payload carries nonempty contract bytes.
    pub fn is_deploy(&self) -> bool {
        !self.contract.is_empty()
    }
}

impl rlp::Encodable for TxPayload {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.id.0.as_slice());
        s.append(&self.args);
        s.append(&self.contract);
    }
}

impl rlp::Decodable for TxPayload {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let id_bytes: Vec<u8> = rlp.val_at(0)?;
        if id_bytes.len() != 4 {
            return Err(DecoderError::Custom("method id must be 4 bytes"));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&id_bytes);
        Ok(TxPayload {
            id: MethodId(id),
            args: rlp.val_at(1)?,
            contract: rlp.val_at(2)?,
        })
    }
}

/// A signed request to execute a method on a contract, or to deploy one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u16,
    pub sender: TxSender,
    pub receiver: Address,
    pub payload: TxPayload,
    pub gas_price: u32,
    pub gas_limit: u32,
    pub signature: Vec<u8>,
}

impl rlp::Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(7);
        s.append(&self.version);
        s.append(&self.sender);
        s.append(&self.receiver.as_bytes().as_slice());
        s.append(&self.payload);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        s.append(&self.signature);
    }
}

impl rlp::Decodable for Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let receiver_bytes: Vec<u8> = rlp.val_at(2)?;
        let receiver = Address::from_bytes(&receiver_bytes)
            .map_err(|_| DecoderError::Custom("bad receiver address"))?;
        Ok(Transaction {
            version: rlp.val_at(0)?,
            sender: rlp.val_at(1)?,
            receiver,
            payload: rlp.val_at(3)?,
            gas_price: rlp.val_at(4)?,
            gas_limit: rlp.val_at(5)?,
            signature: rlp.val_at(6)?,
        })
    }
}

impl Transaction {
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(raw)
    }

    /// Hash used to key this transaction in storage. Includes the signature.
    pub fn hash(&self) -> Hash {
        blake2b_256(&self.encode())
    }

    /// Hash that gets signed: the full transaction minus its signature field.
    pub fn sig_hash(&self) -> Hash {
        let mut s = RlpStream::new_list(6);
        s.append(&self.version);
        s.append(&self.sender);
        s.append(&self.receiver.as_bytes().as_slice());
        s.append(&self.payload);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        blake2b_256(&s.out())
    }

    pub fn verify_signature(&self) -> bool {
        let Ok(signature) = <[u8; 64]>::try_from(self.signature.as_slice()) else {
            return false;
        };
        self.sender
            .public_key
            .verify(&self.sig_hash(), &Signature(signature))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_crypto::KeyPair;

    fn sample_tx(keypair: &KeyPair, nonce: u64) -> Transaction {
        let receiver = Address::from_public_key(&KeyPair::generate().public_key());
        let mut tx = Transaction {
            version: 1,
            sender: TxSender {
                public_key: keypair.public_key(),
                nonce,
            },
            receiver,
            payload: TxPayload {
                id: MethodId::from_name("transfer"),
                args: vec![1, 2, 3],
                contract: vec![],
            },
            gas_price: 1,
            gas_limit: 100_000,
            signature: vec![],
        };
        let sig = keypair.sign(&tx.sig_hash());
        tx.signature = sig.0.to_vec();
        tx
    }

    #[test]
    fn encode_decode_roundtrip() {
        let kp = KeyPair::generate();
        let tx = sample_tx(&kp, 4);
        let encoded = tx.encode();
        let decoded = Transaction::decode(&encoded).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn signature_verifies_against_sig_hash() {
        let kp = KeyPair::generate();
        let tx = sample_tx(&kp, 0);
        assert!(tx.verify_signature());
    }

    #[test]
    fn hash_includes_signature() {
        let kp = KeyPair::generate();
        let mut tx = sample_tx(&kp, 0);
        let h1 = tx.hash();
        tx.signature[0] ^= 0xff;
        let h2 = tx.hash();
        assert_ne!(h1, h2);
    }

    #[test]
    fn sig_hash_excludes_signature() {
        let kp = KeyPair::generate();
        let mut tx = sample_tx(&kp, 0);
        let h1 = tx.sig_hash();
        tx.signature[0] ^= 0xff;
        let h2 = tx.sig_hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn deploy_payload_detected_by_nonempty_contract() {
        let payload = TxPayload {
            id: MethodId::from_name("init"),
            args: vec![],
            contract: vec![0u8; 10],
        };
        assert!(payload.is_deploy());
    }
}
