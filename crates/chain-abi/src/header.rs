use crate::errors::AbiError;
use crate::parameter::Parameter;
use chain_crypto::MethodId;
use rlp::{DecoderError, Rlp, RlpStream};
use std::collections::BTreeMap;

/// A declared function of a contract: its name and parameter list. The
/// name is hashed into a [`MethodId`] after decoding; it is not itself an
/// RLP field of the wire form's map key, only of each list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

impl Function {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Function {
            name: name.into(),
            parameters,
        }
    }

    pub fn method_id(&self) -> MethodId {
        MethodId::from_name(&self.name)
    }
}

impl rlp::Encodable for Function {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.name);
        s.append_list(&self.parameters);
    }
}

impl rlp::Decodable for Function {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Function {
            name: rlp.val_at(0)?,
            parameters: rlp.list_at(1)?,
        })
    }
}

/// A declared event of a contract: same shape as [`Function`], kept as a
/// distinct type since events and functions occupy independent MethodID
/// namespaces within a [`Header`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
}

impl EventDecl {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        EventDecl {
            name: name.into(),
            parameters,
        }
    }

    pub fn method_id(&self) -> MethodId {
        MethodId::from_name(&self.name)
    }
}

impl rlp::Encodable for EventDecl {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.name);
        s.append_list(&self.parameters);
    }
}

impl rlp::Decodable for EventDecl {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(EventDecl {
            name: rlp.val_at(0)?,
            parameters: rlp.list_at(1)?,
        })
    }
}

/// A contract's ABI: its functions and events keyed by MethodID. Wire form
/// is `{version, functions: [Function...], events: [EventDecl...]}` with
/// both lists in MethodID order; a `BTreeMap<MethodId, _>` gives that order
/// for free on encode and lets decode reject duplicate MethodIDs cheaply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub functions: BTreeMap<MethodId, Function>,
    pub events: BTreeMap<MethodId, EventDecl>,
}

impl Header {
    pub fn new(version: u16) -> Self {
        Header {
            version,
            functions: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.method_id(), function);
    }

    pub fn add_event(&mut self, event: EventDecl) {
        self.events.insert(event.method_id(), event);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.get_function_by_id(&MethodId::from_name(name))
    }

    pub fn get_function_by_id(&self, id: &MethodId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn get_event(&self, name: &str) -> Option<&EventDecl> {
        self.events.get(&MethodId::from_name(name))
    }

    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AbiError> {
        Ok(rlp::decode(bytes)?)
    }
}

impl rlp::Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.version);
        s.append_list(&self.functions.values().cloned().collect::<Vec<_>>());
        s.append_list(&self.events.values().cloned().collect::<Vec<_>>());
    }
}

impl rlp::Decodable for Header {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let version: u16 = rlp.val_at(0)?;
        let function_list: Vec<Function> = rlp.list_at(1)?;
        let event_list: Vec<EventDecl> = rlp.list_at(2)?;

        let mut functions = BTreeMap::new();
        for function in function_list {
            let id = function.method_id();
            if functions.insert(id, function).is_some() {
                return Err(DecoderError::Custom("duplicated function method id"));
            }
        }

        let mut events = BTreeMap::new();
        for event in event_list {
            let id = event.method_id();
            if events.insert(id, event).is_some() {
                return Err(DecoderError::Custom("duplicated event method id"));
            }
        }

        Ok(Header {
            version,
            functions,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive_type::PrimitiveType;

    fn sample_header() -> Header {
        let mut header = Header::new(1);
        header.add_function(Function::new(
            "transfer",
            vec![
                Parameter::new("to", PrimitiveType::Address),
                Parameter::new("amount", PrimitiveType::Uint64),
            ],
        ));
        header.add_function(Function::new("init", vec![]));
        header.add_event(EventDecl::new(
            "Transferred",
            vec![Parameter::new("amount", PrimitiveType::Uint64)],
        ));
        header
    }

    #[test]
    fn encode_decode_roundtrip() {
        let header = sample_header();
        let bytes = header.encode();
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn functions_wire_order_is_method_id_sorted() {
        let header = sample_header();
        let encoded: Vec<Function> = header.functions.values().cloned().collect();
        let mut by_id = encoded.clone();
        by_id.sort_by_key(|f| f.method_id());
        assert_eq!(encoded, by_id);
    }

    #[test]
    fn lookup_by_name_and_by_id_agree() {
        let header = sample_header();
        let by_name = header.get_function("transfer").unwrap();
        let by_id = header
            .get_function_by_id(&MethodId::from_name("transfer"))
            .unwrap();
        assert_eq!(by_name, by_id);
    }

    #[test]
    fn duplicated_function_method_id_is_rejected() {
        let mut s = RlpStream::new_list(3);
        s.append(&1u16);
        s.append_list(&[
            Function::new("transfer", vec![]),
            Function::new("transfer", vec![Parameter::new("x", PrimitiveType::Uint8)]),
        ]);
        let no_events: Vec<EventDecl> = vec![];
        s.append_list(&no_events);
        let bytes = s.out();
        assert!(Header::decode(&bytes).is_err());
    }
}
