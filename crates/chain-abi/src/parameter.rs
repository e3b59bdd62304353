use crate::primitive_type::PrimitiveType;
use rlp::{DecoderError, Rlp, RlpStream};

/// A single declared parameter of a function or event: its name (used only
/// for display and ABI lookups, not part of the MethodID), whether it is
/// an array, and its primitive element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub is_array: bool,
    pub ty: PrimitiveType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Parameter {
            name: name.into(),
            is_array: false,
            ty,
        }
    }

    pub fn new_array(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Parameter {
            name: name.into(),
            is_array: true,
            ty,
        }
    }
}

impl rlp::Encodable for Parameter {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.name);
        s.append(&self.is_array);
        s.append(&self.ty);
    }
}

impl rlp::Decodable for Parameter {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Parameter {
            name: rlp.val_at(0)?,
            is_array: rlp.val_at(1)?,
            ty: rlp.val_at(2)?,
        })
    }
}
