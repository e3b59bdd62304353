use crate::errors::AbiError;
use chain_crypto::ADDRESS_LENGTH;
use rlp::{DecoderError, Rlp, RlpStream};

/// The scalar types a contract's functions and events can declare
/// parameters as. Matches the fixed set the host adapter knows how to
/// marshal to and from WASM linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Uint8 = 0x0,
    Uint16 = 0x1,
    Uint32 = 0x2,
    Uint64 = 0x3,
    Int8 = 0x4,
    Int16 = 0x5,
    Int32 = 0x6,
    Int64 = 0x7,
    Float32 = 0x8,
    Float64 = 0x9,
    Address = 0xa,
}

impl PrimitiveType {
    pub fn from_byte(b: u8) -> Result<Self, AbiError> {
        use PrimitiveType::*;
        Ok(match b {
            0x0 => Uint8,
            0x1 => Uint16,
            0x2 => Uint32,
            0x3 => Uint64,
            0x4 => Int8,
            0x5 => Int16,
            0x6 => Int32,
            0x7 => Int64,
            0x8 => Float32,
            0x9 => Float64,
            0xa => Address,
            _ => return Err(AbiError::TypeMismatch("unknown primitive type byte")),
        })
    }

    pub fn is_address(self) -> bool {
        matches!(self, PrimitiveType::Address)
    }

    pub fn is_pointer(self) -> bool {
        self.is_address()
    }

    /// Width, in bytes, of a single value of this type in linear memory.
    /// This is the one place a 64-bit read must stay a full 8 bytes: an
    /// earlier revision of this marshalling truncated Int64 the same way
    /// scalar event args are (mis)handled, which silently dropped the high
    /// 32 bits of any negative i64 argument.
    pub fn memory_size(self) -> usize {
        use PrimitiveType::*;
        match self {
            Address => ADDRESS_LENGTH,
            Uint8 | Int8 => 1,
            Uint16 | Int16 => 2,
            Uint32 | Int32 | Float32 => 4,
            Uint64 | Int64 | Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        use PrimitiveType::*;
        match self {
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Float32 => "float32",
            Float64 => "float64",
            Address => "address",
        }
    }
}

impl rlp::Encodable for PrimitiveType {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&(*self as u8));
    }
}

impl rlp::Decodable for PrimitiveType {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let byte: u8 = rlp.as_val()?;
        PrimitiveType::from_byte(byte).map_err(|_| DecoderError::Custom("unknown primitive type"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sizes_match_declared_widths() {
        assert_eq!(PrimitiveType::Uint8.memory_size(), 1);
        assert_eq!(PrimitiveType::Int64.memory_size(), 8);
        assert_eq!(PrimitiveType::Address.memory_size(), 35);
    }

    #[test]
    fn byte_roundtrip() {
        for b in 0..=0xa {
            let ty = PrimitiveType::from_byte(b).unwrap();
            assert_eq!(ty as u8, b);
        }
    }
}
