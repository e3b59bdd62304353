use crate::errors::AbiError;
use crate::primitive_type::PrimitiveType;
use chain_crypto::Address;

/// A typed argument value, scalar or array, matching one of the
/// [`PrimitiveType`] variants. This is the Rust-side counterpart to the
/// raw byte blobs that actually cross the wire and the WASM boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Address(Address),
    U8Array(Vec<u8>),
    U16Array(Vec<u16>),
    U32Array(Vec<u32>),
    U64Array(Vec<u64>),
    I8Array(Vec<i8>),
    I16Array(Vec<i16>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    AddressArray(Vec<Address>),
}

impl ArgValue {
    pub fn is_array(&self) -> bool {
        use ArgValue::*;
        matches!(
            self,
            U8Array(_)
                | U16Array(_)
                | U32Array(_)
                | U64Array(_)
                | I8Array(_)
                | I16Array(_)
                | I32Array(_)
                | I64Array(_)
                | F32Array(_)
                | F64Array(_)
                | AddressArray(_)
        )
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        use ArgValue::*;
        match self {
            U8(_) | U8Array(_) => PrimitiveType::Uint8,
            U16(_) | U16Array(_) => PrimitiveType::Uint16,
            U32(_) | U32Array(_) => PrimitiveType::Uint32,
            U64(_) | U64Array(_) => PrimitiveType::Uint64,
            I8(_) | I8Array(_) => PrimitiveType::Int8,
            I16(_) | I16Array(_) => PrimitiveType::Int16,
            I32(_) | I32Array(_) => PrimitiveType::Int32,
            I64(_) | I64Array(_) => PrimitiveType::Int64,
            F32(_) | F32Array(_) => PrimitiveType::Float32,
            F64(_) | F64Array(_) => PrimitiveType::Float64,
            Address(_) | AddressArray(_) => PrimitiveType::Address,
        }
    }
}

/// Marshals a single scalar value to its wire bytes. Numeric types are
/// little-endian; an address is its raw 35 bytes, not a numeric encoding.
pub fn new_argument(value: &ArgValue) -> Result<Vec<u8>, AbiError> {
    use ArgValue::*;
    Ok(match value {
        U8(v) => vec![*v],
        U16(v) => v.to_le_bytes().to_vec(),
        U32(v) => v.to_le_bytes().to_vec(),
        U64(v) => v.to_le_bytes().to_vec(),
        I8(v) => vec![*v as u8],
        I16(v) => v.to_le_bytes().to_vec(),
        I32(v) => v.to_le_bytes().to_vec(),
        I64(v) => v.to_le_bytes().to_vec(),
        F32(v) => v.to_le_bytes().to_vec(),
        F64(v) => v.to_le_bytes().to_vec(),
        Address(a) => a.as_bytes().to_vec(),
        _ => return Err(AbiError::TypeMismatch("new_argument called on array value")),
    })
}

/// Marshals an array value by concatenating each element's marshalled
/// bytes in order.
pub fn new_array_argument(value: &ArgValue) -> Result<Vec<u8>, AbiError> {
    use ArgValue::*;
    let mut out = Vec::new();
    match value {
        U8Array(xs) => out.extend_from_slice(xs),
        U16Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        U32Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        U64Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        I8Array(xs) => xs.iter().for_each(|v| out.push(*v as u8)),
        I16Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        I32Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        I64Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        F32Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        F64Array(xs) => xs.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        AddressArray(xs) => xs.iter().for_each(|a| out.extend_from_slice(a.as_bytes())),
        _ => return Err(AbiError::TypeMismatch("new_array_argument called on scalar value")),
    }
    Ok(out)
}

/// Marshals any [`ArgValue`] (scalar or array) to its wire bytes.
pub fn marshal(value: &ArgValue) -> Result<Vec<u8>, AbiError> {
    if value.is_array() {
        new_array_argument(value)
    } else {
        new_argument(value)
    }
}
