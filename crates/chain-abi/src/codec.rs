use crate::errors::AbiError;
use crate::parameter::Parameter;
use crate::value::{marshal, ArgValue};

/// Marshals each value per its parameter's declared type, then RLP-encodes
/// the resulting list of byte strings as a single blob (the wire form of a
/// function call's arguments or an event's payload).
pub fn encode(params: &[Parameter], values: &[ArgValue]) -> Result<Vec<u8>, AbiError> {
    if params.len() != values.len() {
        return Err(AbiError::ParameterCountMismatch {
            expected: params.len(),
            actual: values.len(),
        });
    }
    for (param, value) in params.iter().zip(values) {
        if param.ty != value.primitive_type() || param.is_array != value.is_array() {
            return Err(AbiError::TypeMismatch(param.ty.name()));
        }
    }
    let marshalled: Vec<Vec<u8>> = values.iter().map(marshal).collect::<Result<_, _>>()?;
    Ok(rlp::encode_list::<Vec<u8>, _>(&marshalled).to_vec())
}

/// RLP-decodes a blob into its raw per-parameter byte strings, checking the
/// count against the declared parameter list. The caller is responsible
/// for further decoding each entry into a typed value.
pub fn decode_to_bytes(params: &[Parameter], bytes: &[u8]) -> Result<Vec<Vec<u8>>, AbiError> {
    let rlp = rlp::Rlp::new(bytes);
    let items: Vec<Vec<u8>> = rlp.as_list()?;
    if items.len() != params.len() {
        return Err(AbiError::ParameterCountMismatch {
            expected: params.len(),
            actual: items.len(),
        });
    }
    Ok(items)
}

/// Inverse of [`decode_to_bytes`]: RLP-encodes an already-marshalled list
/// of per-parameter byte strings back into a single blob.
pub fn encode_from_bytes(params: &[Parameter], bytes: &[Vec<u8>]) -> Result<Vec<u8>, AbiError> {
    if bytes.len() != params.len() {
        return Err(AbiError::ParameterCountMismatch {
            expected: params.len(),
            actual: bytes.len(),
        });
    }
    Ok(rlp::encode_list::<Vec<u8>, _>(bytes).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive_type::PrimitiveType;

    #[test]
    fn encode_then_decode_to_bytes_recovers_marshalled_fields() {
        let params = vec![
            Parameter::new("amount", PrimitiveType::Uint64),
            Parameter::new_array("tags", PrimitiveType::Uint8),
        ];
        let values = vec![ArgValue::U64(42), ArgValue::U8Array(vec![1, 2, 3])];
        let blob = encode(&params, &values).unwrap();
        let fields = decode_to_bytes(&params, &blob).unwrap();
        assert_eq!(fields[0], 42u64.to_le_bytes().to_vec());
        assert_eq!(fields[1], vec![1, 2, 3]);
    }

    #[test]
    fn encode_from_bytes_is_inverse_of_decode_to_bytes() {
        let params = vec![Parameter::new("amount", PrimitiveType::Uint32)];
        let values = vec![ArgValue::U32(7)];
        let blob = encode(&params, &values).unwrap();
        let fields = decode_to_bytes(&params, &blob).unwrap();
        let rebuilt = encode_from_bytes(&params, &fields).unwrap();
        assert_eq!(blob, rebuilt);
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let params = vec![Parameter::new("a", PrimitiveType::Uint8)];
        assert!(encode(&params, &[]).is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let params = vec![Parameter::new("a", PrimitiveType::Uint8)];
        let values = vec![ArgValue::U64(1)];
        assert!(encode(&params, &values).is_err());
    }
}
