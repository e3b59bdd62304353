//! Contract ABI: declared functions and events, their MethodID wiring, the
//! nested-RLP contract wire format, and the argument codec that marshals
//! typed values to and from the byte strings functions and events carry.

pub mod codec;
pub mod contract;
pub mod errors;
pub mod header;
pub mod parameter;
pub mod primitive_type;
pub mod value;

pub use codec::{decode_to_bytes, encode, encode_from_bytes};
pub use contract::Contract;
pub use errors::AbiError;
pub use header::{EventDecl, Function, Header};
pub use parameter::Parameter;
pub use primitive_type::PrimitiveType;
pub use value::{marshal, new_argument, new_array_argument, ArgValue};
