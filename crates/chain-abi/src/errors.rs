use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("rlp encoding error: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("parameter count mismatch: expecting {expected}, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },

    #[error("function with method id {0} not found")]
    FunctionNotFound(String),

    #[error("event '{0}' not found")]
    EventNotFound(String),

    #[error("duplicated method id among functions")]
    DuplicatedFunctionMethodId,

    #[error("duplicated method id among events")]
    DuplicatedEventMethodId,

    #[error("cannot decode empty contract")]
    EmptyContract,

    #[error("value does not match declared type {0}")]
    TypeMismatch(&'static str),

    #[error("array element has wrong byte width for {0}")]
    MalformedArray(&'static str),
}
