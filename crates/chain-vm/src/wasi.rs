use crate::errors::VmError;

/// `wasi_unstable` exposes only `proc_exit`/`proc_raise`; both abort
/// execution immediately, surfacing the exit code as an ignite error.
/// Anything else is an unsupported import.
pub(crate) fn proc_exit(args: &[u64]) -> Result<u64, VmError> {
    let code = *args
        .first()
        .ok_or_else(|| VmError::Ignite("invalid proc_exit argument".to_string()))?;
    Err(VmError::Ignite(format!("process exit with code: {code}")))
}

pub(crate) fn proc_raise(args: &[u64]) -> Result<u64, VmError> {
    proc_exit(args)
}

pub(crate) fn unsupported(name: &str) -> VmError {
    VmError::Ignite(format!("unsupported func call {name}"))
}
