use crate::opcode::WasmOp;
use crate::policy::GasPolicy;

/// The unmetered policy: everything costs zero. Used while the chain runs
/// without a funded gas token, before the fee station ever switches over.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreePolicy;

impl GasPolicy for FreePolicy {
    fn cost_for_op(&self, _op: WasmOp) -> u64 {
        0
    }

    fn cost_for_storage(&self, _size: usize) -> u64 {
        0
    }

    fn cost_for_contract(&self, _size: usize) -> u64 {
        0
    }

    fn cost_for_event(&self, _size: usize) -> u64 {
        0
    }

    fn cost_for_malloc(&self, _pages: usize) -> u64 {
        0
    }
}
