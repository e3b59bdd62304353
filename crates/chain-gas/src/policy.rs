use crate::opcode::WasmOp;

/// What a transaction is charged for: WASM execution (per instruction),
/// storage writes, contract deployment, and event emission.
pub trait GasPolicy {
    fn cost_for_op(&self, op: WasmOp) -> u64;
    fn cost_for_storage(&self, size: usize) -> u64;
    fn cost_for_contract(&self, size: usize) -> u64;
    fn cost_for_event(&self, size: usize) -> u64;
    fn cost_for_malloc(&self, pages: usize) -> u64;
}
