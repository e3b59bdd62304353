use crate::opcode::{cost_for_op, WasmOp, GAS_MEMORY_PAGE};
use crate::policy::GasPolicy;

/// The metered policy: every byte of storage, contract code and event
/// payload costs gas one-for-one, and WASM execution costs per the opcode
/// table.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlphaPolicy;

impl GasPolicy for AlphaPolicy {
    fn cost_for_op(&self, op: WasmOp) -> u64 {
        cost_for_op(op)
    }

    fn cost_for_storage(&self, size: usize) -> u64 {
        size as u64
    }

    fn cost_for_contract(&self, size: usize) -> u64 {
        size as u64
    }

    fn cost_for_event(&self, size: usize) -> u64 {
        size as u64
    }

    fn cost_for_malloc(&self, pages: usize) -> u64 {
        GAS_MEMORY_PAGE * pages as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_contract_and_event_cost_one_gas_per_byte() {
        let policy = AlphaPolicy;
        assert_eq!(policy.cost_for_storage(100), 100);
        assert_eq!(policy.cost_for_contract(2048), 2048);
        assert_eq!(policy.cost_for_event(16), 16);
    }

    #[test]
    fn malloc_costs_per_page() {
        let policy = AlphaPolicy;
        assert_eq!(policy.cost_for_malloc(3), 3 * GAS_MEMORY_PAGE);
    }
}
