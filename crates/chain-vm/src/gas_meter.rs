use crate::errors::VmError;
use std::cell::Cell;
use std::rc::Rc;

/// A single gas counter shared by a root engine and every child engine it
/// spawns via cross-contract calls, so a nested call can never exceed the
/// outer invocation's budget. Cloning shares the same counter; only the
/// limit is fixed at construction.
#[derive(Clone)]
pub struct GasMeter {
    limit: u64,
    used: Rc<Cell<u64>>,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        GasMeter {
            limit,
            used: Rc::new(Cell::new(0)),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used.get()
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used.get())
    }

    /// Deducts `amount`, trapping the call with [`VmError::OutOfGas`] if it
    /// would exceed the limit. Matches the original's `vm.BurnGas` pattern
    /// of charging before the operation it pays for actually executes.
    pub fn burn(&self, amount: u64) -> Result<(), VmError> {
        let used = self.used.get();
        let next = used.saturating_add(amount);
        if next > self.limit {
            self.used.set(self.limit);
            return Err(VmError::OutOfGas);
        }
        self.used.set(next);
        Ok(())
    }
}
