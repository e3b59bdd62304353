/// Tunables the consensus adapter needs to exist at all. Not a
/// config-file loader -- just the constants a binary wiring one up has to
/// supply.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Largest raw transaction `check`/`deliver` will accept, in bytes.
    pub max_tx_size: usize,
    /// Ceiling on cross-contract call nesting inside the execution engine.
    pub max_call_depth: usize,
    /// Address of the designated gas-contract account, if one has been
    /// deployed. `None` until a deployment transaction sets it; the station
    /// stays `Free` until then regardless of this field.
    pub gas_contract: Option<chain_crypto::Address>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            max_tx_size: 1024 * 1024,
            max_call_depth: chain_vm::MAX_CALL_DEPTH,
            gas_contract: None,
        }
    }
}
