//! Wire-format types that flow between the execution engine, state storage
//! and the consensus adapter: transactions, receipts and block headers.

pub mod block;
pub mod receipt;
pub mod transaction;

pub use block::{genesis_block, Block};
pub use receipt::{Event, Receipt, ReceiptCode};
pub use transaction::{Transaction, TxPayload, TxSender};
