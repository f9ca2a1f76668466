pub mod entity_store;
pub mod evm_rpc;

pub use entity_store::{EntityStore, GolemEntityClient, MemoryEntityStore};
pub use evm_rpc::{ChainProvider, EvmRpcClient, LogFilter, RawLog};
