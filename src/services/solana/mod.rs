//! Solana ledger access: the RPC seam and ordered endpoint failover

pub mod resolver;
pub mod rpc;
pub mod transfer;

pub use resolver::{EndpointResolver, ProbeReport, ResolutionCursor, ResolveError};
pub use rpc::{parse_commitment, Confirmation, LedgerRpc, RpcConnector, RpcError, SolanaConnector, SolanaRpc};
pub use transfer::{system_transfers, LandedTransaction, Transfer};
