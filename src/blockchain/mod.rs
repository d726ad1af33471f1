pub mod block_processor;
pub mod rpc_client;
pub mod scanner;
pub mod watch_set;

pub use block_processor::{BlockMatches, BlockProcessor};
pub use rpc_client::{recover_sender, Block, ChainClient, RpcClient, Transaction};
pub use scanner::{BlockRange, MatchRecorder, ScanEngine, ScanEngineConfig, TickOutcome};
pub use watch_set::{normalize_address, WatchSet, ZERO_ADDRESS};
