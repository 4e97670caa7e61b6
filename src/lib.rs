pub mod backend;
pub mod candidate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod fragment;
pub mod frontier;
pub mod order;
pub mod othello;
pub mod processed;
pub mod progress;
pub mod remote;
pub mod shared;

pub use backend::{DiskBackend, FragmentBackend, MemoryBackend};
pub use candidate::Candidate;
pub use config::SearchConfig;
pub use coordinator::{BestSet, BestUpdate, SearchCoordinator, SearchStats, StepOutcome};
pub use error::*;
pub use fanout::{FanOutResult, FanOutSearch};
pub use fragment::{FragmentId, FragmentStore};
pub use frontier::Frontier;
pub use order::{Comparator, Entry};
pub use processed::ProcessedIndex;
pub use remote::{ChannelTransport, FrontierRequest, FrontierResponse, SearchClient, SearchServer, Transport};
pub use shared::SharedSearch;
