pub mod catalog;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod export;
pub mod input;
pub mod logger;
pub mod normalizer;
pub mod outcome;
pub mod pipeline;
pub mod rate_limit;
pub mod resolver;

pub use catalog::{CatalogItem, SearchClient, SearchError, SearchResponse, StoreSearchClient};
pub use checkpoint::{Checkpoint, Checkpointer, ResumeMode};
pub use outcome::{ResolutionOutcome, ResolutionState, RunSummary};
pub use pipeline::{ResolutionRun, RunReport, RunStatus};
pub use resolver::{Resolution, Resolver};
