pub mod filter;
pub mod orchestrator;

pub use filter::RelevanceFilter;
pub use orchestrator::{AnalysisOrchestrator, PipelineLimits};
