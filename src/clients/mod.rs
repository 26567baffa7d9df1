pub mod bridge;
pub mod traits;

pub use bridge::BridgePipeline;
pub use traits::{PipelineError, ResearchPipeline, ResearchSession};
