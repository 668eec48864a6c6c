//! Pipeline-state fingerprinting and the process-wide PSO cache.
//!
//! A pipeline fingerprint is a pure function of the recognized
//! descriptor options; two descriptors that agree on those options hash
//! and compare equal, including a structural (not identity) comparison
//! of blend state. The cache guarantees at most one compilation per
//! fingerprint: concurrent requests for the same key block on the first
//! compile and then share its result.

mod cache;
mod key;
mod shader_id;
mod state;

pub use cache::{
    CompileError, CompiledPipeline, PipelineCache, PipelineCompiler, PipelineHandle,
};
pub use key::{
    BlendDesc, BlendFactor, BlendOp, BlendTargetDesc, ComputePipelineDesc, ComputePipelineKey,
    GraphicsPipelineDesc, GraphicsPipelineKey, LogicOp, PixelFormat, StageVariants, TopologyClass,
};
pub use shader_id::ShaderId;
pub use state::StateObjectCache;
