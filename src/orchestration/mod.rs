//! Glue between the store and the engine: scenario assembly and
//! projection memoization.

pub mod assembler;
pub mod cache;

pub use assembler::{
    AllocationOverride, AssemblyError, ScenarioAssembler, StoredScenarioRequest,
    MAX_TIMELINE_MONTHS,
};
pub use cache::ProjectionCache;
