pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{parse_volume_csv, ImportError, MockScenarioSource, ScenarioSource};
pub use db::{init_db, Repository, StoreError};
pub use domain::{
    AllocationMode, AllocationRuleSet, Decimal, LookupStrategy, ProductConfig, ProviderConfig,
    Scenario, TierSchedule, TierView, TimePoint, ValidationError, VolumeBasis, VolumePoint,
};
pub use engine::{
    AllocationSplitter, Comparison, CostComparator, CostProjector, PricingResolver,
    ProjectionOptions, ProjectionResult, RollingWindowAggregator, TierResolver, Warning,
};
pub use error::AppError;
