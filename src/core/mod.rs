pub mod config;
mod engine;
mod error;
mod schema;
mod types;

pub use config::{Constraint, GeneratorConfig};
pub use engine::{
    PipelineOutcome, StageReport, assign_identifiers, filter_columns, randomize_columns,
    repair_constraints, run_pipeline, sample_rows,
};
pub use error::{ColumnRole, ConfigError, DataError, PipelineError};
pub use schema::{AvailabilityMismatch, SchemaRegistry, VariableInfo};
pub use types::{Column, Dataset, Mode, RandomizationContext, Values};
