#![deny(missing_docs)]
#![doc = "Model orchestration for the PWA engine: freezing, partitioned likelihood passes, consistency checks, diagnostics and phase-space generation."]

pub mod config;
pub mod consistency;
pub mod dump;
pub mod generate;
mod likelihood;
pub mod model;

pub use config::EvalConfig;
pub use consistency::{ConsistencyReport, Violation};
pub use dump::{fingerprint, AccessorSummary, ModelDump, ParameterSummary};
pub use generate::PhaseSpaceGenerator;
pub use model::{Model, PartitionSum, PassSummary};
