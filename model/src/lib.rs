mod chain;
mod run;

pub use crate::chain::{ChainSummary, MalformedChainError};
pub use crate::run::{
    Condition, MalformedRunError, ObjectRef, PipelineSpec, ReadyReason, ResumptionSpec,
    ResumptionStatusEntry, RunResult, RunSnapshot, StageOutput, StageSpec, StageStatusEntry,
    WORKLOAD_KIND_LABEL, WORKLOAD_NAME_LABEL,
};
