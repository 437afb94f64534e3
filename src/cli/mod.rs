//! Command workflows invoked by the `bmrm` binary.

pub mod orchestration;

pub use orchestration::{
    create_config, init_credentials, list_repositories, BatchContext, TagCreateArgs,
    WorkflowOptions, WorkflowResult,
};
