//! System instructions for every generation call the workflow makes.

pub mod workflow;

pub use workflow::WORKFLOW_SENTINEL;
