pub mod agents;
pub mod banner;
pub mod commands;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod events;
pub mod plan;
pub mod prompts;
pub mod provider;
pub mod state;
