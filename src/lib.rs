pub mod actions;
pub mod clipboard;
pub mod errors;
pub mod input;
pub mod llm_client;
pub mod notifications;
pub mod response_parser;
pub mod secure_keys;
pub mod selection;
pub mod session_manager;
pub mod settings;
pub mod trigger;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use actions::{PipelineCoordinator, PipelineOutcome};
pub use errors::ErrorKind;
