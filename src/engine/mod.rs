mod orchestrator;
mod registry;
mod runner;
mod strategy;
mod workspace;

pub use orchestrator::Engine;
pub use registry::LanguageRegistry;
pub use runner::{ProcessRunner, RunResult};
pub use strategy::{ExecutionStrategy, COMPILE_TIMEOUT_SECONDS};
pub use workspace::Workspace;
