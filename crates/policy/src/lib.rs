pub mod config;
pub mod engine;

pub use config::PolicyConfig;
pub use engine::{evaluate, EvaluationInput, PersonaPostingState};
