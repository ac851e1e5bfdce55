pub mod filter;
pub mod schema;

pub use filter::{contains_pii, FilterOutcome, SafetyConfig};
pub use schema::{validate_chat_message, validate_stream_observation};
