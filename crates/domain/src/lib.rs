pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod memory_item;
pub mod model;
pub mod persona;
pub mod room;
pub mod trace;

pub use clock::{Clock, FrozenClock, SystemClock};
pub use config::{Config, ConfigIssue, ConfigSeverity, ModerationConfig};
pub use decision::{Decision, DecisionRecord, DecisionReason, DecisionTags};
pub use error::{Error, Result};
pub use memory_item::{namespace, Confidence, MemoryItem, MemoryItemType};
pub use model::{
    ChatMessage, ModerationMeta, Origin, SafetyAction, StreamFrame, StreamObservation,
    StreamTranscriptSegment, CHAT_MESSAGE_SCHEMA, CHAT_MESSAGE_SCHEMA_VERSION,
    STREAM_OBSERVATION_SCHEMA, STREAM_OBSERVATION_SCHEMA_VERSION,
};
pub use persona::{DriftKnobs, PersonaConfig};
pub use room::{BudgetConfig, RoomConfig};
pub use trace::{Trace, TraceEvent};
