//! Core data model: annotated messages, typed tool parameters, and the
//! state threaded through the control graph.

pub mod message;
pub mod params;
pub mod state;

pub use message::{Annotation, Message, Role};
pub use params::{AlignmentParams, Database, DatabaseQuery, FetchMethod, FetchParams, SearchParams};
pub use state::{
    MAX_EVAL_ROUNDS, Metadata, MetadataPatch, Next, Phase, RoutingReason, State, StatePatch,
    Status, ToolKind,
};
