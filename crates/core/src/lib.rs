//! Core types for the Parley perception → decision → action pipeline.
//!
//! Everything here is transport-agnostic: the data model that flows between
//! pipeline stages, the intent registry, the per-request state machine, the
//! error taxonomy surfaced at the core boundary, and the layered runtime
//! configuration shared by the server and the CLI.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod registry;

pub use audit::{
    AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use domain::features::FeatureSet;
pub use domain::intent::{IntentId, Prediction};
pub use domain::result::{ActionResult, AgentRequest, AgentResult};
pub use errors::{ErrorKind, InterfaceError, PipelineError};
pub use flows::{RequestEvent, RequestFlow, RequestState, StateTransition};
pub use registry::{IntentRegistry, RegistryError};
