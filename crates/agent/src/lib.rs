//! Parley agent runtime.
//!
//! The three pipeline stages and the orchestrator that sequences them:
//!
//! 1. **Perception** (`perception`) normalizes raw text into a `FeatureSet`.
//! 2. **Decision** (`decision`) runs a pluggable `Classifier` under a deadline
//!    and applies the confidence floor.
//! 3. **Action** (`action`) maps the decided intent to a response and an
//!    optional action tag.
//!
//! `pipeline::AgentPipeline` ties them together and never panics on bad
//! input; every failure comes back as an unsuccessful `AgentResult`.
//! `builder` assembles a pipeline from `AppConfig` and an intent `catalog`.

pub mod action;
pub mod builder;
pub mod catalog;
pub mod classifier;
pub mod decision;
pub mod perception;
pub mod pipeline;

pub use action::{ActionExecutor, ActionHandler, ActionTable};
pub use builder::{build_pipeline, build_pipeline_with_catalog, BuildError};
pub use catalog::{CatalogError, IntentCatalog};
pub use classifier::{Classification, Classifier, ClassifierError};
pub use decision::{ConfidencePolicy, DecisionEngine};
pub use perception::{FeatureExtractor, PerceptionSettings, TextPerception};
pub use pipeline::AgentPipeline;
