//! Privacy protection for Basic Safety Message streams.
//!
//! Each message is parsed incrementally. Speed and position are checked as
//! soon as they appear, and a message that fails a filter is dropped without
//! reading the rest of it. Retained messages have their temporary id and
//! configured PartII members redacted before being re-emitted as one line of
//! JSON.

pub mod bsm;
pub mod config;
pub mod features;
pub mod filter;
pub mod handler;
pub mod redaction;
pub mod status;
pub mod stream;

pub use bsm::Bsm;
pub use config::{ConfigMap, PpmConfig, ServiceConfig};
pub use features::{Feature, FeatureSet};
pub use filter::VelocityFilter;
pub use handler::{BsmHandler, HandlerState};
pub use redaction::{RedactionError, RedactionRuleset};
pub use status::ResultStatus;
pub use stream::{StreamRunner, StreamSummary};
