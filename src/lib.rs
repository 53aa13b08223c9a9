//! hdl-forge: prompt a generative model for HDL, UVM and documentation deliverables
//! and normalize its structured JSON reply into file records.

pub mod clients;
pub mod composer;
pub mod config;
pub mod deliverables;
pub mod error;
pub mod normalizer;
pub mod session;
pub mod status;
pub mod viewer;

pub use composer::{ComposedRequest, DesignRequest, compose, output_schema};
pub use deliverables::{DeliverableKind, DeliverableSelection, HdlLanguage};
pub use error::{HdlForgeError, Result};
pub use normalizer::{FileRecord, GeneratedOutput, ParseError, normalize};
pub use session::{GenerateOutcome, GenerationSession, Phase, SkipReason, ViewState};
