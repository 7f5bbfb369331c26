#![forbid(unsafe_code)]

//! # kp-anonymity
//!
//! (k,P)-anonymity for time-series tables, implementing the two strategies of
//! Shou et al., *Supporting Pattern-Preserving Anonymization for Time-Series
//! Data*:
//! - **naive**: top-down greedy k-anonymity (Xu et al. 2006), then a pattern
//!   tree per k-group;
//! - **KAPRA**: one pattern tree over the whole table, bad-leaf recycling,
//!   bottom-up assembly of k-groups by instant value loss.
//!
//! Both finish with l-diversity enforcement over the sensitive attribute.
//! Every randomized step takes an injectable `rand::Rng`, so runs are
//! reproducible when the caller seeds the source.

pub mod assemble;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod ldiv;
pub mod loss;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod recycle;
pub mod sax;
pub mod tree;
pub mod types;

pub use config::AnonymityParams;
pub use dataset::{load_dataset, Dataset};
pub use errors::{KpError, Result};
pub use pipeline::{run, Algorithm, AnonymizationResult};
pub use sax::{SaxOracle, ShapeOracle};
