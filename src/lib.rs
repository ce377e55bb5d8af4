//! Reading Coach · children's reading-comprehension practice backend.
//!
//! Library half of the crate; `main.rs` wires it to a listener.

pub mod cache;
pub mod config;
pub mod detective;
pub mod domain;
pub mod error;
pub mod evidence;
pub mod grading;
pub mod logic;
pub mod openai;
pub mod passages;
pub mod progress;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod util;
