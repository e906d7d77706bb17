#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]
pub mod arena;
pub mod bodies;
pub mod config;
pub mod error;
pub mod events;
pub mod integrator;
pub mod kepler;
pub mod loader;
pub mod lwc;
pub mod math;
pub mod pool;
pub mod render;
pub mod rigid;
pub mod sim;
pub mod spacecraft;
pub mod system;
pub mod time;
