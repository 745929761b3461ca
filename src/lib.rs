#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod doctor;
pub mod error;
pub mod history;
pub mod probe;
pub mod process;
pub mod relay;
pub mod render;
pub mod rewrite;
pub mod setup;
pub mod surface;
pub mod ui;

pub use config::Config;
pub use error::{CompatError, Result};
