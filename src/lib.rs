pub mod shared_types;
pub mod template_data;
pub mod armature_data;
pub mod error;
pub mod runtime;
pub mod templates;
pub mod convert;
pub mod report;
pub mod config;
pub mod session;

pub use error::{Error, Result};
