//! Configuration handling for LinkPatrol
//!
//! Settings are resolved from three layers with fixed precedence:
//! CLI flags / environment variables, then an optional `linkpatrol.yaml`
//! file, then built-in defaults.

mod loader;
mod types;
mod validation;

pub use loader::{load_file, FileConfig};
pub use types::{Config, Overrides};
pub use validation::validate;
