//! Command-line interface and orchestration for readme-forge
//!
//! ## Commands
//!
//! - **context**: Collect the repository context synchronously and print it as JSON
//! - **evaluate** / **generate**: Run the README task in the background, print every event
//!   pushed over the channel, and pull the fallback result when the channel closes early
//! - **init**: Write the default configuration file
//! - **validate**: Check a configuration file
//!
//! The `common` module holds the shared arguments, logging setup and the wiring that turns
//! a [`config::Config`] plus secrets into a [`crate::service::ReadmeService`].

mod common;
mod config;
mod context;
mod host;
mod init;
mod readme;
mod run;
mod validate;

pub use context::{ContextArgs, fetch_context};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use readme::{ReadmeArgs, process_readme};
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
