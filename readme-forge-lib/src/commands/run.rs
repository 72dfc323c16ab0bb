//! Command dispatch logic for readme-forge

use super::{ContextArgs, InitArgs, ReadmeArgs, ValidateArgs, fetch_context, init_config, process_readme, validate_config};
use crate::context::ReadmeMode;
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "readme-forge", version, author, long_about = None)]
#[command(about = "Gather repository context and evaluate or generate READMEs")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: ForgeSubcommand,
}

#[derive(Subcommand, Debug)]
enum ForgeSubcommand {
    /// Collect the full repository context and print it as JSON
    Context(Box<ContextArgs>),
    /// Evaluate the repository's README in the background and stream the outcome
    Evaluate(Box<ReadmeArgs>),
    /// Generate a README in the background and stream the outcome
    Generate(Box<ReadmeArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        ForgeSubcommand::Context(context_args) => fetch_context(host, context_args).await,
        ForgeSubcommand::Evaluate(readme_args) => process_readme(host, readme_args, ReadmeMode::Evaluate).await,
        ForgeSubcommand::Generate(readme_args) => process_readme(host, readme_args, ReadmeMode::Generate).await,
        ForgeSubcommand::Init(init_args) => init_config(host, init_args),
        ForgeSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn readme_commands_share_arguments() {
        let cli = Cli::try_parse_from(["readme-forge", "generate", "octo/hello", "--branch", "dev", "--no-cache"]).unwrap();
        let ForgeSubcommand::Generate(args) = cli.command else {
            panic!("expected generate");
        };

        assert_eq!(args.common.repo, "octo/hello");
        assert_eq!(args.common.branch, "dev");
        assert!(args.common.no_cache);
    }

    #[test]
    fn branch_defaults_to_main() {
        let cli = Cli::try_parse_from(["readme-forge", "context", "octo/hello", "--compact"]).unwrap();
        let ForgeSubcommand::Context(args) = cli.command else {
            panic!("expected context");
        };

        assert_eq!(args.common.branch, "main");
        assert!(args.compact);
    }

    #[test]
    fn repository_is_required() {
        assert!(Cli::try_parse_from(["readme-forge", "evaluate"]).is_err());
    }
}
