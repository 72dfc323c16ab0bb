use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use crate::context::AesGcmCipher;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `readme-forge.toml` in the current directory)
    #[arg(value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Also print a freshly generated key for `README_FORGE_ENCRYPTION_KEY`
    #[arg(long)]
    pub generate_key: bool,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CONFIG_FILE));

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");

    if args.generate_key {
        let _ = writeln!(host.output(), "README_FORGE_ENCRYPTION_KEY={}", AesGcmCipher::generate_key());
    }

    Ok(())
}
