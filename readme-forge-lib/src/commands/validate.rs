use super::Host;
use super::common::load_config;
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `readme-forge.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    let config_path = args.config.as_deref();

    match load_config(config_path) {
        Ok(_) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = config_path {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else {
                let _ = writeln!(host.output(), "Using default configuration unless readme-forge.toml is present");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::commands::init::{InitArgs, init_config};

    fn write_config(contents: &str) -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("readme-forge.toml")).unwrap();
        std::fs::write(&path, contents).unwrap();
        (tmp, path)
    }

    #[test]
    fn generated_config_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("readme-forge.toml")).unwrap();
        init_config(
            &mut TestHost::new(),
            &InitArgs {
                output: Some(path.clone()),
                generate_key: false,
            },
        )
        .unwrap();

        let mut host = TestHost::new();
        validate_config(&mut host, &ValidateArgs { config: Some(path) }).unwrap();
        assert!(host.output_text().contains("Configuration file is valid"));
        assert_eq!(host.exit_code, None);
    }

    #[test]
    fn empty_config_is_valid() {
        let (_tmp, path) = write_config("# nothing here\n");
        validate_config(&mut TestHost::new(), &ValidateArgs { config: Some(path) }).unwrap();
    }

    #[test]
    fn unknown_field_fails_with_exit_code() {
        let (_tmp, path) = write_config("max_retries = 3\n");

        let mut host = TestHost::new();
        let result = validate_config(&mut host, &ValidateArgs { config: Some(path) });

        assert!(result.is_err());
        assert_eq!(host.exit_code, Some(1));
        assert!(host.error_text().contains("Configuration validation failed"));
    }

    #[test]
    fn zero_concurrency_fails() {
        let (_tmp, path) = write_config("max_concurrent_tasks = 0\n");
        assert!(validate_config(&mut TestHost::new(), &ValidateArgs { config: Some(path) }).is_err());
    }
}
