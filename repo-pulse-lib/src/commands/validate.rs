use super::Host;
use super::config::Config;
use crate::Result;
use crate::collect::{CatalogFile, TargetRegistry};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `pulse.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Project catalog to check as well
    #[arg(long, value_name = "PATH", env = "PULSE_CATALOG")]
    pub catalog: Option<Utf8PathBuf>,
}

/// Load and check the configuration, then resolve the catalog when one is given.
fn validate_inner(base_dir: &Utf8Path, args: &ValidateArgs) -> Result<Option<TargetRegistry>> {
    let _ = Config::load(base_dir, args.config.as_ref())?;

    args.catalog
        .as_ref()
        .map(|path| TargetRegistry::load(&CatalogFile::new(path.as_std_path())))
        .transpose()
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match validate_inner(&Utf8PathBuf::from("."), args) {
        Ok(registry) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            if let Some(path) = &args.config {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else {
                let _ = writeln!(host.output(), "Using pulse.toml if present, otherwise the default configuration");
            }

            if let Some(registry) = registry {
                let _ = writeln!(
                    host.output(),
                    "Catalog is valid: {} repositories across {} projects",
                    registry.len(),
                    registry.project_count()
                );
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Validation failed: {e:#}");
            host.exit(1);
            Err(e)
        }
    }
}
