use super::Host;
use super::common::ColorMode;
use super::report::write_targets;
use crate::Result;
use crate::collect::{CatalogFile, TargetRegistry};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::{IsTerminal, Write};

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Project catalog (JSON array of projects with repository URLs)
    #[arg(long, value_name = "PATH", env = "PULSE_CATALOG", default_value = "catalog.json")]
    pub catalog: Utf8PathBuf,

    /// Only list the primary repository of each project
    #[arg(long)]
    pub primary_only: bool,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,
}

pub fn list_targets<H: Host>(host: &mut H, args: &ListArgs) -> Result<()> {
    let mut registry = TargetRegistry::load(&CatalogFile::new(args.catalog.as_std_path()))?;
    if args.primary_only {
        registry = registry.primary_only();
    }

    let mut text = String::new();
    write_targets(&registry, args.color.enabled(std::io::stdout().is_terminal()), &mut text)?;

    let _ = write!(host.output(), "{text}");
    Ok(())
}
