//! Console rendering of command results.

use crate::Result;
use crate::collect::{ProfileUpdateSummary, RunSummary, Target, TargetRegistry};
use core::fmt::Write;
use owo_colors::OwoColorize;

pub fn write_targets<W: Write>(registry: &TargetRegistry, use_colors: bool, writer: &mut W) -> Result<()> {
    let mut groups: Vec<(&Target, Vec<&Target>)> = Vec::new();
    for target in registry.all() {
        match groups.last_mut() {
            Some((first, members)) if first.project_id == target.project_id => members.push(target),
            _ => groups.push((target, vec![target])),
        }
    }

    let width = registry.all().iter().map(|t| t.repo.to_string().len()).max().unwrap_or(0);

    for (first, members) in &groups {
        let heading = if first.symbol.is_empty() {
            first.project_name.clone()
        } else {
            format!("{} ({})", first.project_name, first.symbol)
        };
        if use_colors {
            writeln!(writer, "{}", heading.bold())?;
        } else {
            writeln!(writer, "{heading}")?;
        }

        for target in members {
            let repo = target.repo.to_string();
            let tier = if target.is_primary() { "primary" } else { "secondary" };
            if use_colors && target.is_primary() {
                writeln!(writer, "  {repo:<width$}  {}", tier.green())?;
            } else {
                writeln!(writer, "  {repo:<width$}  {tier}")?;
            }
        }
    }

    let primary = registry.primary().count();
    writeln!(
        writer,
        "{} repositories across {} projects ({primary} primary, {} secondary)",
        registry.len(),
        registry.project_count(),
        registry.len() - primary
    )?;

    Ok(())
}

pub fn write_run_summary<W: Write>(summary: &RunSummary, use_colors: bool, writer: &mut W) -> Result<()> {
    let status = if summary.cancelled { "Collection cancelled" } else { "Collection complete" };
    if use_colors {
        writeln!(writer, "{}", status.bold())?;
    } else {
        writeln!(writer, "{status}")?;
    }

    writeln!(writer, "  collected          : {}", summary.successes)?;
    writeln!(writer, "  errors             : {}", summary.errors)?;
    writeln!(writer, "  permanent failures : {}", summary.permanent_failures)?;
    if summary.skipped_secondary > 0 {
        writeln!(writer, "  skipped secondary  : {}", summary.skipped_secondary)?;
    }
    writeln!(writer, "  daily aggregates   : {}", summary.aggregates)?;
    writeln!(writer, "  elapsed            : {:.1}s", summary.elapsed.as_secs_f64())?;

    if let Some(rate) = &summary.rate_limit {
        writeln!(
            writer,
            "  rate limit         : {}/{} remaining, resets {}",
            rate.remaining,
            rate.limit,
            rate.reset_at.format("%H:%M:%S UTC")
        )?;
    }

    if let Some(contributors) = &summary.contributors {
        writeln!(writer, "  contributors       : {}", contributors.total)?;
        for c in &contributors.top {
            writeln!(
                writer,
                "    {:<24} {} projects, {} repositories, {} followers",
                c.username, c.projects, c.repositories, c.followers
            )?;
        }
    }

    Ok(())
}

pub fn write_profile_summary<W: Write>(summary: &ProfileUpdateSummary, writer: &mut W) -> Result<()> {
    writeln!(
        writer,
        "Refreshed {} contributor profiles ({} errors)",
        summary.updated, summary.errors
    )?;
    Ok(())
}
