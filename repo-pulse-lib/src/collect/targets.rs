use super::repo_spec::parse_github_url;
use crate::Result;
use crate::model::{RepoKey, Tier};
use ohno::{IntoAppError, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   targets";

/// A project and its repository URLs, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
}

/// Read-only source of projects.
pub trait Catalog {
    fn projects(&self) -> Result<Vec<Project>>;
}

impl Catalog for Vec<Project> {
    fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.clone())
    }
}

/// A catalog stored as a JSON array of projects.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Catalog for CatalogFile {
    fn projects(&self) -> Result<Vec<Project>> {
        let text = fs::read_to_string(&self.path).into_app_err_with(|| format!("reading catalog '{}'", self.path.display()))?;
        serde_json::from_str(&text).into_app_err_with(|| format!("parsing catalog '{}'", self.path.display()))
    }
}

/// One repository to collect, with its project context. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub repo: RepoKey,
    pub project_id: String,
    pub project_name: String,
    pub symbol: String,
    pub tier: Tier,
}

impl Target {
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        matches!(self.tier, Tier::Primary)
    }
}

/// The ordered set of targets for a run.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    project_count: usize,
}

impl TargetRegistry {
    /// Resolve targets from a catalog.
    ///
    /// The first valid GitHub URL of each project is its primary repository; the rest
    /// are secondary. Unparseable and non-GitHub URLs are skipped, as are repeats of a
    /// repository within one project. Having no target at all is an error.
    pub fn load(catalog: &impl Catalog) -> Result<Self> {
        let projects = catalog.projects()?;
        let mut targets = Vec::new();
        let mut project_count = 0;

        for project in projects {
            if project.project_id.trim().is_empty() {
                log::debug!(target: LOG_TARGET, "Skipping catalog entry without a project id");
                continue;
            }

            let mut seen = HashSet::new();
            for url in &project.repositories {
                let repo = match parse_github_url(url) {
                    Ok(repo) => repo,
                    Err(e) => {
                        log::debug!(target: LOG_TARGET, "Skipping repository URL of project '{}': {e:#}", project.project_id);
                        continue;
                    }
                };

                if !seen.insert(repo.clone()) {
                    log::debug!(target: LOG_TARGET, "Skipping duplicate repository '{repo}' of project '{}'", project.project_id);
                    continue;
                }

                let tier = if seen.len() == 1 { Tier::Primary } else { Tier::Secondary };
                targets.push(Target {
                    repo,
                    project_id: project.project_id.clone(),
                    project_name: project.name.clone().unwrap_or_else(|| project.project_id.clone()),
                    symbol: project.symbol.as_deref().unwrap_or_default().to_uppercase(),
                    tier,
                });
            }

            if !seen.is_empty() {
                project_count += 1;
            }
        }

        if targets.is_empty() {
            bail!("the catalog does not list any usable GitHub repository");
        }

        let registry = Self { targets, project_count };
        log::info!(
            target: LOG_TARGET,
            "Loaded {} repositories from {} projects ({} primary, {} secondary)",
            registry.targets.len(),
            registry.project_count,
            registry.primary().count(),
            registry.secondary().count()
        );

        Ok(registry)
    }

    /// Keep only primary targets.
    #[must_use]
    pub fn primary_only(mut self) -> Self {
        self.targets.retain(Target::is_primary);
        self
    }

    #[must_use]
    pub fn all(&self) -> &[Target] {
        &self.targets
    }

    pub fn primary(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| t.is_primary())
    }

    pub fn secondary(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| !t.is_primary())
    }

    #[must_use]
    pub const fn project_count(&self) -> usize {
        self.project_count
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
