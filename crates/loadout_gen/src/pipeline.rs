//! The two generation pipelines.
//!
//! The aggregation pipeline scans declaration sources, extracts and lowers
//! their exported declarations and commits `autoloads.<ext>`. The package
//! pipeline bundles installed packages' declaration files and the cached
//! environment into `packages.<ext>`. Each first checks whether its artifact
//! is stale; an up-to-date artifact is only activated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use loadout_cache::{
    needs_rebuild, CacheError, CompileGuard, EnvironmentStamp, FormCompiler, RebuildReason,
    RecoveryPolicy,
};
use loadout_config::{load_config, resolve_layout, ProjectConfig, ProjectLayout};
use loadout_diagnostics::{code, Diagnostic, DiagnosticSink, Location};

use crate::error::GenError;
use crate::extract::DeclarationExtractor;
use crate::loader::{ArtifactImage, ArtifactLoader};
use crate::packages::{DirectoryPackages, InstalledPackage, PackageBundler, PackageSource};
use crate::registry::{ModuleRegistry, ProjectModules};
use crate::resolver::PathResolver;
use crate::scanner::{Scan, SourceScanner};
use crate::snapshot::EnvironmentSnapshot;
use crate::writer::{assemble, ArtifactBuffer};

/// One of the generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The declaration-aggregation artifact.
    Autoloads,
    /// The package bundle.
    Packages,
}

impl ArtifactKind {
    /// The name used on the command line and in artifact headers.
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Autoloads => "autoloads",
            ArtifactKind::Packages => "packages",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which artifacts to work on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Target {
    /// Only the aggregation artifact.
    Autoloads,
    /// Only the package bundle.
    Packages,
    /// Both, aggregation first.
    #[default]
    All,
}

impl Target {
    /// The selected artifacts, in processing order.
    pub fn kinds(self) -> &'static [ArtifactKind] {
        match self {
            Target::Autoloads => &[ArtifactKind::Autoloads],
            Target::Packages => &[ArtifactKind::Packages],
            Target::All => &[ArtifactKind::Autoloads, ArtifactKind::Packages],
        }
    }
}

impl FromStr for Target {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "autoloads" => Ok(Target::Autoloads),
            "packages" => Ok(Target::Packages),
            "all" => Ok(Target::All),
            other => Err(GenError::InvalidTarget(other.to_string())),
        }
    }
}

/// Options for one generation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Which artifacts to generate.
    pub target: Target,
    /// Regenerate even if up to date.
    pub force: bool,
    /// Load artifact text instead of compiled forms.
    pub debug: bool,
}

/// What happened to one artifact.
#[derive(Debug)]
pub enum ArtifactOutcome {
    /// The artifact was rebuilt, compiled and loaded.
    Regenerated {
        /// Why it was rebuilt.
        reason: RebuildReason,
        /// Entries or packages written.
        items: usize,
        /// The loaded artifact.
        image: ArtifactImage,
    },
    /// The artifact was up to date and was loaded as is.
    Activated {
        /// The loaded artifact.
        image: ArtifactImage,
        /// Set when the text form had to be loaded instead of the compiled one.
        fallback: Option<String>,
    },
}

impl ArtifactOutcome {
    /// The loaded artifact.
    pub fn image(&self) -> &ArtifactImage {
        match self {
            ArtifactOutcome::Regenerated { image, .. } | ArtifactOutcome::Activated { image, .. } => {
                image
            }
        }
    }

    /// Returns `true` if the artifact was rebuilt.
    pub fn regenerated(&self) -> bool {
        matches!(self, ArtifactOutcome::Regenerated { .. })
    }
}

/// The result of one artifact in a run.
#[derive(Debug)]
pub struct ArtifactReport {
    /// Which artifact.
    pub kind: ArtifactKind,
    /// Where it lives.
    pub path: PathBuf,
    /// What happened, or why it failed.
    pub result: Result<ArtifactOutcome, GenError>,
}

/// Freshness of one artifact, computed without writing anything.
#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    /// Which artifact.
    pub kind: ArtifactKind,
    /// Where it lives.
    pub path: PathBuf,
    /// Why it would be rebuilt, or `None` if it is up to date.
    pub reason: Option<RebuildReason>,
}

struct AutoloadsPlan {
    scan: Scan,
    snapshot: EnvironmentSnapshot,
    reason: Option<RebuildReason>,
}

struct PackagesPlan {
    installed: Vec<InstalledPackage>,
    snapshot: EnvironmentSnapshot,
    reason: Option<RebuildReason>,
}

/// Runs the pipelines of one project.
pub struct Generator<'s> {
    layout: ProjectLayout,
    config: ProjectConfig,
    registry: ProjectModules,
    packages: DirectoryPackages,
    sink: &'s DiagnosticSink,
}

impl<'s> Generator<'s> {
    /// Loads the project rooted at `root`.
    pub fn open(root: &Path, sink: &'s DiagnosticSink) -> Result<Self, GenError> {
        let config = load_config(root)?;
        let layout = resolve_layout(&config, root);
        let registry = ProjectModules::discover(&layout, &config)?;
        let packages = DirectoryPackages::new(&layout.packages_dir, &layout.extension);
        tracing::debug!(
            root = %root.display(),
            modules = registry.modules().len(),
            "opened project"
        );
        Ok(Self {
            layout,
            config,
            registry,
            packages,
            sink,
        })
    }

    /// The resolved project layout.
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// The project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Path of an artifact.
    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Autoloads => self.layout.autoloads_path(),
            ArtifactKind::Packages => self.layout.packages_path(),
        }
    }

    /// Generates the selected artifacts. A failure of one artifact does not
    /// stop the next.
    pub fn run(&self, options: &GenerateOptions) -> Vec<ArtifactReport> {
        options
            .target
            .kinds()
            .iter()
            .map(|&kind| {
                let result = match kind {
                    ArtifactKind::Autoloads => self.regenerate_autoloads(options.force, options.debug),
                    ArtifactKind::Packages => self.regenerate_packages(options.force, options.debug),
                };
                if let Err(e) = &result {
                    tracing::error!(artifact = %kind, error = %e, "generation failed");
                }
                ArtifactReport {
                    kind,
                    path: self.artifact_path(kind),
                    result,
                }
            })
            .collect()
    }

    /// Reports whether the selected artifacts are stale, without writing.
    pub fn status(&self, target: Target) -> Result<Vec<ArtifactStatus>, GenError> {
        target
            .kinds()
            .iter()
            .map(|&kind| -> Result<ArtifactStatus, GenError> {
                let reason = match kind {
                    ArtifactKind::Autoloads => self.plan_autoloads(false)?.reason,
                    ArtifactKind::Packages => self.plan_packages(false)?.reason,
                };
                Ok(ArtifactStatus {
                    kind,
                    path: self.artifact_path(kind),
                    reason,
                })
            })
            .collect()
    }

    /// Regenerates the aggregation artifact if it is stale, or activates it.
    pub fn regenerate_autoloads(&self, force: bool, debug: bool) -> Result<ArtifactOutcome, GenError> {
        let target = self.layout.autoloads_path();
        let plan = self.plan_autoloads(force)?;
        let guard = self.guard(debug);
        let Some(reason) = plan.reason else {
            return self.activate(&guard, ArtifactKind::Autoloads, &target);
        };
        tracing::info!(artifact = "autoloads", %reason, "regenerating");

        let resolver = PathResolver::new(plan.snapshot.search_paths.clone(), &self.layout.extension);
        let mut extractor = DeclarationExtractor::new(&self.layout.root, resolver);
        let mut buffer = ArtifactBuffer::new(ArtifactKind::Autoloads.name(), true);
        for file in &plan.scan.included {
            let text = match std::fs::read_to_string(&file.path) {
                Ok(text) => text,
                Err(e) => {
                    self.sink.emit(
                        Diagnostic::error(code::READ_ERROR, e.to_string()).at(Location::file(&file.path)),
                    );
                    continue;
                }
            };
            let enabled = self.registry.origin_enabled(&file.origin);
            extractor.process(file, &text, enabled, self.sink);
        }
        let entries = extractor.into_entries();
        let items = entries.len();
        buffer.insert_entries(&entries);

        let image = self.commit(&guard, &target, &buffer.finish(), &plan.snapshot)?;
        tracing::info!(artifact = "autoloads", entries = items, "regenerated");
        Ok(ArtifactOutcome::Regenerated {
            reason,
            items,
            image,
        })
    }

    /// Regenerates the package bundle if it is stale, or activates it.
    pub fn regenerate_packages(&self, force: bool, debug: bool) -> Result<ArtifactOutcome, GenError> {
        let target = self.layout.packages_path();
        let plan = self.plan_packages(force)?;
        let guard = self.guard(debug);
        let Some(reason) = plan.reason else {
            return self.activate(&guard, ArtifactKind::Packages, &target);
        };
        tracing::info!(artifact = "packages", %reason, "regenerating");

        let bundler = PackageBundler::new(&self.packages, &self.config.packages.disabled);
        let bundle = bundler.bundle(&plan.installed, self.sink);
        let text = assemble(
            ArtifactKind::Packages.name(),
            &bundle.chunks,
            Some(&plan.snapshot.cache_state()),
        );

        let image = self.commit(&guard, &target, &text, &plan.snapshot)?;
        Ok(ArtifactOutcome::Regenerated {
            reason,
            items: bundle.activated.len(),
            image,
        })
    }

    fn plan_autoloads(&self, force: bool) -> Result<AutoloadsPlan, GenError> {
        let target = self.layout.autoloads_path();
        let scan = SourceScanner::new(&self.layout, &self.registry).scan(self.sink)?;
        // The aggregation artifact only depends on the project's own directories.
        let snapshot = EnvironmentSnapshot::capture(&self.layout, &self.config, &[]);
        let changed = EnvironmentStamp::environment_changed(&target, snapshot.fingerprint());
        let reason = needs_rebuild(
            &target,
            &scan.candidates(),
            &self.layout.config_files,
            force,
            changed,
        );
        Ok(AutoloadsPlan {
            scan,
            snapshot,
            reason,
        })
    }

    fn plan_packages(&self, force: bool) -> Result<PackagesPlan, GenError> {
        let target = self.layout.packages_path();
        let installed = self.packages.installed(self.sink)?;
        let bundler = PackageBundler::new(&self.packages, &self.config.packages.disabled);
        let snapshot =
            EnvironmentSnapshot::capture(&self.layout, &self.config, &bundler.activated(&installed));
        let changed = EnvironmentStamp::environment_changed(&target, snapshot.fingerprint());
        let reason = needs_rebuild(
            &target,
            &bundler.candidates(&installed),
            &self.layout.config_files,
            force,
            changed,
        );
        Ok(PackagesPlan {
            installed,
            snapshot,
            reason,
        })
    }

    fn guard(&self, debug: bool) -> CompileGuard<'static, FormCompiler, ArtifactLoader> {
        let policy = if self.config.build.keep_previous_on_failure {
            RecoveryPolicy::KeepPrevious
        } else {
            RecoveryPolicy::DiscardPrevious
        };
        CompileGuard::new(&FormCompiler, &ArtifactLoader, &self.layout.compiled_extension)
            .with_policy(policy)
            .with_debug(debug || self.config.build.debug)
    }

    fn activate(
        &self,
        guard: &CompileGuard<'_, FormCompiler, ArtifactLoader>,
        kind: ArtifactKind,
        target: &Path,
    ) -> Result<ArtifactOutcome, GenError> {
        let activated = guard.activate(target)?;
        if let Some(reason) = &activated.fallback {
            self.sink.emit(
                Diagnostic::warning(
                    code::COMPILED_FALLBACK,
                    format!("compiled {kind} artifact is unusable, loaded the text form"),
                )
                .at(Location::file(guard.compiled_path(target)))
                .with_note(reason.clone()),
            );
        }
        tracing::debug!(artifact = %kind, "artifact up to date");
        Ok(ArtifactOutcome::Activated {
            image: activated.image,
            fallback: activated.fallback,
        })
    }

    fn commit(
        &self,
        guard: &CompileGuard<'_, FormCompiler, ArtifactLoader>,
        target: &Path,
        text: &str,
        snapshot: &EnvironmentSnapshot,
    ) -> Result<ArtifactImage, GenError> {
        guard
            .commit(target, text, snapshot.fingerprint())
            .map_err(|e| {
                if let CacheError::CompileFailure { artifact, backup, reason } = &e {
                    self.sink.emit(
                        Diagnostic::error(
                            code::COMPILE_FAILURE,
                            format!("`{artifact}` failed to compile: {reason}"),
                        )
                        .at(Location::file(target))
                        .with_note(format!("the generated text was kept at {}", backup.display())),
                    );
                }
                GenError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse() {
        assert_eq!("autoloads".parse::<Target>().unwrap(), Target::Autoloads);
        assert_eq!("packages".parse::<Target>().unwrap(), Target::Packages);
        assert_eq!("all".parse::<Target>().unwrap(), Target::All);
        let err = "everything".parse::<Target>().unwrap_err();
        assert!(matches!(err, GenError::InvalidTarget(ref t) if t == "everything"));
    }

    #[test]
    fn all_runs_autoloads_first() {
        assert_eq!(
            Target::All.kinds(),
            [ArtifactKind::Autoloads, ArtifactKind::Packages]
        );
        assert_eq!(Target::default(), Target::All);
        assert_eq!(ArtifactKind::Packages.to_string(), "packages");
    }
}
