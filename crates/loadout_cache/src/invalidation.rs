//! Staleness decisions for generated artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Why an artifact has to be regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// The caller asked for a rebuild.
    Forced,
    /// The artifact does not exist.
    Missing,
    /// The captured environment differs from the one the artifact was built in.
    EnvironmentChanged,
    /// A configuration file is newer than the artifact.
    ConfigChanged(PathBuf),
    /// A candidate source is newer than the artifact.
    SourceChanged(PathBuf),
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Forced => write!(f, "forced"),
            RebuildReason::Missing => write!(f, "artifact missing"),
            RebuildReason::EnvironmentChanged => write!(f, "environment changed"),
            RebuildReason::ConfigChanged(path) => write!(f, "{} changed", path.display()),
            RebuildReason::SourceChanged(path) => write!(f, "{} changed", path.display()),
        }
    }
}

/// Returns the modification time of `path`, or `None` if it cannot be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Decides whether `target` must be regenerated.
///
/// Conditions are checked in order and the first one that holds is returned:
/// `forced`, a missing target, `environment_changed`, any of `config_files`
/// strictly newer than the target, then any of `sources` strictly newer than
/// the target. Paths that cannot be stat'ed are skipped. Returns `None` when
/// the artifact is fresh. Never touches the filesystem beyond metadata reads.
pub fn needs_rebuild(
    target: &Path,
    sources: &[PathBuf],
    config_files: &[PathBuf],
    forced: bool,
    environment_changed: bool,
) -> Option<RebuildReason> {
    if forced {
        return Some(RebuildReason::Forced);
    }
    let Some(built) = modified_time(target) else {
        return Some(RebuildReason::Missing);
    };
    if environment_changed {
        return Some(RebuildReason::EnvironmentChanged);
    }
    if let Some(path) = first_newer(config_files, built) {
        return Some(RebuildReason::ConfigChanged(path.clone()));
    }
    first_newer(sources, built).map(|path| RebuildReason::SourceChanged(path.clone()))
}

fn first_newer(paths: &[PathBuf], than: SystemTime) -> Option<&PathBuf> {
    paths
        .iter()
        .find(|path| modified_time(path).is_some_and(|m| m > than))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        target: PathBuf,
        source: PathBuf,
        config: PathBuf,
        base: SystemTime,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("autoloads.el");
        let source = dir.path().join("autoload.el");
        let config = dir.path().join("loadout.toml");
        std::fs::write(&target, ";; artifact\n").unwrap();
        std::fs::write(&source, "(defun f ())\n").unwrap();
        std::fs::write(&config, "[project]\n").unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        set_mtime(&source, base);
        set_mtime(&config, base);
        set_mtime(&target, base + Duration::from_secs(60));
        Fixture {
            _dir: dir,
            target,
            source,
            config,
            base,
        }
    }

    #[test]
    fn fresh_artifact_needs_nothing() {
        let fx = fixture();
        let reason = needs_rebuild(
            &fx.target,
            &[fx.source.clone()],
            &[fx.config.clone()],
            false,
            false,
        );
        assert_eq!(reason, None);
    }

    #[test]
    fn forced_wins_over_everything() {
        let fx = fixture();
        std::fs::remove_file(&fx.target).unwrap();
        let reason = needs_rebuild(&fx.target, &[], &[], true, true);
        assert_eq!(reason, Some(RebuildReason::Forced));
    }

    #[test]
    fn missing_target() {
        let fx = fixture();
        std::fs::remove_file(&fx.target).unwrap();
        let reason = needs_rebuild(&fx.target, &[], &[], false, true);
        assert_eq!(reason, Some(RebuildReason::Missing));
    }

    #[test]
    fn environment_change() {
        let fx = fixture();
        let reason = needs_rebuild(&fx.target, &[], &[], false, true);
        assert_eq!(reason, Some(RebuildReason::EnvironmentChanged));
    }

    #[test]
    fn newer_config_checked_before_sources() {
        let fx = fixture();
        let later = fx.base + Duration::from_secs(120);
        set_mtime(&fx.config, later);
        set_mtime(&fx.source, later);
        let reason = needs_rebuild(
            &fx.target,
            &[fx.source.clone()],
            &[fx.config.clone()],
            false,
            false,
        );
        assert_eq!(reason, Some(RebuildReason::ConfigChanged(fx.config.clone())));
    }

    #[test]
    fn newer_source() {
        let fx = fixture();
        set_mtime(&fx.source, fx.base + Duration::from_secs(120));
        let reason = needs_rebuild(&fx.target, &[fx.source.clone()], &[], false, false);
        assert_eq!(reason, Some(RebuildReason::SourceChanged(fx.source.clone())));
    }

    #[test]
    fn equal_mtime_is_not_newer() {
        let fx = fixture();
        set_mtime(&fx.source, fx.base + Duration::from_secs(60));
        let reason = needs_rebuild(&fx.target, &[fx.source.clone()], &[], false, false);
        assert_eq!(reason, None);
    }

    #[test]
    fn unreadable_sources_are_ignored() {
        let fx = fixture();
        let gone = fx.target.with_file_name("deleted.el");
        let reason = needs_rebuild(&fx.target, &[gone], &[], false, false);
        assert_eq!(reason, None);
    }

    #[test]
    fn reason_display() {
        assert_eq!(RebuildReason::Missing.to_string(), "artifact missing");
        assert_eq!(
            RebuildReason::SourceChanged(PathBuf::from("core/autoload.el")).to_string(),
            "core/autoload.el changed"
        );
    }
}
