//! Downstream transform step run after each export.
//!
//! The step is opaque to the pipeline: it either succeeds or it does not.
//! Every failure, including a missing program, is logged and reported as
//! `false`; it never fails the run that triggered it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Project manifest the transform program expects in its project root.
pub const PROJECT_MANIFEST: &str = "dbt_project.yml";

/// A post-export step.
#[async_trait]
pub trait TransformTrigger: Send + Sync {
    /// Run the step once. `true` on success.
    async fn run_transform(&self) -> bool;
}

/// Settings for the external transform program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    pub enabled: bool,
    /// Program name (looked up on `PATH`) or path.
    pub program: String,
    pub project_dir: PathBuf,
    pub profiles_dir: PathBuf,
    /// Copied to `{project_dir}/dbt_project.yml` when that file is missing.
    pub project_file: Option<PathBuf>,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "dbt".into(),
            project_dir: PathBuf::from("."),
            profiles_dir: PathBuf::from("dbt"),
            project_file: Some(PathBuf::from("config/dbt_project.yml")),
        }
    }
}

/// Runs `dbt run --project-dir <dir> --profiles-dir <dir>`.
#[derive(Debug, Clone)]
pub struct DbtTransform {
    settings: TransformSettings,
}

impl DbtTransform {
    pub fn new(settings: TransformSettings) -> Self {
        Self { settings }
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        let program = Path::new(&self.settings.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        which::which(program).ok()
    }

    fn ensure_manifest(&self) -> std::io::Result<()> {
        let target = self.settings.project_dir.join(PROJECT_MANIFEST);
        if target.exists() {
            return Ok(());
        }
        if let Some(source) = self.settings.project_file.as_ref().filter(|p| p.is_file()) {
            std::fs::copy(source, &target)?;
            info!(from = %source.display(), to = %target.display(), "copied project manifest");
        }
        Ok(())
    }
}

#[async_trait]
impl TransformTrigger for DbtTransform {
    async fn run_transform(&self) -> bool {
        if !self.settings.enabled {
            info!("transform step disabled; skipping");
            return false;
        }
        let Some(program) = self.resolve_program() else {
            warn!(program = %self.settings.program, "transform program not found; skipping");
            return false;
        };
        if let Err(e) = self.ensure_manifest() {
            error!("failed to prepare transform project: {e}");
            return false;
        }

        info!(program = %program.display(), "running transform");
        let output = tokio::process::Command::new(&program)
            .arg("run")
            .arg("--project-dir")
            .arg(&self.settings.project_dir)
            .arg("--profiles-dir")
            .arg(&self.settings.profiles_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                info!("transform completed");
                true
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                error!(status = %out.status, "transform failed: {}", stderr.trim());
                false
            }
            Err(e) => {
                error!("failed to launch transform: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn settings(program: &str, dir: &Path) -> TransformSettings {
        TransformSettings {
            enabled: true,
            program: program.into(),
            project_dir: dir.to_path_buf(),
            profiles_dir: dir.join("profiles"),
            project_file: None,
        }
    }

    #[tokio::test]
    async fn missing_program_reports_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let t = DbtTransform::new(settings("no-such-transform-program-x402", dir.path()));
        assert!(!t.run_transform().await);
    }

    #[tokio::test]
    async fn disabled_step_does_not_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut s = settings("true", dir.path());
        s.enabled = false;
        assert!(!DbtTransform::new(s).run_transform().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_decides_outcome() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(DbtTransform::new(settings("true", dir.path())).run_transform().await);
        assert!(!DbtTransform::new(settings("false", dir.path())).run_transform().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn manifest_is_copied_when_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("config.yml");
        std::fs::write(&source, "name: x402\n").unwrap();
        let mut s = settings("true", dir.path());
        s.project_file = Some(source);

        assert!(DbtTransform::new(s).run_transform().await);
        let copied = std::fs::read_to_string(dir.path().join(PROJECT_MANIFEST)).unwrap();
        assert_eq!(copied, "name: x402\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existing_manifest_is_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROJECT_MANIFEST), "existing").unwrap();
        let source = dir.path().join("config.yml");
        std::fs::write(&source, "replacement").unwrap();
        let mut s = settings("true", dir.path());
        s.project_file = Some(source);

        DbtTransform::new(s).run_transform().await;
        let kept = std::fs::read_to_string(dir.path().join(PROJECT_MANIFEST)).unwrap();
        assert_eq!(kept, "existing");
    }
}
