//! Recipe runner: bake a recipe into an output directory.
//!
//! parse → prepare output dir → enter dir → seed meta.json → steps → archive
//!
//! The working directory and run log are held by guards, so both are
//! restored on every exit path, including step failures.

use super::archive::create_diagnostic_archive;
use super::error::{CsetError, Result};
use super::executor::execute_steps;
use super::metadata::{RunContext, RunMetadata};
use super::parser::{parse_recipe, RecipeSource};
use super::registry::OperatorRegistry;
use super::types::*;
use crate::logging::{attach_run_log, LOG_FILE};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Options for a recipe run.
#[derive(Debug, Clone, Default)]
pub struct BakeOptions {
    /// Template variables; `None` skips substitution entirely
    pub variables: Option<Variables>,

    /// Plot style file, recorded as `style_file_path`
    pub style_file: Option<PathBuf>,

    /// Plot resolution, recorded as `plot_resolution`
    pub plot_resolution: Option<u32>,

    /// Skip writing intermediate data, recorded as `skip_write`
    pub skip_write: Option<bool>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_directory: PathBuf,
    pub archive: PathBuf,
    /// Steps executed, nested steps included
    pub steps: usize,
    pub output: Value,
    pub duration: Duration,
}

/// Changes the working directory and restores the original on drop.
#[derive(Debug)]
pub struct WorkingDirectory {
    original: PathBuf,
}

impl WorkingDirectory {
    pub fn enter(dir: &Path) -> Result<Self> {
        let original = std::env::current_dir().map_err(|e| CsetError::io(".", e))?;
        std::env::set_current_dir(dir).map_err(|e| CsetError::io(dir, e))?;
        Ok(Self { original })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.original) {
            warn!(
                "cannot restore working directory {}: {}",
                self.original.display(),
                e
            );
        }
    }
}

/// Parse and run a recipe, writing all outputs into `output_directory`.
pub fn execute_recipe(
    source: impl Into<RecipeSource>,
    output_directory: &Path,
    registry: &OperatorRegistry,
    options: &BakeOptions,
) -> Result<RunSummary> {
    let start = Instant::now();
    let recipe = parse_recipe(source, options.variables.as_ref())?;
    let output_directory = prepare_output_directory(output_directory)?;
    let ctx = RunContext::in_directory(&output_directory);
    let steps: usize = recipe.steps.iter().map(Step::count).sum();

    let (output, archive) = {
        let _cwd = WorkingDirectory::enter(&output_directory)?;
        let log_path = output_directory.join(LOG_FILE);
        let _log = attach_run_log(&log_path).map_err(|e| CsetError::io(&log_path, e))?;

        let meta = seed_metadata(&recipe, options, &ctx)?;
        ctx.metadata().seed(&meta)?;

        info!(
            "Baking {} ({} steps) into {}",
            recipe.title().unwrap_or("untitled recipe"),
            steps,
            output_directory.display()
        );
        if let Some(description) = recipe.description() {
            info!("{}", description.trim());
        }
        let output = execute_steps(&recipe.steps, registry, &ctx)?;
        let archive = create_diagnostic_archive(&output_directory)?;
        (output, archive)
    };

    let duration = start.elapsed();
    info!("Recipe finished in {:.2}s", duration.as_secs_f64());
    Ok(RunSummary {
        output_directory,
        archive,
        steps,
        output,
        duration,
    })
}

/// Create the output directory (and parents), rejecting plain files.
fn prepare_output_directory(dir: &Path) -> Result<PathBuf> {
    if dir.exists() && !dir.is_dir() {
        warn!("Output directory is a file. {}", dir.display());
        return Err(CsetError::OutputIsFile(dir.to_path_buf()));
    }
    match std::fs::create_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => {
            warn!("Output directory is below a file. {}", dir.display());
            return Err(CsetError::OutputIsFile(dir.to_path_buf()));
        }
        Err(e) => return Err(CsetError::io(dir, e)),
    }
    std::fs::canonicalize(dir).map_err(|e| CsetError::io(dir, e))
}

/// Metadata seed: the recipe's non-step keys plus supplied run options.
fn seed_metadata(recipe: &Recipe, options: &BakeOptions, ctx: &RunContext) -> Result<RunMetadata> {
    let mut meta = RunMetadata::new();
    for (key, value) in &recipe.metadata {
        let json = serde_json::to_value(value).map_err(|e| CsetError::Metadata {
            path: ctx.metadata().path().to_path_buf(),
            message: format!("cannot record '{}': {}", key, e),
        })?;
        meta.insert(key.clone(), json);
    }
    if let Some(ref style) = options.style_file {
        meta.insert(
            "style_file_path".to_string(),
            json!(style.display().to_string()),
        );
    }
    if let Some(resolution) = options.plot_resolution {
        meta.insert("plot_resolution".to_string(), json!(resolution));
    }
    if let Some(skip) = options.skip_write {
        meta.insert("skip_write".to_string(), json!(skip));
    }
    Ok(meta)
}

/// Serialises tests that change the process working directory or run log.
#[cfg(test)]
pub(crate) fn serial() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
