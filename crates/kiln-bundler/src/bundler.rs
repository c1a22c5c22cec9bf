//! Build orchestration.
//!
//! [`Bundler::build`] runs every phase in memory and returns a
//! [`BuildOutput`]; nothing touches the output directory until
//! [`BuildOutput::write`] is called. Cancellation is checked between phases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{BundleOptions, KilnConfig, validate_schema, validate_settings};
use kiln_graph::{
    CancelFlag, GraphBuilder, ModuleGraph, ModuleParser, NativeRuntime, Runtime, UsageAnalyzer,
    UsageReport,
};
use tracing::{debug, info};

use crate::chunk::{ChunkAllocator, ChunkPlan};
use crate::emit::{Artifact, Emitter, Manifest};
use crate::output::write_files_to;
use crate::plugins::{Plugin, PluginPhase, PluginRegistry};
use crate::{Error, Result};

/// Configured build, ready to run.
pub struct Bundler {
    options: BundleOptions,
    runtime: Arc<dyn Runtime>,
    parser: Option<Arc<dyn ModuleParser>>,
    plugins: PluginRegistry,
    parallel_jobs: Option<usize>,
    cancel: CancelFlag,
}

impl Bundler {
    /// Bundler over the native filesystem.
    pub fn new(options: BundleOptions) -> Self {
        Self {
            options,
            runtime: Arc::new(NativeRuntime::new()),
            parser: None,
            plugins: PluginRegistry::new(),
            parallel_jobs: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Bundler for a loaded configuration, honouring its global settings.
    pub fn from_config(config: KilnConfig) -> Result<Self> {
        validate_settings(&config.settings)?;
        let mut bundler = Self::new(config.bundle);
        bundler.parallel_jobs = config.settings.parallel_jobs;
        Ok(bundler)
    }

    /// Use `runtime` for every read and write.
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ModuleParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Register a plugin. Plugins run in phase order, then registration order.
    pub fn plugin(mut self, phase: PluginPhase, plugin: Plugin) -> Self {
        self.plugins.add_with_phase(plugin, phase);
        self
    }

    pub fn parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = Some(jobs);
        self
    }

    /// Handle that aborts the build from another task.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn options(&self) -> &BundleOptions {
        &self.options
    }

    /// Run resolution, usage analysis, chunk allocation and emission.
    pub async fn build(&self) -> Result<BuildOutput> {
        validate_schema(&self.options)?;
        let (transforms, hooks) = self.plugins.clone().into_pipelines();

        let mut builder = GraphBuilder::from_options(Arc::clone(&self.runtime), &self.options)?
            .transforms(transforms)
            .cancel_flag(self.cancel.clone());
        if let Some(parser) = &self.parser {
            builder = builder.parser(Arc::clone(parser));
        }
        if let Some(jobs) = self.parallel_jobs {
            builder = builder.parallel_jobs(jobs);
        }
        let root = builder.cwd().to_path_buf();

        let graph = builder.build(&self.options.entries).await?;
        self.check_cancelled()?;
        info!(modules = graph.len(), "Module graph built");

        let usage = UsageAnalyzer::new(self.options.tree_shaking).analyze(&graph);
        graph.apply_usage(&usage);
        self.check_cancelled()?;
        debug!(
            retained = usage.retained_count(),
            live_exports = usage.live_export_count(),
            "Usage analyzed"
        );

        let plan = ChunkAllocator::new(&self.options.split_chunks)
            .root(&root)
            .allocate(&graph, &usage)?;
        self.check_cancelled()?;

        let emitted = Emitter::new(&root, &self.options.output)
            .hooks(hooks)
            .emit(&graph, &usage, &plan)?;
        self.check_cancelled()?;
        info!(
            artifacts = emitted.artifacts.len(),
            hash = %emitted.manifest.hash,
            "Build finished"
        );

        Ok(BuildOutput {
            graph,
            usage,
            plan,
            artifacts: emitted.artifacts,
            manifest: emitted.manifest,
            output_dir: root.join(&self.options.output.dir),
            manifest_name: self.options.output.manifest.clone(),
            overwrite: self.options.output.overwrite,
        })
    }

    /// [`build`](Self::build), then write the artifacts and manifest
    /// through the bundler's runtime.
    pub async fn build_and_write(&self) -> Result<BuildOutput> {
        let output = self.build().await?;
        self.check_cancelled()?;
        output.write(self.runtime.as_ref()).await?;
        Ok(output)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Bundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundler")
            .field("options", &self.options)
            .field("plugins", &self.plugins)
            .field("parallel_jobs", &self.parallel_jobs)
            .finish_non_exhaustive()
    }
}

/// Everything a finished build produced, held in memory.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: ModuleGraph,
    pub usage: UsageReport,
    pub plan: ChunkPlan,
    /// One artifact per chunk, in chunk order.
    pub artifacts: Vec<Artifact>,
    pub manifest: Manifest,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    manifest_name: String,
    overwrite: bool,
}

impl BuildOutput {
    pub fn artifact(&self, chunk: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.name == chunk)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact, then the manifest, as one atomic batch.
    ///
    /// Returns the written paths in the same order.
    pub async fn write(&self, runtime: &dyn Runtime) -> Result<Vec<PathBuf>> {
        let manifest = self.manifest.to_json().map_err(crate::emit::EmitError::from)?;

        let mut files: Vec<(&str, &[u8])> = self
            .artifacts
            .iter()
            .map(|artifact| (artifact.file_name.as_str(), artifact.code.as_bytes()))
            .collect();
        files.push((self.manifest_name.as_str(), manifest.as_bytes()));

        let written = write_files_to(runtime, &self.output_dir, &files, self.overwrite).await?;
        info!(dir = %self.output_dir.display(), files = written.len(), "Output written");
        Ok(written)
    }
}
