//! The nightly pipeline: maps every stage of the graph onto its component
//!
//! Shared mutable state is limited to `RunState`: the registered identity
//! (written once), the merger's input set and the append-only report lists.

use super::executor;
use super::graph::{Stage, StageGraph};
use super::report::{NodeOutcome, NodeReport, RunReport};
use crate::build::{
  ArchiveFormat, ArtifactRecord, BuildTarget, CommandBuilder, FanoutOutput, LipoMerger, MERGED_PLATFORM, MergeInputs,
  Merger, Packager, PlatformBuilder, build_platform, fuse,
};
use crate::core::config::MirrorChannel;
use crate::core::context::RunContext;
use crate::core::error::{NightlyResult, PipelineError};
use crate::publish::{self, MirrorUpdater, PublishRecord};
use crate::release::{self, ReleaseHost, ReleaseIdentity};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

#[derive(Default)]
struct RunState {
  identity: OnceLock<ReleaseIdentity>,
  merge_inputs: Mutex<MergeInputs>,
  artifacts: Mutex<Vec<ArtifactRecord>>,
  publishes: Mutex<Vec<PublishRecord>>,
}

impl RunState {
  fn identity(&self) -> Result<&ReleaseIdentity, String> {
    self.identity.get().ok_or_else(|| "release was not registered".to_string())
  }

  fn record_artifact(&self, record: ArtifactRecord) {
    lock(&self.artifacts).push(record);
  }

  fn record_publish(&self, record: PublishRecord) {
    lock(&self.publishes).push(record);
  }
}

/// A poisoned lock only means another stage panicked; its data is still append-only
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Pipeline {
  host: Arc<dyn ReleaseHost>,
  builder: Arc<dyn PlatformBuilder>,
  merger: Arc<dyn Merger>,
}

impl Pipeline {
  pub fn new(host: Arc<dyn ReleaseHost>, builder: Arc<dyn PlatformBuilder>, merger: Arc<dyn Merger>) -> Self {
    Self { host, builder, merger }
  }

  /// Pipeline wired to the configured host, build command and merge tool
  pub fn from_context(ctx: &RunContext) -> NightlyResult<Self> {
    let config = &ctx.config;
    Ok(Self::new(
      release::release_host(config, &ctx.root)?,
      Arc::new(CommandBuilder::new(&config.build, &ctx.root)),
      Arc::new(LipoMerger::new(&config.merge.program)),
    ))
  }

  /// Run the whole graph, or nothing at all if the gate cancelled the run
  pub fn run<C>(&self, ctx: &RunContext, on_complete: C) -> NightlyResult<RunReport>
  where
    C: FnMut(&NodeReport),
  {
    if ctx.decision.skips_run(ctx.trigger.kind) {
      tracing::info!(reason = %ctx.decision.reason, "scheduled run is stale; nothing to do");
      return Ok(RunReport::skipped(ctx));
    }

    let graph = StageGraph::nightly(&ctx.config);
    let state = RunState::default();
    let nodes = executor::execute(&graph, |stage| self.run_stage(ctx, &state, stage), on_complete)?;

    let mut artifacts = state.artifacts.into_inner().unwrap_or_else(PoisonError::into_inner);
    artifacts.sort_by(|a, b| a.platform.cmp(&b.platform));
    let mut publishes = state.publishes.into_inner().unwrap_or_else(PoisonError::into_inner);
    publishes.sort_by(|a, b| (a.channel.as_str(), &a.name).cmp(&(b.channel.as_str(), &b.name)));

    Ok(RunReport {
      run_id: ctx.trigger.run_id.clone(),
      trigger: ctx.trigger.kind,
      date: ctx.date.dashed.clone(),
      decision: ctx.decision.clone(),
      identity: state.identity.into_inner(),
      nodes,
      artifacts,
      publishes,
    })
  }

  fn run_stage(&self, ctx: &RunContext, state: &RunState, stage: &Stage) -> NodeOutcome {
    let result = match stage {
      Stage::Registrar => self.register(ctx, state),
      Stage::Build(name) => self.build(ctx, state, name).map_err(|reason| stage.failure(reason)),
      Stage::Merge => self.merge(ctx, state),
      Stage::Mirror(channel) => self.mirror(ctx, state, *channel).map_err(|reason| stage.failure(reason)),
      Stage::PackageIndex => self.package_index(ctx, state).map_err(|reason| stage.failure(reason)),
    };

    match result {
      Ok(()) => NodeOutcome::Succeeded,
      Err(error) => NodeOutcome::Failed { error },
    }
  }

  fn register(&self, ctx: &RunContext, state: &RunState) -> Result<(), PipelineError> {
    let identity = release::register(self.host.as_ref(), &ctx.date)
      .map_err(|e| PipelineError::RegistrarFailure { reason: e.to_string() })?;
    // The registrar node runs exactly once per graph
    let _ = state.identity.set(identity);
    Ok(())
  }

  fn packager(&self, ctx: &RunContext) -> Packager {
    Packager::new(&ctx.root, &ctx.config.project.package_files, &ctx.work_dir())
  }

  fn build(&self, ctx: &RunContext, state: &RunState, name: &str) -> Result<(), String> {
    let identity = state.identity()?;
    let target = BuildTarget::find(name).ok_or_else(|| format!("'{}' is not a declared build target", name))?;

    let output = build_platform(
      self.builder.as_ref(),
      &self.packager(ctx),
      target,
      &ctx.config.build.binary,
      &ctx.artifact_prefix(),
    )
    .map_err(|e| e.to_string())?;
    state.record_artifact(output.artifact().record());

    match output {
      FanoutOutput::Raw(artifact) => lock(&state.merge_inputs).insert(artifact).map_err(|e| e.to_string()),
      FanoutOutput::Packaged(artifact) => {
        let record = publish::upload_artifact(self.host.as_ref(), identity, artifact).map_err(|e| e.to_string())?;
        state.record_publish(record);
        Ok(())
      }
    }
  }

  fn merge(&self, ctx: &RunContext, state: &RunState) -> Result<(), PipelineError> {
    let failure = |reason: String| PipelineError::MergeFailure { reason };
    let identity = state.identity().map_err(failure)?;

    let binary = &ctx.config.build.binary;
    let output = ctx.work_dir().join("merged").join(binary);
    let merged = lock(&state.merge_inputs).take_pair(&output)?;

    fuse(self.merger.as_ref(), &merged).map_err(|e| failure(e.to_string()))?;
    state.record_artifact(merged.record());

    let archive = self
      .packager(ctx)
      .package(MERGED_PLATFORM, &merged.output_path, binary, &ctx.artifact_prefix())
      .map_err(|e| failure(e.to_string()))?;
    let record = publish::upload_archive(self.host.as_ref(), identity, &archive, ArchiveFormat::TarGz)
      .map_err(|e| failure(e.to_string()))?;
    state.record_publish(record);
    Ok(())
  }

  fn mirror(&self, ctx: &RunContext, state: &RunState, channel: MirrorChannel) -> Result<(), String> {
    let mirror = ctx
      .config
      .mirror(channel)
      .ok_or_else(|| format!("no mirror configured for '{}'", channel.as_str()))?;
    let updater = MirrorUpdater::from_config(&ctx.config.identity);
    let record = publish::publish_mirror(ctx, mirror, &updater).map_err(|e| e.to_string())?;
    state.record_publish(record);
    Ok(())
  }

  fn package_index(&self, ctx: &RunContext, state: &RunState) -> Result<(), String> {
    let index = ctx
      .config
      .package_index
      .as_ref()
      .ok_or_else(|| "no package index configured".to_string())?;
    let record = publish::publish_package_index(ctx, index).map_err(|e| e.to_string())?;
    state.record_publish(record);
    Ok(())
  }
}
