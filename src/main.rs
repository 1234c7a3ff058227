use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::{StreamExt, future};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vigil_config::PipelineDef;
use vigil_pipeline::WorkerGraph;
use vigil_registry::WorkerRegistry;
use vigil_worker::{ErrorStream, ItemStream};

/// Vigil - run security-tool pipelines as graphs of streaming workers
#[derive(Parser)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline, reading items from stdin one per line
  Run {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,
  },

  /// Check that a pipeline builds and has no cycles, without running it
  Validate {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,
  },

  /// List available worker plugins
  Plugins,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // logs go to stderr; stdout carries pipeline output
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  match cli.command {
    Some(Commands::Run { pipeline_file }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_pipeline(pipeline_file))?;
    }
    Some(Commands::Validate { pipeline_file }) => {
      validate_pipeline(pipeline_file)?;
    }
    Some(Commands::Plugins) => {
      for plugin in WorkerRegistry::with_builtins().plugins() {
        println!("{plugin}");
      }
    }
    None => {
      println!("vigil - use --help to see available commands");
    }
  }

  Ok(())
}

fn load(pipeline_file: &Path) -> Result<WorkerGraph<Bytes>> {
  let def = PipelineDef::from_path(pipeline_file)
    .with_context(|| format!("failed to load pipeline file: {}", pipeline_file.display()))?;
  info!(pipeline = %def.name, stages = def.stages.len(), "pipeline_loaded");

  WorkerRegistry::with_builtins()
    .build(&def)
    .with_context(|| format!("failed to build pipeline '{}'", def.name))
}

fn validate_pipeline(pipeline_file: PathBuf) -> Result<()> {
  let mut graph = load(&pipeline_file)?;
  graph
    .initialize()
    .with_context(|| format!("pipeline '{}' is not runnable", graph.name()))?;
  println!("{}: {} stages ok", graph.name(), graph.len());
  Ok(())
}

async fn run_pipeline(pipeline_file: PathBuf) -> Result<()> {
  let mut graph = load(&pipeline_file)?;
  graph.set_input(stdin_lines());

  let failures = drive(&mut graph, interrupted(), |item| {
    println!("{}", String::from_utf8_lossy(&item))
  })
  .await?;
  if failures > 0 {
    bail!("pipeline '{}' finished with {failures} worker error(s)", graph.name());
  }
  info!(pipeline = %graph.name(), "pipeline_completed");
  Ok(())
}

/// Start `graph`, hand every output item to `sink`, and wait until every
/// stage has finished: the output is drained and the error stream closed.
/// Sink stages have no output, so the run is over only once their errors
/// close. `interrupt` firing closes the pipeline early.
///
/// Returns the number of worker errors.
async fn drive<F, S>(graph: &mut WorkerGraph<Bytes>, interrupt: F, mut sink: S) -> Result<usize>
where
  F: Future<Output = ()>,
  S: FnMut(Bytes),
{
  let mut output = graph.output();
  let errors = graph
    .start(CancellationToken::new())
    .await
    .with_context(|| format!("failed to start pipeline '{}'", graph.name()))?;

  let printing = async move {
    while let Some(item) = output.next().await {
      sink(item);
    }
  };
  let run = async move { tokio::join!(printing, count_failures(errors)).1 };
  tokio::pin!(run);
  tokio::pin!(interrupt);

  let failures = tokio::select! {
    failures = &mut run => failures,
    _ = &mut interrupt => {
      warn!(pipeline = %graph.name(), "interrupted");
      graph.close();
      run.await
    }
  };
  Ok(failures)
}

/// Resolves on Ctrl-C. Never resolves if the signal handler can't be installed.
async fn interrupted() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for ctrl-c");
    future::pending::<()>().await;
  }
}

/// Stdin as a stream of lines, ending at EOF or on the first read error.
fn stdin_lines() -> ItemStream<Bytes> {
  LinesStream::new(BufReader::new(tokio::io::stdin()).lines())
    .scan((), |_, line| {
      future::ready(match line {
        Ok(line) => Some(Bytes::from(line)),
        Err(e) => {
          warn!(error = %e, "failed to read stdin");
          None
        }
      })
    })
    .boxed()
}

async fn count_failures(mut errors: ErrorStream) -> usize {
  let mut failures = 0;
  while let Some(err) = errors.next().await {
    warn!(worker = %err.worker, error = %err.message, "worker_error");
    failures += 1;
  }
  failures
}
