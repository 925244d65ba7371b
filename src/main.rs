use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use quill_rs::kit::error::WorkflowError;
use quill_rs::kit::events::LogSink;
use quill_rs::kit::step::HumanInput;
use quill_rs::quill::pipeline::{build_article_workflow, ArticleStages};
use quill_rs::quill::workflow::checkpoint::{CheckpointStore, FileCheckpointStore};
use quill_rs::quill::workflow::config::EngineConfig;
use quill_rs::quill::workflow::graph::{RunOutcome, Workflow};
use quill_rs::quill::workflow::interaction::{drive, NoChannel, StdinPrompt};
use quill_rs::quill::workflow::state::{Cursor, WorkflowState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the article workflow graph
    Graph,
    /// Start a new article workflow with placeholder stages
    Run {
        /// Seed query for topic scouting
        #[arg(short, long)]
        query: String,

        #[arg(long)]
        max_revisions: Option<u32>,

        /// Session key for checkpoints (defaults to the workflow id)
        #[arg(long)]
        session: Option<String>,

        /// Stop at the first suspend point instead of prompting
        #[arg(long)]
        non_interactive: bool,
    },
    /// Resume a suspended session with a decision
    #[command(group(
        ArgGroup::new("decision")
            .required(true)
            .args(["select", "approve", "revise"])
    ))]
    Resume {
        #[arg(long)]
        session: String,

        /// 1-based topic number
        #[arg(long)]
        select: Option<usize>,

        #[arg(long)]
        approve: bool,

        /// Request a revision with this feedback
        #[arg(long)]
        revise: Option<String>,
    },
    /// Cancel a suspended session
    Cancel {
        #[arg(long)]
        session: String,

        #[arg(long, default_value = "Cancelled by user")]
        reason: String,
    },
    /// List stored sessions
    Sessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?.with_overrides(|key| std::env::var(key).ok())?,
        None => EngineConfig::from_env()?,
    };
    log::debug!("Engine config: {:?}", config);

    let store = Arc::new(FileCheckpointStore::new(&config.checkpoint_dir));
    let workflow = build_article_workflow(
        ArticleStages::placeholder(),
        &config,
        store.clone(),
        Arc::new(LogSink),
    )
    .await
    .context("failed to build article workflow")?;

    match args.command {
        Commands::Graph => {
            print!("{}", workflow.graph().describe());
        }
        Commands::Run {
            query,
            max_revisions,
            session,
            non_interactive,
        } => {
            let max_revisions = max_revisions.unwrap_or(config.max_revisions);
            let state = WorkflowState::start(&query, max_revisions)?;
            let session = session.unwrap_or_else(|| state.workflow_id.clone());
            log::info!("Starting session {} for query '{}'", session, query);

            if non_interactive {
                let outcome = workflow.run_until_suspend_with_key(&session, state).await?;
                report(&outcome)?;
            } else {
                run_interactive(&workflow, &session, state).await?;
            }
        }
        Commands::Resume {
            session,
            select,
            approve,
            revise,
        } => {
            let input = match (select, approve, revise) {
                (Some(index), _, _) => HumanInput::select(index),
                (_, true, _) => HumanInput::approve(),
                (_, _, Some(feedback)) => HumanInput::revise(feedback),
                _ => bail!("one of --select, --approve or --revise is required"),
            };
            let outcome = workflow.resume(&session, input).await?;
            report(&outcome)?;
        }
        Commands::Cancel { session, reason } => {
            let state = workflow.cancel(&session, &reason).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Sessions => {
            for key in store.list().await? {
                let checkpoint = store.load(&key).await?;
                println!(
                    "{}\t{}\t{}",
                    key,
                    status(&checkpoint.state.current_step, &checkpoint.step),
                    checkpoint.saved_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

/// Drive the session at the terminal; Ctrl-C cancels it and exits
async fn run_interactive(
    workflow: &Workflow,
    session: &str,
    state: WorkflowState,
) -> anyhow::Result<()> {
    let prompt = Arc::new(StdinPrompt::new());

    let state = tokio::select! {
        result = drive(workflow, session, state, &NoChannel, prompt) => result?,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, cancelling session {}", session);
            match workflow.cancel(session, "Interrupted by user").await {
                Ok(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                // Nothing was checkpointed yet
                Err(WorkflowError::Checkpoint(_)) => {
                    eprintln!("Interrupted before the first suspend point");
                }
                Err(e) => return Err(e.into()),
            }
            // The prompt thread is still blocked on stdin; don't wait for it
            std::process::exit(130);
        }
    };

    println!("{}", serde_json::to_string_pretty(&state)?);
    if state.current_step == Cursor::Failed {
        bail!("workflow {} failed", state.workflow_id);
    }
    Ok(())
}

fn report(outcome: &RunOutcome) -> anyhow::Result<()> {
    let body = match outcome {
        RunOutcome::Suspended(suspension) => json!({
            "status": "suspended",
            "session": suspension.session_key,
            "step": suspension.step,
            "request": suspension.request,
        }),
        RunOutcome::Completed(state) => json!({"status": "completed", "state": state}),
        RunOutcome::Failed(state) => json!({"status": "failed", "state": state}),
    };
    println!("{}", serde_json::to_string_pretty(&body)?);

    if let RunOutcome::Failed(state) = outcome {
        bail!("workflow {} failed", state.workflow_id);
    }
    Ok(())
}

fn status(cursor: &Cursor, step: &str) -> String {
    match cursor {
        Cursor::Completed | Cursor::Failed => cursor.to_string(),
        _ => format!("waiting at {}", step),
    }
}
