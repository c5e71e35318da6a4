//! Mode dispatch: load events into a store, run the analysis, write or post
//! the resulting state.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use logdiff_compute::loader::{
    load_legacy_file, load_prod_file, load_prod_files, merge_prev_output,
};
use logdiff_compute::{DiffClustering, EventStore, RunStatus};
use logdiff_core::{
    AnalysisConfig, Config, Direction, EventKind, KnownClusters, RunState, TransportConfig,
};
use tracing::{info, warn};

use crate::cli::{AnalysisArgs, CliArgs, Command, FileArgs, LegacyArgs, OutputArgs, RemoteArgs};
use crate::transport::{LogRequest, PrevStateQuery, Transport};

/// Process exit status when neither window yielded any event.
pub const EXIT_NO_DATA: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    NoData,
}

/// Everything a single analysis needs besides the events.
struct Analysis {
    config: AnalysisConfig,
    known: KnownClusters,
    query: Option<String>,
}

impl Analysis {
    fn prepare(args: &AnalysisArgs, mut config: AnalysisConfig) -> Result<Self> {
        if let Some(limit) = args.cluster_limit {
            config.cluster_limit = limit;
        }
        if let Some(flag) = args.direction {
            config.direction = Direction::from_flag(flag);
        }
        let known = match &args.known_clusters {
            Some(path) => load_known_clusters(path)?,
            None => KnownClusters::default(),
        };
        Ok(Self {
            config,
            known,
            query: args.query.clone(),
        })
    }

    fn run(self, store: EventStore) -> Result<RunState> {
        let mut run = DiffClustering::with_default_collaborators(store, self.config)
            .with_known_clusters(self.known);
        if let Some(query) = self.query {
            run = run.with_query(query);
        }

        match run.run().context("analysis failed")? {
            RunStatus::Completed {
                score,
                unknown_clusters,
                frequency_anomalies,
            } => info!(score, unknown_clusters, frequency_anomalies, "analysis complete"),
            RunStatus::Skipped(reason) => warn!(%reason, "analysis skipped"),
        }
        Ok(run.into_state())
    }
}

fn load_known_clusters(path: &Path) -> Result<KnownClusters> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read known clusters from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid known clusters file {}", path.display()))
}

pub async fn execute(args: CliArgs, config: Config) -> Result<Outcome> {
    let analysis = Analysis::prepare(&args.analysis, config.analysis)?;
    match args.command {
        Command::Remote(remote) => run_remote(remote, analysis, config.transport).await,
        Command::File(file) => run_file(file, analysis),
        Command::Legacy(legacy) => run_legacy(legacy, analysis),
    }
}

// ── File modes ──────────────────────────────────────────────

fn run_file(args: FileArgs, analysis: Analysis) -> Result<Outcome> {
    let mut store = EventStore::new();
    match &args.test_input {
        Some(test_input) => {
            load_prod_files(
                &mut store,
                &args.input,
                args.control_window,
                test_input,
                args.test_window,
            )?;
        }
        None => {
            let control_nodes: HashSet<String> = args.control_nodes.iter().cloned().collect();
            let test_nodes: HashSet<String> = args.test_nodes.iter().cloned().collect();
            load_prod_file(
                &mut store,
                &args.input,
                args.control_window,
                args.test_window,
                &control_nodes,
                &test_nodes,
            )?;
        }
    }
    finish_local(store, &args.io, analysis)
}

fn run_legacy(args: LegacyArgs, analysis: Analysis) -> Result<Outcome> {
    let mut store = EventStore::new();
    load_legacy_file(&mut store, &args.input, args.control_window, args.test_window)?;
    finish_local(store, &args.io, analysis)
}

fn finish_local(mut store: EventStore, io: &OutputArgs, analysis: Analysis) -> Result<Outcome> {
    if !store.has_data() {
        warn!("no events in either window");
        return Ok(Outcome::NoData);
    }
    if let Some(prev) = &io.prev_output {
        let merged = merge_prev_output(&mut store, prev)
            .with_context(|| format!("failed to merge previous output {}", prev.display()))?;
        info!(merged, "merged previous output");
    }

    let state = analysis.run(store)?;
    write_state(&state, io.output.as_deref())?;
    Ok(Outcome::Done)
}

fn write_state(state: &RunState, output: Option<&Path>) -> Result<()> {
    let json = state.to_json().context("failed to serialize results")?;
    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write results to {}", path.display()))?;
            info!(path = %path.display(), "results written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

// ── Remote mode ─────────────────────────────────────────────

async fn run_remote(
    args: RemoteArgs,
    analysis: Analysis,
    mut transport_config: TransportConfig,
) -> Result<Outcome> {
    if args.auth_token.is_some() {
        transport_config.auth_token = args.auth_token.clone();
    }
    let transport = Transport::new(&transport_config)?;

    let request = |nodes: &[String]| LogRequest {
        application_id: args.application_id.clone(),
        workflow_id: args.workflow_id.clone(),
        state_execution_id: args.state_execution_id.clone(),
        service_id: args.service_id.clone(),
        log_collection_minute: args.log_collection_minute,
        nodes: nodes.to_vec(),
        query: analysis.query.clone(),
    };

    let mut store = EventStore::new();
    let control = transport
        .fetch_events(&args.control_input_url, &request(&args.control_nodes))
        .await?;
    for record in control {
        store.add_raw(record, EventKind::Control)?;
    }
    if let Some(test_url) = &args.test_input_url {
        let test = transport
            .fetch_events(test_url, &request(&args.test_nodes))
            .await?;
        for record in test {
            store.add_raw(record, EventKind::Test)?;
        }
    }

    if !store.has_data() {
        warn!(
            minute = args.log_collection_minute,
            "no events fetched for either window"
        );
        return Ok(Outcome::NoData);
    }

    if let Some(prev_url) = &args.prev_state_url {
        let query = PrevStateQuery {
            application_id: args.application_id.clone(),
            state_execution_id: args.state_execution_id.clone(),
            query: analysis.query.clone(),
            log_collection_minute: args.log_collection_minute,
        };
        match transport.fetch_prev_state(prev_url, &query).await? {
            Some(prev) => {
                let merged = store.merge_prev_state(&prev);
                info!(merged, "merged previous run state");
            }
            None => info!("no previous run state"),
        }
    }

    let state = tokio::task::spawn_blocking(move || analysis.run(store))
        .await
        .context("analysis task panicked")??;

    transport.post_results(&args.save_url, &state).await?;
    info!(url = %args.save_url, "results posted");
    Ok(Outcome::Done)
}
