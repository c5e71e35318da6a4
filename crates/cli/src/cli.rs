use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use logdiff_compute::MinuteWindow;

/// Differential log clustering.
///
/// Compares a control window of categorized log events against a test
/// window and reports unknown messages and abnormal message frequencies.
#[derive(Parser, Debug)]
#[command(name = "logdiff", version, about = "Differential log clustering")]
pub struct CliArgs {
    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides applied on top of the environment configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct AnalysisArgs {
    /// Skip the run when the control window has more clusters than this
    #[arg(long, global = true)]
    pub cluster_limit: Option<usize>,

    /// Frequency direction: 0 = higher is bad, 1 = lower is bad, other = both
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub direction: Option<i64>,

    /// JSON file with previously ignored and feedback clusters
    #[arg(long, global = true)]
    pub known_clusters: Option<PathBuf>,

    /// Query the events were collected with, echoed into the output
    #[arg(long, global = true)]
    pub query: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch both windows over HTTP and post the results back
    Remote(RemoteArgs),
    /// Replay a production export
    File(FileArgs),
    /// Replay a legacy search export
    Legacy(LegacyArgs),
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Endpoint serving control window events
    #[arg(long, env = "CONTROL_INPUT_URL")]
    pub control_input_url: String,

    /// Endpoint serving test window events (omit for a baseline run)
    #[arg(long, env = "TEST_INPUT_URL")]
    pub test_input_url: Option<String>,

    /// Endpoint serving the previous run's output
    #[arg(long, env = "LOG_ANALYSIS_GET_URL")]
    pub prev_state_url: Option<String>,

    /// Endpoint the results are posted to
    #[arg(long, env = "LOG_ANALYSIS_SAVE_URL")]
    pub save_url: String,

    /// Authorization header value (overrides AUTH_TOKEN from config)
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long)]
    pub application_id: String,

    #[arg(long)]
    pub workflow_id: String,

    #[arg(long)]
    pub state_execution_id: String,

    #[arg(long)]
    pub service_id: String,

    #[arg(long)]
    pub log_collection_minute: i64,

    /// Comma-separated control hosts
    #[arg(long, value_delimiter = ',', required = true)]
    pub control_nodes: Vec<String>,

    /// Comma-separated test hosts
    #[arg(long, value_delimiter = ',')]
    pub test_nodes: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Production export. Holds both windows unless --test-input is given,
    /// in which case it holds the control window only.
    #[arg(long)]
    pub input: PathBuf,

    /// Production export for the test window
    #[arg(long)]
    pub test_input: Option<PathBuf>,

    /// Control minutes as `start,end` (inclusive)
    #[arg(long)]
    pub control_window: MinuteWindow,

    /// Test minutes as `start,end` (inclusive)
    #[arg(long)]
    pub test_window: MinuteWindow,

    /// Comma-separated control hosts (single-file mode)
    #[arg(long, value_delimiter = ',', required_unless_present = "test_input")]
    pub control_nodes: Vec<String>,

    /// Comma-separated test hosts (single-file mode)
    #[arg(long, value_delimiter = ',')]
    pub test_nodes: Vec<String>,

    #[command(flatten)]
    pub io: OutputArgs,
}

#[derive(Args, Debug)]
pub struct LegacyArgs {
    /// Legacy search export
    #[arg(long)]
    pub input: PathBuf,

    /// Control minutes as `start,end` (inclusive)
    #[arg(long)]
    pub control_window: MinuteWindow,

    /// Test minutes as `start,end` (inclusive)
    #[arg(long)]
    pub test_window: MinuteWindow,

    #[command(flatten)]
    pub io: OutputArgs,
}

#[derive(Args, Debug, Default)]
pub struct OutputArgs {
    /// Output of a previous run to merge in
    #[arg(long)]
    pub prev_output: Option<PathBuf>,

    /// Where to write the result JSON (default: stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}
