use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::driver::session::{
    DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_RESPONSE_MARGIN_MS, DEFAULT_STARTUP_TIMEOUT_MS,
    DriverConfig,
};
use crate::planner::path_planner::DEFAULT_SOLVER_TIMEOUT_MS;
use crate::sequencer::runner::{
    DEFAULT_ACTIONABLE_TIMEOUT_MS, DEFAULT_INTER_ACTION_DELAY_MS, DEFAULT_SETTLE_TIMEOUT_MS,
    ExecutionConfig, StopPolicy,
};
use crate::session::navigation::{DEFAULT_PERCEPTION_TIMEOUT_MS, SessionConfig};

pub const DEFAULT_CONFIG_PATH: &str = "screen-navigation.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "screen-navigation",
    version,
    about = "Plan and execute navigation over a discovered state graph"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: screen-navigation.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Grid solver to try before graph search
    #[arg(long, value_enum, global = true)]
    pub solver: Option<SolverKind>,

    /// Endpoint of the remote grid solver (with --solver http)
    #[arg(long, global = true)]
    pub solver_endpoint: Option<String>,

    /// Grid solver time budget in milliseconds
    #[arg(long, global = true)]
    pub solver_timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan a route between two states of a saved graph
    Plan {
        /// Saved graph JSON file
        #[arg(long)]
        graph: String,

        /// State to start from
        #[arg(long)]
        from: String,

        /// State to reach
        #[arg(long)]
        to: String,

        /// Intermediate state to pass through (repeatable, in order)
        #[arg(long)]
        via: Vec<String>,

        /// Output format: text or json
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the grid encoding of a saved graph
    Encode {
        #[arg(long)]
        graph: String,

        #[arg(long)]
        current: String,

        #[arg(long)]
        target: String,

        /// Print numeric token codes instead of the character map
        #[arg(long)]
        codes: bool,
    },

    /// Load a saved graph and report its contents and any repairs
    Inspect {
        #[arg(long)]
        graph: String,
    },

    /// Drive a live target to a state through a driver process
    Navigate {
        /// Saved graph JSON file (updated in place when --save is given)
        #[arg(long)]
        graph: String,

        /// State to reach
        #[arg(long)]
        to: String,

        /// Driver program speaking the NDJSON driver protocol
        #[arg(long)]
        driver: String,

        /// Keep going after a failed action
        #[arg(long)]
        continue_on_failure: bool,

        /// Write the updated graph back to --graph
        #[arg(long)]
        save: bool,

        /// Extra arguments passed to the driver
        #[arg(last = true)]
        driver_args: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Breadth-first search on the token grid
    Bfs,
    /// Remote solver over HTTP
    Http,
    /// Graph search only
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `screen-navigation.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default = "default_perception_timeout")]
    pub perception_timeout_ms: u64,
    /// JSONL trace file; no trace when absent
    #[serde(default)]
    pub trace: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionSettings::default(),
            solver: SolverSettings::default(),
            driver: DriverSettings::default(),
            perception_timeout_ms: DEFAULT_PERCEPTION_TIMEOUT_MS,
            trace: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_actionable_timeout")]
    pub actionable_timeout_ms: u64,

    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,

    #[serde(default = "default_inter_action_delay")]
    pub inter_action_delay_ms: u64,

    #[serde(default)]
    pub max_retries: u32,

    #[serde(default)]
    pub stop_policy: StopPolicy,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            actionable_timeout_ms: DEFAULT_ACTIONABLE_TIMEOUT_MS,
            settle_timeout_ms: DEFAULT_SETTLE_TIMEOUT_MS,
            inter_action_delay_ms: DEFAULT_INTER_ACTION_DELAY_MS,
            max_retries: 0,
            stop_policy: StopPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_solver_kind")]
    pub kind: SolverKind,

    pub endpoint: Option<String>,

    #[serde(default = "default_solver_timeout")]
    pub timeout_ms: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            kind: SolverKind::Bfs,
            endpoint: None,
            timeout_ms: DEFAULT_SOLVER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_ms: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_response_margin")]
    pub response_margin_ms: u64,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            response_margin_ms: DEFAULT_RESPONSE_MARGIN_MS,
        }
    }
}

// Serde default helpers
fn default_actionable_timeout() -> u64 { DEFAULT_ACTIONABLE_TIMEOUT_MS }
fn default_settle_timeout() -> u64 { DEFAULT_SETTLE_TIMEOUT_MS }
fn default_inter_action_delay() -> u64 { DEFAULT_INTER_ACTION_DELAY_MS }
fn default_solver_kind() -> SolverKind { SolverKind::Bfs }
fn default_solver_timeout() -> u64 { DEFAULT_SOLVER_TIMEOUT_MS }
fn default_perception_timeout() -> u64 { DEFAULT_PERCEPTION_TIMEOUT_MS }
fn default_startup_timeout() -> u64 { DEFAULT_STARTUP_TIMEOUT_MS }
fn default_command_timeout() -> u64 { DEFAULT_COMMAND_TIMEOUT_MS }
fn default_response_margin() -> u64 { DEFAULT_RESPONSE_MARGIN_MS }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if the file is missing or
/// malformed; a malformed file is logged.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content).unwrap_or_else(|e| {
            warn!(path = config_path, error = %e, "ignoring malformed config file");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

pub fn parse_config(yaml: &str) -> Result<AppConfig, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

impl ExecutionSettings {
    pub fn to_execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            actionable_timeout: Duration::from_millis(self.actionable_timeout_ms),
            settle_timeout: Duration::from_millis(self.settle_timeout_ms),
            inter_action_delay: Duration::from_millis(self.inter_action_delay_ms),
            max_retries: self.max_retries,
            stop_policy: self.stop_policy,
        }
    }
}

impl DriverSettings {
    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            response_margin: Duration::from_millis(self.response_margin_ms),
        }
    }
}

impl AppConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            execution: self.execution.to_execution_config(),
            perception_timeout: Duration::from_millis(self.perception_timeout_ms),
        }
    }

    /// Apply solver flags over the file values (CLI > file > defaults).
    pub fn resolve_solver(&self, cli: &Cli) -> SolverSettings {
        SolverSettings {
            kind: cli.solver.unwrap_or(self.solver.kind),
            endpoint: cli
                .solver_endpoint
                .clone()
                .or_else(|| self.solver.endpoint.clone()),
            timeout_ms: cli.solver_timeout_ms.unwrap_or(self.solver.timeout_ms),
        }
    }
}
