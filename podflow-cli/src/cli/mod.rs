//! Command-line interface for podflow.
//!
//! Argument parsing lives here; each command is implemented in
//! [`commands`], table and target helpers in [`output`].

mod commands;
mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use podflow::store::ListingOrder;

pub use commands::run;

#[derive(Parser, Debug)]
#[command(name = "podflow")]
#[command(about = "Provision and manage GPU pods on rented executors")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rent a pod and wait until it is reachable
    Up(UpArgs),

    /// List available executors, Pareto-optimal ones starred
    Ls(LsArgs),

    /// List your pods
    Ps(PsArgs),

    /// Run a command on one or more pods
    Exec(ExecArgs),

    /// Terminate pods now
    Rm(RmArgs),

    /// Schedule automatic termination of a pod
    Schedule(ScheduleArgs),

    /// Cancel a scheduled termination
    Unschedule(UnscheduleArgs),

    /// List available templates
    Templates(TemplatesArgs),

    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Executor id, huid, or 1-based index from the last `ls`
    pub target: Option<String>,

    /// GPU type filter, e.g. H100
    #[arg(long)]
    pub gpu: Option<String>,

    /// Exact GPU count
    #[arg(long)]
    pub count: Option<u32>,

    /// ISO country code
    #[arg(long)]
    pub country: Option<String>,

    /// Minimum number of available ports
    #[arg(long)]
    pub ports: Option<u32>,

    /// Pod name (defaults to the executor huid)
    #[arg(long)]
    pub name: Option<String>,

    /// Template id
    #[arg(short, long)]
    pub template: Option<String>,

    /// Attach an existing volume
    #[arg(long, conflicts_with = "create_volume")]
    pub volume: Option<String>,

    /// Create a volume with this name and attach it
    #[arg(long)]
    pub create_volume: Option<String>,

    /// Description for the created volume
    #[arg(long, requires = "create_volume", default_value = "")]
    pub volume_description: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Choose executor and template interactively; wait without a timeout
    #[arg(short, long)]
    pub interactive: bool,

    /// Auto-terminate after a duration (2h, 1d12h) or at a time (2025-03-01 18:00)
    #[arg(long)]
    pub ttl: Option<String>,

    /// Install Jupyter once the pod is running
    #[arg(long)]
    pub jupyter: bool,

    /// Seconds to wait for the pod to become ready
    #[arg(long, default_value = "300")]
    pub wait_timeout: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Pareto-optimal first, then by price per GPU hour
    #[default]
    Price,
    /// GPU type, then count
    Gpu,
    /// Executor huid
    Id,
}

impl From<SortKey> for ListingOrder {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Price => Self::Price,
            SortKey::Gpu => Self::Gpu,
            SortKey::Id => Self::Id,
        }
    }
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Only show this GPU type
    pub gpu: Option<String>,

    /// Sort order
    #[arg(long, value_enum, default_value_t = SortKey::Price)]
    pub sort: SortKey,

    /// Show at most this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Command to run
    pub command: String,

    /// Pods by id, huid, name or 1-based `ps` index
    #[arg(conflicts_with = "all", required_unless_present = "all")]
    pub targets: Vec<String>,

    /// Run on every pod
    #[arg(long)]
    pub all: bool,

    /// Concurrent workers (defaults to the configured max_workers)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Pods by id, huid, name or 1-based `ps` index
    #[arg(conflicts_with = "all", required_unless_present = "all")]
    pub targets: Vec<String>,

    /// Remove every pod
    #[arg(short, long)]
    pub all: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Pod id, huid, name or 1-based `ps` index
    pub target: String,

    /// Duration (2h, 1d12h) or time (2025-03-01 18:00)
    #[arg(long)]
    pub ttl: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct UnscheduleArgs {
    /// Pod id, huid, name or 1-based `ps` index
    pub target: String,
}

#[derive(Args, Debug)]
pub struct TemplatesArgs {
    /// Case-insensitive filter on name or image
    pub filter: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_up_with_filters() {
        let cli = Cli::parse_from([
            "podflow", "up", "--gpu", "H100", "--count", "8", "--yes", "--ttl", "2h",
        ]);
        let Commands::Up(args) = cli.command else {
            panic!("expected up");
        };
        assert_eq!(args.gpu.as_deref(), Some("H100"));
        assert_eq!(args.count, Some(8));
        assert!(args.yes);
        assert_eq!(args.wait_timeout, 300);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_volume_flags_conflict() {
        let result = Cli::try_parse_from([
            "podflow", "up", "--volume", "v1", "--create-volume", "data",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exec_requires_targets_or_all() {
        assert!(Cli::try_parse_from(["podflow", "exec", "nvidia-smi"]).is_err());
        let cli = Cli::try_parse_from(["podflow", "exec", "nvidia-smi", "--all", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level, "debug");
        let Commands::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert!(args.all);
        assert!(args.targets.is_empty());
    }

    #[test]
    fn test_parse_rm_targets() {
        let cli = Cli::parse_from(["podflow", "rm", "1", "calm-eagle-1a", "-y"]);
        let Commands::Rm(args) = cli.command else {
            panic!("expected rm");
        };
        assert_eq!(args.targets, vec!["1".to_string(), "calm-eagle-1a".to_string()]);
        assert!(args.yes);
        assert!(Cli::try_parse_from(["podflow", "rm", "1", "--all"]).is_err());
    }

    #[test]
    fn test_ls_sort_values() {
        let cli = Cli::parse_from(["podflow", "ls", "A100", "--sort", "gpu", "--limit", "5"]);
        let Commands::Ls(args) = cli.command else {
            panic!("expected ls");
        };
        assert_eq!(args.sort, SortKey::Gpu);
        assert_eq!(ListingOrder::from(args.sort), ListingOrder::Gpu);
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.gpu.as_deref(), Some("A100"));
    }
}
