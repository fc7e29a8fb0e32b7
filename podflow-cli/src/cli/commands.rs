//! Command implementations.

use super::output::{executor_table, pod_table, resolve_pod, resolve_pods, template_table};
use super::{
    Cli, Commands, ConfigCommand, ExecArgs, LsArgs, PsArgs, RmArgs, ScheduleArgs, TemplatesArgs,
    UnscheduleArgs, UpArgs,
};
use anyhow::Context as _;
use chrono::{DateTime, SecondsFormat, Utc};
use podflow::actions::{rank_executors, sort_ranked};
use podflow::config::{config_file, Config};
use podflow::context::{ExecutorFilters, ProvisionContext, ProvisionOptions, VolumeCreateParams};
use podflow::errors::ActionFailed;
use podflow::pipeline::{exec_all, preflight_pipeline, provision_pipeline, remove_all, PipelineOutcome};
use podflow::provider::{ExecutorQuery, HttpProvider, Provider};
use podflow::reporter::{step, ConsoleReporter, Reporter, SummaryItem};
use podflow::store::{FileSelectionStore, LastSelection, SelectionStore};
use podflow::summary::UpSummary;
use podflow::termination::{format_countdown, parse_termination_time};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Runs the parsed command and maps the result to an exit status.
pub async fn run(cli: Cli) -> ExitCode {
    let reporter = Arc::new(ConsoleReporter::new());
    match dispatch(cli.command, &reporter).await {
        Ok(code) => code,
        Err(err) => {
            reporter.error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands, reporter: &Arc<ConsoleReporter>) -> anyhow::Result<ExitCode> {
    let config = Config::load().context("Failed to load configuration")?;
    debug!(base_url = %config.base_url, "Loaded configuration");

    match command {
        Commands::Config(command) => config_command(&command, &config, reporter.as_ref()),
        Commands::Up(args) => up(args, &config, reporter).await,
        Commands::Ls(args) => ls(&args, &HttpProvider::from_config(&config)?, reporter.as_ref()).await,
        Commands::Ps(args) => ps(&args, &HttpProvider::from_config(&config)?, reporter.as_ref()).await,
        Commands::Exec(args) => {
            exec(args, &config, &HttpProvider::from_config(&config)?, reporter.as_ref()).await
        }
        Commands::Rm(args) => rm(&args, &config, &HttpProvider::from_config(&config)?, reporter.as_ref()).await,
        Commands::Schedule(args) => {
            schedule(&args, &HttpProvider::from_config(&config)?, reporter.as_ref()).await
        }
        Commands::Unschedule(args) => {
            unschedule(&args, &HttpProvider::from_config(&config)?, reporter.as_ref()).await
        }
        Commands::Templates(args) => {
            templates(args, &config, &HttpProvider::from_config(&config)?, reporter.as_ref()).await
        }
    }
}

/// Builds run options from flags and configuration.
pub(super) fn up_options(
    args: UpArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> podflow::errors::Result<ProvisionOptions> {
    let termination_time = args
        .ttl
        .as_deref()
        .map(|spec| parse_termination_time(spec, now))
        .transpose()?;

    let options = ProvisionOptions {
        executor_id: args.target,
        filters: ExecutorFilters {
            gpu_type: args.gpu,
            gpu_count: args.count,
            country: args.country,
            min_ports: args.ports,
        },
        name: args.name,
        template_id: args.template,
        default_template_id: config.default_template_id.clone(),
        volume_id: args.volume,
        volume_create: args.create_volume.map(|name| VolumeCreateParams {
            name,
            description: args.volume_description,
        }),
        skip_confirm: args.yes,
        interactive: args.interactive,
        termination_time,
        jupyter: args.jupyter,
        ssh_public_keys: config.ssh_public_keys()?,
        identity_file: config.ssh_key_path.clone(),
        wait_timeout: Some(Duration::from_secs(args.wait_timeout)),
        ..ProvisionOptions::default()
    };
    options.validate()?;
    Ok(options)
}

/// Prints the outcome of a pipeline run; `None` means keep going.
fn outcome_exit(result: Result<PipelineOutcome, ActionFailed>, reporter: &dyn Reporter) -> Option<ExitCode> {
    match result {
        Ok(PipelineOutcome::Completed) => None,
        Ok(PipelineOutcome::Stopped { action, reason }) => {
            info!(action = %action, reason = %reason, "Run stopped");
            Some(ExitCode::SUCCESS)
        }
        Err(err) => {
            reporter.error(&err.to_string());
            Some(ExitCode::FAILURE)
        }
    }
}

async fn up(args: UpArgs, config: &Config, reporter: &Arc<ConsoleReporter>) -> anyhow::Result<ExitCode> {
    let options = up_options(args, config, Utc::now())?;
    let provider: Arc<dyn Provider> = Arc::new(HttpProvider::from_config(config)?);
    let store: Arc<dyn SelectionStore> = Arc::new(FileSelectionStore::default_location()?);
    let mut ctx = ProvisionContext::new(options, provider, reporter.clone(), store);

    if let Some(code) = outcome_exit(preflight_pipeline().run_preflight(&mut ctx).await, reporter.as_ref()) {
        return Ok(code);
    }
    reporter.preflight_block(&UpSummary::preflight(&ctx, Utc::now()).items);

    if let Some(code) = outcome_exit(provision_pipeline().run(&mut ctx).await, reporter.as_ref()) {
        return Ok(code);
    }
    let summary = UpSummary::completion(&ctx, Utc::now());
    reporter.summary_block(&summary.title, &summary.items);
    Ok(ExitCode::SUCCESS)
}

async fn ls(args: &LsArgs, provider: &dyn Provider, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    let query = args.gpu.clone().map_or_else(ExecutorQuery::all, ExecutorQuery::gpu);
    let executors = provider.list_executors(&query).await?;
    if executors.is_empty() {
        reporter.warning(&match &args.gpu {
            Some(gpu) => format!("No {gpu} executors are available"),
            None => "No executors are available".to_string(),
        });
        return Ok(ExitCode::SUCCESS);
    }

    let mut ranked = rank_executors(executors);
    let order = args.sort.into();
    sort_ranked(&mut ranked, order);
    if let Some(limit) = args.limit {
        ranked.truncate(limit);
    }

    let store = FileSelectionStore::default_location()?;
    let ids = ranked.iter().map(|r| r.executor.id.clone()).collect();
    store.set(&LastSelection::new(ids, args.gpu.clone()).with_order(order))?;

    if args.json {
        let rows: Vec<_> = ranked
            .iter()
            .enumerate()
            .map(|(i, r)| {
                serde_json::json!({
                    "index": i + 1,
                    "optimal": r.optimal,
                    "executor": r.executor,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(ExitCode::SUCCESS);
    }

    for line in executor_table(&ranked) {
        reporter.info(&line);
    }
    reporter.dim("★ Pareto-optimal. Rent one with `podflow up <#>`.");
    Ok(ExitCode::SUCCESS)
}

async fn ps(args: &PsArgs, provider: &dyn Provider, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    let pods = provider.list_pods().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&pods)?);
    } else if pods.is_empty() {
        reporter.dim("No pods. Start one with `podflow up`.");
    } else {
        for line in pod_table(&pods) {
            reporter.info(&line);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn exec(
    args: ExecArgs,
    config: &Config,
    provider: &dyn Provider,
    reporter: &dyn Reporter,
) -> anyhow::Result<ExitCode> {
    let pods = provider.list_pods().await?;
    let targets = if args.all { pods } else { resolve_pods(&pods, &args.targets)? };
    if targets.is_empty() {
        reporter.warning("No pods to run on");
        return Ok(ExitCode::SUCCESS);
    }

    let workers = args.workers.unwrap_or(config.max_workers);
    info!(pods = targets.len(), workers, command = %args.command, "Running command");
    let report = exec_all(provider, targets, &args.command, workers).await;

    for outcome in &report.results {
        match &outcome.result {
            Ok(_) if outcome.success => reporter.success(&outcome.target),
            Ok(output) => reporter.error(&format!("{} (exit code {})", outcome.target, output.exit_code)),
            Err(err) => reporter.error(&format!("{}: {err}", outcome.target)),
        }
        if let Ok(output) = &outcome.result {
            for line in output.stdout.lines() {
                reporter.info(&format!("  {line}"));
            }
            for line in output.stderr.lines() {
                reporter.dim(&format!("  {line}"));
            }
        }
    }

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        reporter.warning(&format!(
            "{} of {} pods failed",
            report.failed(),
            report.results.len()
        ));
        Ok(ExitCode::FAILURE)
    }
}

/// Terminates the selected pods; exits 1 if any removal failed.
async fn rm(args: &RmArgs, config: &Config, provider: &dyn Provider, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    let pods = provider.list_pods().await?;
    if pods.is_empty() {
        reporter.warning("No active pods");
        return Ok(ExitCode::SUCCESS);
    }
    let targets = if args.all { pods } else { resolve_pods(&pods, &args.targets)? };

    let names: Vec<&str> = targets.iter().map(|p| p.huid.as_str()).collect();
    let prompt = format!("Remove {} pod(s): {}?", targets.len(), names.join(", "));
    if !args.yes && !reporter.confirm(&prompt, false) {
        reporter.warning("Cancelled");
        return Ok(ExitCode::SUCCESS);
    }

    let report = remove_all(provider, targets, config.max_workers).await;
    for outcome in &report.results {
        match outcome.error() {
            None => reporter.success(&format!("Removed {}", outcome.target)),
            Some(err) => reporter.error(&format!("{}: {err}", outcome.target)),
        }
    }

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        let failed: Vec<&str> = report
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.target.as_str())
            .collect();
        reporter.warning(&format!("Failed to remove pods: {}", failed.join(", ")));
        Ok(ExitCode::FAILURE)
    }
}

async fn schedule(args: &ScheduleArgs, provider: &dyn Provider, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    let now = Utc::now();
    let at = parse_termination_time(&args.ttl, now)?;
    let pods = provider.list_pods().await?;
    let pod = resolve_pod(&pods, &args.target)?;

    let prompt = format!(
        "Terminate {} at {} (in {})?",
        pod.huid,
        at.format("%Y-%m-%d %H:%M UTC"),
        format_countdown(at, now)
    );
    if !args.yes && !reporter.confirm(&prompt, true) {
        reporter.warning("Cancelled");
        return Ok(ExitCode::SUCCESS);
    }

    let iso = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    step(reporter, &format!("Scheduling termination of {}", pod.huid), async {
        provider.schedule_termination(&pod.id, &iso).await
    })
    .await?;
    reporter.success(&format!("{} will be terminated at {}", pod.huid, at.format("%Y-%m-%d %H:%M UTC")));
    Ok(ExitCode::SUCCESS)
}

async fn unschedule(args: &UnscheduleArgs, provider: &dyn Provider, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    let pods = provider.list_pods().await?;
    let pod = resolve_pod(&pods, &args.target)?;
    if pod.removal_scheduled_at.is_none() {
        reporter.warning(&format!("{} has no scheduled termination", pod.huid));
        return Ok(ExitCode::SUCCESS);
    }
    step(reporter, &format!("Cancelling termination of {}", pod.huid), async {
        provider.cancel_scheduled_termination(&pod.id).await
    })
    .await?;
    Ok(ExitCode::SUCCESS)
}

async fn templates(
    args: TemplatesArgs,
    config: &Config,
    provider: &dyn Provider,
    reporter: &dyn Reporter,
) -> anyhow::Result<ExitCode> {
    let templates = provider.list_templates(args.filter).await?;
    if templates.is_empty() {
        reporter.warning("No templates matched");
        return Ok(ExitCode::SUCCESS);
    }
    for line in template_table(&templates, config.default_template_id.as_deref()) {
        reporter.info(&line);
    }
    Ok(ExitCode::SUCCESS)
}

fn config_items(config: &Config) -> Vec<SummaryItem> {
    let unset = || "(not set)".to_string();
    vec![
        SummaryItem::new("api_key", config.masked_api_key().unwrap_or_else(unset)),
        SummaryItem::new("base_url", config.base_url.clone()),
        SummaryItem::new(
            "ssh_key_path",
            config
                .ssh_key_path
                .as_ref()
                .map_or_else(unset, |p| p.display().to_string()),
        ),
        SummaryItem::new(
            "default_template_id",
            config.default_template_id.clone().unwrap_or_else(unset),
        ),
        SummaryItem::new("max_workers", config.max_workers.to_string()),
    ]
}

fn config_command(command: &ConfigCommand, config: &Config, reporter: &dyn Reporter) -> anyhow::Result<ExitCode> {
    match command {
        ConfigCommand::Show => reporter.summary_block("Configuration", &config_items(config)),
        ConfigCommand::Path => println!("{}", config_file()?.display()),
    }
    Ok(ExitCode::SUCCESS)
}
