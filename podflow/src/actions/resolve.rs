//! Executor and template resolution, and the confirmation gate.

use super::{Action, ActionContext, Flow};
use crate::context::{ExecutorFilters, ProvisionContext};
use crate::errors::{PodflowError, Result};
use crate::provider::{ExecutorInfo, ExecutorQuery, Provider};
use crate::reporter::step;
use crate::selection::{pareto_frontier, pick_best, rank_candidates, MetricPolicy};
use crate::store::{parse_index, resolve_index, LastSelection, ListingOrder, SelectionStore};
use async_trait::async_trait;
use tracing::{debug, info};

/// Number of executors offered in interactive choice.
const INTERACTIVE_CHOICES: usize = 20;

/// An executor with its Pareto flag, in ranking order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedExecutor {
    /// The executor.
    pub executor: ExecutorInfo,
    /// True if Pareto-optimal within the listing.
    pub optimal: bool,
}

/// Ranks executors Pareto-optimal first, then by price per GPU hour.
#[must_use]
pub fn rank_executors(executors: Vec<ExecutorInfo>) -> Vec<RankedExecutor> {
    let policy = MetricPolicy::executor_default();
    let candidates: Vec<_> = executors.iter().map(ExecutorInfo::to_candidate).collect();
    let order = rank_candidates(&candidates, &policy);

    let mut slots: Vec<Option<ExecutorInfo>> = executors.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|(i, optimal)| slots[i].take().map(|executor| RankedExecutor { executor, optimal }))
        .collect()
}

/// Reorders a ranked listing; `Price` keeps the ranking as is.
pub fn sort_ranked(ranked: &mut [RankedExecutor], order: ListingOrder) {
    match order {
        ListingOrder::Price => {}
        ListingOrder::Gpu => ranked.sort_by(|a, b| {
            a.executor
                .gpu_type
                .cmp(&b.executor.gpu_type)
                .then(b.executor.gpu_count.cmp(&a.executor.gpu_count))
        }),
        ListingOrder::Id => ranked.sort_by(|a, b| a.executor.huid.cmp(&b.executor.huid)),
    }
}

fn choice_label(ranked: &RankedExecutor) -> String {
    let e = &ranked.executor;
    format!(
        "{:<22} {:<10} ${:>6.2}/GPU/h  {}{}",
        e.huid,
        e.config_label(),
        e.price_per_gpu_hour,
        e.country_name().unwrap_or_else(|| "-".to_string()),
        if ranked.optimal { "  ★" } else { "" }
    )
}

/// Picks the executor to rent on.
///
/// An explicit id (or listing index) is looked up directly, with one retry
/// against a refreshed catalog, and must offer at least `min_ports` ports
/// when that filter is set. Filters select the best Pareto-optimal match.
/// Without either, the user chooses interactively.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveExecutor;

impl ResolveExecutor {
    async fn explicit(
        provider: &dyn Provider,
        store: &dyn SelectionStore,
        target: &str,
        min_ports: Option<u32>,
    ) -> Result<ExecutorInfo> {
        let executor = Self::lookup(provider, store, target).await?;
        if let Some(required) = min_ports {
            let available = executor.available_port_count.unwrap_or(0);
            if available < required {
                return Err(PodflowError::Unresolved(format!(
                    "Executor {} has insufficient ports (available: {available}, required: {required})",
                    executor.huid
                )));
            }
        }
        Ok(executor)
    }

    async fn lookup(
        provider: &dyn Provider,
        store: &dyn SelectionStore,
        target: &str,
    ) -> Result<ExecutorInfo> {
        let first = match resolve_index(target, store) {
            Ok(id) => provider.get_executor(&id).await?,
            Err(e) if e.is_resolution_failure() => None,
            Err(e) => return Err(e),
        };
        if let Some(executor) = first {
            return Ok(executor);
        }

        debug!(target = %target, "Executor not in cached listing, refreshing catalog");
        let (stored_gpu, order) = store
            .get()?
            .map_or((None, ListingOrder::default()), |s| (s.gpu_type, s.order));
        let query = stored_gpu.clone().map_or_else(ExecutorQuery::all, ExecutorQuery::gpu);
        let executors = provider.list_executors(&query).await?;

        match parse_index(target) {
            Some(index) => {
                let mut ranked = rank_executors(executors);
                sort_ranked(&mut ranked, order);
                let ids = ranked.iter().map(|r| r.executor.id.clone()).collect();
                store.set(&LastSelection::new(ids, stored_gpu).with_order(order))?;
                ranked
                    .into_iter()
                    .nth(index - 1)
                    .map(|r| r.executor)
                    .ok_or_else(|| PodflowError::not_found("executor", target))
            }
            None => executors
                .into_iter()
                .find(|e| e.id == target || e.huid == target)
                .ok_or_else(|| PodflowError::not_found("executor", target)),
        }
    }

    async fn filtered(provider: &dyn Provider, filters: &ExecutorFilters) -> Result<ExecutorInfo> {
        let query = filters
            .gpu_type
            .clone()
            .map_or_else(ExecutorQuery::all, ExecutorQuery::gpu);
        let mut executors: Vec<ExecutorInfo> = provider
            .list_executors(&query)
            .await?
            .into_iter()
            .filter(|e| filters.matches(e))
            .collect();

        if executors.is_empty() {
            if let Some(gpu) = &filters.gpu_type {
                let known = provider.gpu_types().await?;
                if !known.iter().any(|g| g.eq_ignore_ascii_case(gpu)) {
                    return Err(PodflowError::Unresolved(format!("GPU '{gpu}' not recognized")));
                }
            }
            return Err(PodflowError::Unresolved(format!(
                "All matching GPUs are currently rented out (filters: {})",
                filters.describe()
            )));
        }

        let policy = MetricPolicy::executor_default();
        let candidates: Vec<_> = executors.iter().map(ExecutorInfo::to_candidate).collect();
        let flags = pareto_frontier(&candidates, &policy);
        let best = pick_best(&candidates, &policy, &flags).unwrap_or(0);
        debug!(
            matches = executors.len(),
            optimal = flags.iter().filter(|f| **f).count(),
            "Selected executor from filtered catalog"
        );
        Ok(executors.swap_remove(best))
    }

    async fn interactive(ctx: &ProvisionContext) -> Result<Option<ExecutorInfo>> {
        let executors = ctx.provider().list_executors(&ExecutorQuery::all()).await?;
        if executors.is_empty() {
            return Err(PodflowError::Unresolved(
                "No executors are currently available".to_string(),
            ));
        }
        let mut ranked = rank_executors(executors);
        ranked.truncate(INTERACTIVE_CHOICES);
        let labels: Vec<String> = ranked.iter().map(choice_label).collect();
        let choice = ctx.reporter().select("Select an executor", &labels, 0);
        Ok(choice.and_then(|i| ranked.into_iter().nth(i)).map(|r| r.executor))
    }

    async fn resolve(ctx: &ProvisionContext) -> Result<Option<ExecutorInfo>> {
        let options = ctx.options();
        let provider = ctx.provider();
        if let Some(target) = &options.executor_id {
            Self::explicit(provider.as_ref(), ctx.store(), target, options.filters.min_ports)
                .await
                .map(Some)
        } else if !options.filters.is_empty() {
            Self::filtered(provider.as_ref(), &options.filters).await.map(Some)
        } else {
            Self::interactive(ctx).await
        }
    }
}

#[async_trait]
impl Action<ProvisionContext> for ResolveExecutor {
    fn name(&self) -> &str {
        "ResolveExecutor"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        !ctx.executor.is_filled()
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let resolved = {
            let ctx: &ProvisionContext = ctx;
            step(ctx.reporter(), "Resolving executor", Self::resolve(ctx)).await
        };

        match resolved {
            Ok(Some(executor)) => {
                info!(executor = %executor.huid, gpu = %executor.config_label(), "Resolved executor");
                ctx.executor.set(executor)?;
                Ok(Flow::Continue)
            }
            Ok(None) => {
                ctx.reporter().warning("No executor selected");
                Ok(Flow::stop("No executor selected"))
            }
            Err(e) if e.is_resolution_failure() => {
                let message = e.to_string();
                ctx.reporter().error(&message);
                Ok(Flow::Stop(message))
            }
            Err(e) => Err(e),
        }
    }
}

/// Looks up an explicitly requested template.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveTemplate;

#[async_trait]
impl Action<ProvisionContext> for ResolveTemplate {
    fn name(&self) -> &str {
        "ResolveTemplate"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        ctx.options().template_id.is_some() && !ctx.template.is_filled()
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let Some(template_id) = ctx.options().template_id.clone() else {
            return Ok(Flow::Continue);
        };
        let provider = ctx.provider();
        let lookup = step(ctx.reporter(), "Loading template", async {
            provider
                .get_template(&template_id)
                .await?
                .ok_or_else(|| PodflowError::not_found("template", template_id.as_str()))
        })
        .await;
        match lookup {
            Ok(template) => {
                ctx.template.set(template)?;
                Ok(Flow::Continue)
            }
            Err(e) if e.is_resolution_failure() => {
                let message = e.to_string();
                ctx.reporter().error(&message);
                Ok(Flow::Stop(message))
            }
            Err(e) => Err(e),
        }
    }
}

/// Asks before renting. Not shown as a numbered step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmCreation;

#[async_trait]
impl Action<ProvisionContext> for ConfirmCreation {
    fn name(&self) -> &str {
        "ConfirmCreation"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        !ctx.options().skip_confirm
    }

    fn counts_as_step(&self, _ctx: &ProvisionContext) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let executor = ctx.executor.require()?;
        let prompt = format!(
            "Rent {} ({}) at ${:.2}/h?",
            executor.huid,
            executor.config_label(),
            executor.price_per_hour
        );
        if ctx.reporter().confirm(&prompt, true) {
            Ok(Flow::Continue)
        } else {
            ctx.reporter().warning("Cancelled");
            Ok(Flow::stop("Cancelled by user"))
        }
    }
}
