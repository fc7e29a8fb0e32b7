//! Pre-flight and completion summaries for `up`.

use crate::context::ProvisionContext;
use crate::reporter::SummaryItem;
use crate::termination::format_countdown;
use chrono::{DateTime, Utc};

/// A titled list of label/value items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpSummary {
    /// Block title.
    pub title: String,
    /// Lines in display order.
    pub items: Vec<SummaryItem>,
}

fn termination_item(ctx: &ProvisionContext, now: DateTime<Utc>) -> Option<SummaryItem> {
    ctx.options().termination_time.map(|at| {
        SummaryItem::new(
            "Auto-terminate",
            format!(
                "{} (in {})",
                at.format("%Y-%m-%d %H:%M UTC"),
                format_countdown(at, now)
            ),
        )
    })
}

impl UpSummary {
    /// What is about to be rented, built from the pre-flight context.
    #[must_use]
    pub fn preflight(ctx: &ProvisionContext, now: DateTime<Utc>) -> Self {
        let options = ctx.options();
        let mut items = Vec::new();

        if let Some(executor) = ctx.executor.get() {
            items.push(SummaryItem::new(
                "Executor",
                format!("{} ({})", executor.huid, executor.config_label()),
            ));
            items.push(SummaryItem::new(
                "Location",
                executor.country_name().unwrap_or_else(|| "Unknown".to_string()),
            ));
            items.push(SummaryItem::new(
                "Cost",
                format!(
                    "${:.2}/h (${:.2}/GPU/h)",
                    executor.price_per_hour, executor.price_per_gpu_hour
                ),
            ));
        }

        let template = match ctx.template.get() {
            Some(t) => format!("{} ({})", t.name, t.image_ref()),
            None if options.interactive => "choose when renting".to_string(),
            None => options
                .default_template_id
                .as_ref()
                .map_or_else(|| "default".to_string(), |id| format!("{id} (configured default)")),
        };
        items.push(SummaryItem::new("Template", template));

        if let Some(id) = &options.volume_id {
            items.push(SummaryItem::new("Volume", id.clone()));
        } else if let Some(params) = &options.volume_create {
            items.push(SummaryItem::new("Volume", format!("new: {}", params.name)));
        }
        if options.jupyter {
            items.push(SummaryItem::new("Jupyter", "install after start"));
        }
        items.extend(termination_item(ctx, now));

        Self {
            title: "Pod summary".to_string(),
            items,
        }
    }

    /// How to reach the finished pod.
    #[must_use]
    pub fn completion(ctx: &ProvisionContext, now: DateTime<Utc>) -> Self {
        let name = ctx
            .pod_name
            .get()
            .or(ctx.pod_id.get())
            .cloned()
            .unwrap_or_default();
        let mut items = Vec::new();

        if let Some(url) = ctx.jupyter_url.get() {
            items.push(SummaryItem::new("Jupyter", url.clone()));
        }
        if let Some(command) = ctx.connection_command.get() {
            items.push(SummaryItem::new("SSH", command.clone()));
        }
        items.extend(termination_item(ctx, now));

        Self {
            title: format!("Pod ready: {name}"),
            items,
        }
    }
}
