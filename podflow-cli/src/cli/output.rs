//! Table rendering and pod target lookup.

use colored::Colorize;
use podflow::actions::RankedExecutor;
use podflow::errors::{PodflowError, Result};
use podflow::provider::{select_fallback_template, PodInfo, Template};
use podflow::store::parse_index;

fn format_metric(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.0}{unit}"))
}

/// One line per executor, numbered from 1 so `up N` can refer back.
pub fn executor_table(ranked: &[RankedExecutor]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>4}  {:<1} {:<22} {:<10} {:>9} {:>9} {:>8} {:>8}  {}",
        "#", "", "EXECUTOR", "GPU", "$/GPU/H", "$/H", "VRAM", "TFLOPS", "LOCATION"
    )
    .bold()
    .to_string()];

    for (i, entry) in ranked.iter().enumerate() {
        let e = &entry.executor;
        let star = if entry.optimal {
            "★".yellow().to_string()
        } else {
            " ".to_string()
        };
        lines.push(format!(
            "{:>4}  {} {:<22} {:<10} {:>9.2} {:>9.2} {:>8} {:>8}  {}",
            i + 1,
            star,
            e.huid,
            e.config_label(),
            e.price_per_gpu_hour,
            e.price_per_hour,
            format_metric(e.gpu_memory_gib(), "G"),
            format_metric(e.tflops(), ""),
            e.country_code().unwrap_or_else(|| "-".to_string()),
        ));
    }
    lines
}

/// One line per pod, numbered in listing order.
pub fn pod_table(pods: &[PodInfo]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>4}  {:<22} {:<20} {:<10} {:<10} {}",
        "#", "HUID", "NAME", "STATUS", "GPU", "TERMINATES"
    )
    .bold()
    .to_string()];

    for (i, pod) in pods.iter().enumerate() {
        let status = if pod.is_ready() {
            pod.status.green().to_string()
        } else {
            pod.status.yellow().to_string()
        };
        lines.push(format!(
            "{:>4}  {:<22} {:<20} {:<10} {:<10} {}",
            i + 1,
            pod.huid,
            pod.name,
            status,
            pod.executor
                .as_ref()
                .map_or_else(|| "-".to_string(), podflow::provider::ExecutorInfo::config_label),
            pod.removal_scheduled_at.as_deref().unwrap_or("-"),
        ));
    }
    lines
}

/// One line per template, newest PyTorch image marked as the fallback.
pub fn template_table(templates: &[Template], default_id: Option<&str>) -> Vec<String> {
    let fallback = default_id.or_else(|| select_fallback_template(templates).map(|t| t.id.as_str()));
    let mut lines = vec![format!("{:<38} {:<28} {}", "ID", "NAME", "IMAGE")
        .bold()
        .to_string()];
    for t in templates {
        let marker = if Some(t.id.as_str()) == fallback {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        lines.push(format!("{:<38} {:<28} {}{marker}", t.id, t.name, t.image_ref()));
    }
    lines
}

/// Finds a pod by 1-based index into `pods`, id, huid or name.
pub fn resolve_pod(pods: &[PodInfo], target: &str) -> Result<PodInfo> {
    if let Some(index) = parse_index(target) {
        return pods.get(index - 1).cloned().ok_or_else(|| {
            PodflowError::Unresolved(format!(
                "Index {index} is out of range ({} pods)",
                pods.len()
            ))
        });
    }
    pods.iter()
        .find(|p| p.matches(target))
        .cloned()
        .ok_or_else(|| PodflowError::not_found("pod", target))
}

/// Resolves every target, failing on the first unknown one.
pub fn resolve_pods(pods: &[PodInfo], targets: &[String]) -> Result<Vec<PodInfo>> {
    targets.iter().map(|t| resolve_pod(pods, t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use podflow::provider::ExecutorInfo;
    use pretty_assertions::assert_eq;

    fn pods() -> Vec<PodInfo> {
        vec![
            PodInfo::new("p-1", "trainer", "RUNNING"),
            PodInfo::new("p-2", "eval", "PENDING"),
        ]
    }

    #[test]
    fn test_resolve_pod_by_index_and_name() {
        let pods = pods();
        assert_eq!(resolve_pod(&pods, "2").unwrap().id, "p-2");
        assert_eq!(resolve_pod(&pods, "trainer").unwrap().id, "p-1");
        let huid = pods[1].huid.clone();
        assert_eq!(resolve_pod(&pods, &huid).unwrap().id, "p-2");
    }

    #[test]
    fn test_resolve_pod_failures() {
        let pods = pods();
        let err = resolve_pod(&pods, "3").unwrap_err();
        assert_eq!(err.to_string(), "Index 3 is out of range (2 pods)");
        let err = resolve_pods(&pods, &["p-1".into(), "ghost".into()]).unwrap_err();
        assert_eq!(err.to_string(), "No pod found with ID 'ghost'");
    }

    #[test]
    fn test_executor_table_numbers_rows() {
        colored::control::set_override(false);
        let ranked = vec![RankedExecutor {
            executor: ExecutorInfo::new("a", "NVIDIA H100", 8, 20.0),
            optimal: true,
        }];
        let lines = executor_table(&ranked);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].trim_start().starts_with("1  ★"));
        assert!(lines[1].contains("8×H100"));
        assert!(lines[1].contains("2.50"));
    }

    #[test]
    fn test_template_table_marks_fallback() {
        colored::control::set_override(false);
        let t = |id: &str, name: &str, image: &str, tag: &str| Template {
            id: id.into(),
            name: name.into(),
            category: None,
            docker_image: image.into(),
            docker_image_tag: tag.into(),
            status: None,
        };
        let templates = vec![
            t("1", "Ubuntu", "daturaai/ubuntu", "22.04"),
            t("2", "PyTorch", "daturaai/pytorch", "2.4.0-py3.11"),
        ];

        let lines = template_table(&templates, None);
        assert_eq!(lines.len(), 3);
        assert!(!lines[1].contains("(default)"));
        assert!(lines[2].ends_with("(default)"));

        let lines = template_table(&templates, Some("1"));
        assert!(lines[1].ends_with("(default)"));
    }
}
