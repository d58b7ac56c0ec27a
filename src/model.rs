use chrono::{DateTime, Local};
use std::fmt::Write as _;

/// Navigation state of the session controller. `Namespaces` is the initial
/// screen; `Exec` is left only when the remote stream terminates.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Screen {
    Namespaces,
    Pods,
    Console,
    Exec,
}

/// Which pane receives scroll keys while on the `Pods` screen. Dispatching
/// on this tag keeps focus logic independent of pane instances.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FocusTarget {
    PodList,
    Detail,
    Log,
}

impl FocusTarget {
    pub fn next(self) -> Self {
        match self {
            Self::PodList => Self::Detail,
            Self::Detail => Self::Log,
            Self::Log => Self::PodList,
        }
    }
}

/// A scrollable list of rows with a selection cursor. Content is replaced
/// wholesale on every update, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ListPane {
    pub rows: Vec<String>,
    pub selected: usize,
}

impl ListPane {
    pub fn with_rows(rows: Vec<String>) -> Self {
        Self { rows, selected: 0 }
    }

    pub fn set_rows(&mut self, rows: Vec<String>) {
        self.rows = rows;
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn selected_row(&self) -> Option<&str> {
        self.rows.get(self.selected).map(String::as_str)
    }

    pub fn scroll_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub fn scroll_page_up(&mut self, page: usize) {
        self.selected = self.selected.saturating_sub(page.max(1));
    }

    pub fn scroll_page_down(&mut self, page: usize) {
        if self.rows.is_empty() {
            return;
        }
        self.selected = (self.selected + page.max(1)).min(self.rows.len() - 1);
    }

    pub fn scroll_top(&mut self) {
        self.selected = 0;
    }

    pub fn scroll_bottom(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }
}

/// An operational error plus compacted cause chain, routed over the update
/// channel and rendered as a transient overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        let mut causes = Vec::new();
        for (index, cause) in error.chain().enumerate() {
            if index == 0 {
                continue;
            }
            if index > 3 {
                break;
            }
            causes.push(format!("caused by: {cause}"));
        }

        Self {
            message: error.to_string(),
            detail: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ContainerDetail {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
}

/// Metadata backing the detail pane, reduced from a full Pod object.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub node: String,
    pub controlled_by: Option<(String, String)>,
    pub created: String,
    pub restarts: Option<i32>,
    pub phase: String,
    pub pod_ip: String,
    pub containers: Vec<ContainerDetail>,
}

/// Renders the fixed detail-pane template: identity block, status block,
/// then one section per container.
pub fn render_detail(detail: &PodDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name:          {}", detail.name);
    let _ = writeln!(out, "Namespace:     {}", detail.namespace);
    let _ = writeln!(out, "Node:          {}", detail.node);
    if let Some((kind, owner)) = &detail.controlled_by {
        let _ = writeln!(out, "Controlled By: {kind}/{owner}");
    }
    let _ = writeln!(out, "Created:       {}", detail.created);
    if let Some(restarts) = detail.restarts {
        let _ = writeln!(out, "Restarts:      {restarts}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Status:        {}", detail.phase);
    let _ = writeln!(out, "IP:            {}", detail.pod_ip);
    let _ = writeln!(out);
    let _ = writeln!(out, "Containers:");
    for container in &detail.containers {
        let _ = writeln!(out);
        let _ = writeln!(out, "   {}:", container.name);
        let _ = writeln!(out, "       Image: {}", container.image);
        let _ = writeln!(out, "       Environment:");
        for (name, value) in &container.env {
            let _ = writeln!(out, "         {name}: {value}");
        }
    }
    out
}

/// One selectable container in the choice prompt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerChoice {
    pub name: String,
    pub image: String,
}

pub fn timestamped(message: &str, at: DateTime<Local>) -> String {
    format!("> [{}] {message}", at.format("%Y-%m-%d %H:%M:%S%.3f"))
}

#[cfg(test)]
mod tests {
    use super::{ContainerDetail, FocusTarget, ListPane, PodDetail, render_detail};

    fn sample_detail() -> PodDetail {
        PodDetail {
            name: "web-7f-abc12".to_string(),
            namespace: "default".to_string(),
            node: "node-1".to_string(),
            controlled_by: Some(("ReplicaSet".to_string(), "web-7f".to_string())),
            created: "2026-08-01 10:00:00".to_string(),
            restarts: Some(3),
            phase: "Running".to_string(),
            pod_ip: "10.1.2.3".to_string(),
            containers: vec![
                ContainerDetail {
                    name: "app".to_string(),
                    image: "nginx:1.25".to_string(),
                    env: vec![("FOO".to_string(), "bar".to_string())],
                },
                ContainerDetail {
                    name: "sidecar".to_string(),
                    image: "envoy:1.28".to_string(),
                    env: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn detail_template_includes_owner_line() {
        let text = render_detail(&sample_detail());
        assert!(text.contains("Controlled By: ReplicaSet/web-7f"));
    }

    #[test]
    fn detail_template_lists_containers_in_order() {
        let text = render_detail(&sample_detail());
        let app = text.find("   app:").expect("app section");
        let sidecar = text.find("   sidecar:").expect("sidecar section");
        assert!(app < sidecar);
        assert!(text.contains("       Image: nginx:1.25"));
        assert!(text.contains("       Image: envoy:1.28"));
    }

    #[test]
    fn detail_template_places_env_under_container() {
        let text = render_detail(&sample_detail());
        let app = text.find("   app:").expect("app section");
        let env = text.find("         FOO: bar").expect("env entry");
        let sidecar = text.find("   sidecar:").expect("sidecar section");
        assert!(app < env && env < sidecar);
    }

    #[test]
    fn detail_template_omits_optional_lines_when_absent() {
        let mut detail = sample_detail();
        detail.controlled_by = None;
        detail.restarts = None;
        let text = render_detail(&detail);
        assert!(!text.contains("Controlled By:"));
        assert!(!text.contains("Restarts:"));
    }

    #[test]
    fn list_pane_selection_clamps_on_replacement() {
        let mut pane =
            ListPane::with_rows(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        pane.scroll_bottom();
        assert_eq!(pane.selected, 2);

        pane.set_rows(vec!["a".to_string()]);
        assert_eq!(pane.selected, 0);
        assert_eq!(pane.selected_row(), Some("a"));
    }

    #[test]
    fn list_pane_scrolling_stays_in_bounds() {
        let mut pane = ListPane::with_rows(vec!["a".to_string(), "b".to_string()]);
        pane.scroll_up();
        assert_eq!(pane.selected, 0);
        pane.scroll_page_down(10);
        assert_eq!(pane.selected, 1);
        pane.scroll_down();
        assert_eq!(pane.selected, 1);
        pane.scroll_page_up(10);
        assert_eq!(pane.selected, 0);
    }

    #[test]
    fn focus_cycle_wraps() {
        assert_eq!(FocusTarget::PodList.next(), FocusTarget::Detail);
        assert_eq!(FocusTarget::Detail.next(), FocusTarget::Log);
        assert_eq!(FocusTarget::Log.next(), FocusTarget::PodList);
    }
}
