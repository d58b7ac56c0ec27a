use std::time::{Duration, Instant};

use crate::input::{Action, InputMode};
use crate::model::{
    ContainerChoice, ErrorEnvelope, FocusTarget, ListPane, Screen, timestamped,
};

const NAMESPACES_LOADING: &str = "Loading namespaces...";
const NAMESPACES_EMPTY: &str = "No namespaces found";
const PODS_LOADING: &str = "Loading pods...";
const ERROR_OVERLAY_DURATION: Duration = Duration::from_secs(2);

/// Why containers are being resolved for the selected pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPurpose {
    Tail,
    Exec,
}

/// Work the event loop performs on behalf of the state machine. Every
/// command captures its target by value; background tasks never read the
/// session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Quit,
    LoadNamespaces,
    LoadPods {
        namespace: String,
    },
    SelectPod {
        namespace: String,
        pod: String,
    },
    ResolveContainers {
        namespace: String,
        pod: String,
        purpose: StreamPurpose,
    },
    StartLogTail {
        namespace: String,
        pod: String,
        container: Option<String>,
    },
    StartExec {
        namespace: String,
        pod: String,
        container: String,
    },
    WriteExec(Vec<u8>),
    CancelStreams,
}

/// A result pushed back from a background task. Updates from one stream
/// arrive in production order; nothing else is guaranteed across streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneUpdate {
    Namespaces(Vec<String>),
    Pods {
        namespace: String,
        names: Vec<String>,
    },
    Detail {
        pod: String,
        text: String,
    },
    LogClear,
    LogSnapshot(String),
    LogClosed,
    ExecScreen(Vec<String>),
    ExecStopped {
        error: Option<String>,
    },
    Containers {
        namespace: String,
        pod: String,
        purpose: StreamPurpose,
        choices: Vec<ContainerChoice>,
    },
    Error(ErrorEnvelope),
    Debug(String),
}

#[derive(Debug, Clone)]
pub struct PickerState {
    pub namespace: String,
    pub pod: String,
    pub purpose: StreamPurpose,
    pub pane: ListPane,
    pub choices: Vec<ContainerChoice>,
}

/// The session controller: owns focus, current selection, and all pane
/// content. Mutated only on the input-processing path; background tasks
/// reach it exclusively through `PaneUpdate` values.
pub struct App {
    running: bool,
    screen: Screen,
    focus: FocusTarget,
    api_host: String,
    debug_to_file: bool,
    current_namespace: Option<String>,
    selected_pod: Option<String>,
    namespaces: ListPane,
    pods: ListPane,
    detail_text: String,
    detail_scroll: u16,
    log_rows: Vec<String>,
    log_scroll: usize,
    log_paused: bool,
    console: ListPane,
    exec_rows: Vec<String>,
    picker: Option<PickerState>,
    error: Option<(ErrorEnvelope, Instant)>,
    viewport: (u16, u16),
}

impl App {
    pub fn new(api_host: String, debug_to_file: bool) -> Self {
        let mut app = Self {
            running: true,
            screen: Screen::Namespaces,
            focus: FocusTarget::PodList,
            api_host,
            debug_to_file,
            current_namespace: None,
            selected_pod: None,
            namespaces: ListPane::with_rows(vec![NAMESPACES_LOADING.to_string()]),
            pods: ListPane::default(),
            detail_text: String::new(),
            detail_scroll: 0,
            log_rows: Vec::new(),
            log_scroll: 0,
            log_paused: false,
            console: ListPane::default(),
            exec_rows: Vec::new(),
            picker: None,
            error: None,
            viewport: (80, 24),
        };
        let host = app.api_host.clone();
        app.debug(&format!("Connected to {host}"));
        app
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn focus(&self) -> FocusTarget {
        self.focus
    }

    pub fn mode(&self) -> InputMode {
        InputMode::for_screen(self.screen, self.picker.is_some())
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub fn debug_to_file(&self) -> bool {
        self.debug_to_file
    }

    pub fn current_namespace(&self) -> Option<&str> {
        self.current_namespace.as_deref()
    }

    pub fn selected_pod(&self) -> Option<&str> {
        self.selected_pod.as_deref()
    }

    pub fn namespaces(&self) -> &ListPane {
        &self.namespaces
    }

    pub fn pods(&self) -> &ListPane {
        &self.pods
    }

    pub fn detail_text(&self) -> &str {
        &self.detail_text
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    pub fn log_rows(&self) -> &[String] {
        &self.log_rows
    }

    pub fn log_scroll(&self) -> usize {
        self.log_scroll
    }

    pub fn log_paused(&self) -> bool {
        self.log_paused
    }

    pub fn console(&self) -> &ListPane {
        &self.console
    }

    pub fn exec_rows(&self) -> &[String] {
        &self.exec_rows
    }

    pub fn picker(&self) -> Option<&PickerState> {
        self.picker.as_ref()
    }

    pub fn error_overlay(&self) -> Option<&ErrorEnvelope> {
        self.error.as_ref().map(|(envelope, _)| envelope)
    }

    pub fn viewport(&self) -> (u16, u16) {
        self.viewport
    }

    /// Usable cell grid inside the exec pane: the viewport minus the
    /// header and footer rows and the pane border. The remote terminal is
    /// sized to this, so every row it paints is actually visible.
    pub fn exec_pane_size(&self) -> (u16, u16) {
        let (width, height) = self.viewport;
        (width.saturating_sub(2), height.saturating_sub(4))
    }

    /// Page size for paged scrolling, derived from the current geometry.
    fn page(&self) -> usize {
        (self.viewport.1 as usize / 2).max(1)
    }

    /// Appends a timestamped event to the debug console and mirrors it to
    /// the tracing subscriber (which targets debug.log when enabled).
    pub fn debug(&mut self, message: &str) {
        tracing::debug!("{message}");
        self.console
            .rows
            .push(timestamped(message, chrono::Local::now()));
        self.console.scroll_bottom();
    }

    fn report_error(&mut self, envelope: ErrorEnvelope) {
        self.debug(&format!("ERROR: {}", envelope.message));
        if let Some(detail) = &envelope.detail {
            for line in detail.lines() {
                self.console.rows.push(format!("  {line}"));
            }
            self.console.scroll_bottom();
        }
        self.error = Some((envelope, Instant::now()));
    }

    /// Dismisses the transient error overlay once it has been visible for
    /// the fixed display duration.
    pub fn tick(&mut self, now: Instant) {
        if let Some((_, since)) = &self.error
            && now.duration_since(*since) >= ERROR_OVERLAY_DURATION
        {
            self.error = None;
        }
    }

    /// Terminal geometry changed: the pane set is rebuilt from the new
    /// rectangle on the next draw while all content carries over.
    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
        self.debug(&format!("Terminal resized to {width}x{height}"));
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if self.picker.is_some() {
            return self.apply_picker_action(action);
        }
        match self.screen {
            Screen::Namespaces => self.apply_namespaces_action(action),
            Screen::Pods => self.apply_pods_action(action),
            Screen::Console => self.apply_console_action(action),
            Screen::Exec => self.apply_exec_action(action),
        }
    }

    fn quit(&mut self) -> AppCommand {
        self.running = false;
        AppCommand::Quit
    }

    fn apply_namespaces_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => self.quit(),
            Action::Up => {
                self.namespaces.scroll_up();
                AppCommand::None
            }
            Action::Down => {
                self.namespaces.scroll_down();
                AppCommand::None
            }
            Action::PageUp => {
                self.namespaces.scroll_page_up(self.page());
                AppCommand::None
            }
            Action::PageDown => {
                self.namespaces.scroll_page_down(self.page());
                AppCommand::None
            }
            Action::Top => {
                self.namespaces.scroll_top();
                AppCommand::None
            }
            Action::Bottom => {
                self.namespaces.scroll_bottom();
                AppCommand::None
            }
            Action::Reload => {
                self.namespaces
                    .set_rows(vec![NAMESPACES_LOADING.to_string()]);
                self.debug("Reloading namespaces");
                AppCommand::LoadNamespaces
            }
            Action::ShowPods => {
                self.screen = Screen::Pods;
                AppCommand::None
            }
            Action::ShowConsole => {
                self.screen = Screen::Console;
                AppCommand::None
            }
            Action::Select => {
                let Some(namespace) = self.namespaces.selected_row() else {
                    return AppCommand::None;
                };
                if namespace == NAMESPACES_LOADING || namespace == NAMESPACES_EMPTY {
                    return AppCommand::None;
                }
                let namespace = namespace.to_string();
                self.current_namespace = Some(namespace.clone());
                self.pods.set_rows(vec![PODS_LOADING.to_string()]);
                self.screen = Screen::Pods;
                self.focus = FocusTarget::PodList;
                self.debug(&format!("Fetching pods for {namespace}"));
                AppCommand::LoadPods { namespace }
            }
            _ => AppCommand::None,
        }
    }

    fn apply_pods_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => self.quit(),
            Action::Up | Action::Down | Action::PageUp | Action::PageDown | Action::Top
            | Action::Bottom => self.scroll_focused(action),
            Action::Reload => match self.current_namespace.clone() {
                Some(namespace) => {
                    self.pods.set_rows(vec![PODS_LOADING.to_string()]);
                    self.debug(&format!("Reloading pods for {namespace}"));
                    AppCommand::LoadPods { namespace }
                }
                None => AppCommand::None,
            },
            Action::ShowNamespaces => {
                self.screen = Screen::Namespaces;
                AppCommand::CancelStreams
            }
            Action::ShowConsole => {
                self.screen = Screen::Console;
                AppCommand::CancelStreams
            }
            Action::CycleFocus => {
                self.focus = self.focus.next();
                AppCommand::None
            }
            Action::TailLogs => match self.selected_pod_target() {
                Some((namespace, pod)) => {
                    self.selected_pod = Some(pod.clone());
                    AppCommand::ResolveContainers {
                        namespace,
                        pod,
                        purpose: StreamPurpose::Tail,
                    }
                }
                None => AppCommand::None,
            },
            Action::Select => match self.selected_pod_target() {
                Some((namespace, pod)) => {
                    self.selected_pod = Some(pod.clone());
                    self.detail_text = format!("Loading details for {pod}...");
                    self.detail_scroll = 0;
                    self.log_rows = vec![format!("Fetching logs for {pod}...")];
                    self.log_scroll = 0;
                    self.log_paused = false;
                    self.debug(&format!("Loading pod {namespace}/{pod}"));
                    AppCommand::SelectPod { namespace, pod }
                }
                None => AppCommand::None,
            },
            Action::OpenExec => match self.selected_pod_target() {
                Some((namespace, pod)) => {
                    self.selected_pod = Some(pod.clone());
                    AppCommand::ResolveContainers {
                        namespace,
                        pod,
                        purpose: StreamPurpose::Exec,
                    }
                }
                None => AppCommand::None,
            },
            _ => AppCommand::None,
        }
    }

    fn apply_console_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => self.quit(),
            Action::Up => {
                self.console.scroll_up();
                AppCommand::None
            }
            Action::Down => {
                self.console.scroll_down();
                AppCommand::None
            }
            Action::PageUp => {
                self.console.scroll_page_up(self.page());
                AppCommand::None
            }
            Action::PageDown => {
                self.console.scroll_page_down(self.page());
                AppCommand::None
            }
            Action::Top => {
                self.console.scroll_top();
                AppCommand::None
            }
            Action::Bottom => {
                self.console.scroll_bottom();
                AppCommand::None
            }
            Action::ShowNamespaces => {
                self.screen = Screen::Namespaces;
                AppCommand::None
            }
            Action::ShowPods => {
                self.screen = Screen::Pods;
                AppCommand::None
            }
            _ => AppCommand::None,
        }
    }

    fn apply_exec_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::ExecInput(bytes) => AppCommand::WriteExec(bytes),
            _ => AppCommand::None,
        }
    }

    fn apply_picker_action(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Quit => self.quit(),
            Action::Up => {
                if let Some(picker) = self.picker.as_mut() {
                    picker.pane.scroll_up();
                }
                AppCommand::None
            }
            Action::Down => {
                if let Some(picker) = self.picker.as_mut() {
                    picker.pane.scroll_down();
                }
                AppCommand::None
            }
            Action::CancelPrompt => {
                self.picker = None;
                self.debug("Container selection cancelled");
                AppCommand::None
            }
            Action::Select => {
                let Some(picker) = self.picker.take() else {
                    return AppCommand::None;
                };
                let Some(choice) = picker.choices.get(picker.pane.selected) else {
                    return AppCommand::None;
                };
                let container = choice.name.clone();
                match picker.purpose {
                    StreamPurpose::Tail => {
                        self.begin_tail(picker.namespace, picker.pod, Some(container))
                    }
                    StreamPurpose::Exec => {
                        self.begin_exec(picker.namespace, picker.pod, container)
                    }
                }
            }
            _ => AppCommand::None,
        }
    }

    /// Scroll-key routing for the `Pods` screen. The detail pane moves by
    /// full pages (prose content), the lists by line. Scrolling into an
    /// actively following log pane pauses the tail first.
    fn scroll_focused(&mut self, action: Action) -> AppCommand {
        match self.focus {
            FocusTarget::PodList => {
                match action {
                    Action::Up => self.pods.scroll_up(),
                    Action::Down => self.pods.scroll_down(),
                    Action::PageUp => self.pods.scroll_page_up(self.page()),
                    Action::PageDown => self.pods.scroll_page_down(self.page()),
                    Action::Top => self.pods.scroll_top(),
                    Action::Bottom => self.pods.scroll_bottom(),
                    _ => {}
                }
                AppCommand::None
            }
            FocusTarget::Detail => {
                let page = self.page() as u16;
                match action {
                    Action::Up | Action::PageUp => {
                        self.detail_scroll = self.detail_scroll.saturating_sub(page);
                    }
                    Action::Down | Action::PageDown => {
                        self.detail_scroll = self.detail_scroll.saturating_add(page);
                    }
                    Action::Top => self.detail_scroll = 0,
                    Action::Bottom => {
                        self.detail_scroll = self.detail_text.lines().count() as u16;
                    }
                    _ => {}
                }
                AppCommand::None
            }
            FocusTarget::Log => {
                let page = self.page();
                match action {
                    Action::Up => self.log_scroll = self.log_scroll.saturating_sub(1),
                    Action::Down => {
                        self.log_scroll =
                            (self.log_scroll + 1).min(self.log_rows.len().saturating_sub(1));
                    }
                    Action::PageUp => self.log_scroll = self.log_scroll.saturating_sub(page),
                    Action::PageDown => {
                        self.log_scroll =
                            (self.log_scroll + page).min(self.log_rows.len().saturating_sub(1));
                    }
                    Action::Top => self.log_scroll = 0,
                    Action::Bottom => {
                        self.log_scroll = self.log_rows.len().saturating_sub(1);
                    }
                    _ => {}
                }
                if !self.log_paused {
                    self.log_paused = true;
                    self.debug("Log follow paused");
                    return AppCommand::CancelStreams;
                }
                AppCommand::None
            }
        }
    }

    fn selected_pod_target(&self) -> Option<(String, String)> {
        let namespace = self.current_namespace.clone()?;
        let pod = self.pods.selected_row()?;
        if pod == PODS_LOADING {
            return None;
        }
        Some((namespace, pod.to_string()))
    }

    fn begin_tail(
        &mut self,
        namespace: String,
        pod: String,
        container: Option<String>,
    ) -> AppCommand {
        self.log_rows = vec![format!("Fetching logs for {pod}...")];
        self.log_scroll = 0;
        self.log_paused = false;
        match &container {
            Some(container) => {
                self.debug(&format!("Starting log stream for {pod} ({container})"))
            }
            None => self.debug(&format!("Starting log stream for {pod}")),
        }
        AppCommand::StartLogTail {
            namespace,
            pod,
            container,
        }
    }

    fn begin_exec(&mut self, namespace: String, pod: String, container: String) -> AppCommand {
        self.exec_rows = vec![format!("Connecting to {pod} ({container})...")];
        self.screen = Screen::Exec;
        self.debug(&format!("Starting exec stream for {pod} ({container})"));
        AppCommand::StartExec {
            namespace,
            pod,
            container,
        }
    }

    pub fn apply_update(&mut self, update: PaneUpdate) -> AppCommand {
        match update {
            PaneUpdate::Namespaces(names) => {
                let rows = if names.is_empty() {
                    vec![NAMESPACES_EMPTY.to_string()]
                } else {
                    names
                };
                self.namespaces.set_rows(rows);
                AppCommand::None
            }
            PaneUpdate::Pods { namespace, names } => {
                // A late result for a previously selected namespace is stale.
                if self.current_namespace.as_deref() == Some(namespace.as_str()) {
                    self.pods.set_rows(names);
                }
                AppCommand::None
            }
            PaneUpdate::Detail { pod, text } => {
                if self.selected_pod.as_deref() == Some(pod.as_str()) {
                    self.detail_text = text;
                    self.detail_scroll = 0;
                }
                AppCommand::None
            }
            PaneUpdate::LogClear => {
                self.log_rows.clear();
                self.log_scroll = 0;
                AppCommand::None
            }
            PaneUpdate::LogSnapshot(text) => {
                if !self.log_paused {
                    self.log_rows = text.lines().map(str::to_string).collect();
                    self.log_scroll = self.log_rows.len().saturating_sub(1);
                }
                AppCommand::None
            }
            PaneUpdate::LogClosed => {
                self.debug("Log stream closed");
                AppCommand::None
            }
            PaneUpdate::ExecScreen(rows) => {
                self.exec_rows = rows;
                AppCommand::None
            }
            PaneUpdate::ExecStopped { error } => {
                if self.screen == Screen::Exec {
                    self.screen = Screen::Pods;
                }
                self.debug("Exec stream finished");
                if let Some(message) = error {
                    self.report_error(ErrorEnvelope::new(message));
                }
                AppCommand::None
            }
            PaneUpdate::Containers {
                namespace,
                pod,
                purpose,
                choices,
            } => self.apply_containers(namespace, pod, purpose, choices),
            PaneUpdate::Error(envelope) => {
                self.report_error(envelope);
                AppCommand::None
            }
            PaneUpdate::Debug(message) => {
                self.debug(&message);
                AppCommand::None
            }
        }
    }

    /// Container policy: a single container starts the stream immediately,
    /// more than one brings up the choice prompt.
    fn apply_containers(
        &mut self,
        namespace: String,
        pod: String,
        purpose: StreamPurpose,
        choices: Vec<ContainerChoice>,
    ) -> AppCommand {
        match choices.len() {
            0 => {
                self.report_error(ErrorEnvelope::new(format!(
                    "pod {namespace}/{pod} has no containers"
                )));
                AppCommand::None
            }
            1 => {
                let container = choices[0].name.clone();
                match purpose {
                    StreamPurpose::Tail => self.begin_tail(namespace, pod, Some(container)),
                    StreamPurpose::Exec => self.begin_exec(namespace, pod, container),
                }
            }
            _ => {
                let rows = choices
                    .iter()
                    .map(|choice| format!("{}  ({})", choice.name, choice.image))
                    .collect();
                self.picker = Some(PickerState {
                    namespace,
                    pod,
                    purpose,
                    pane: ListPane::with_rows(rows),
                    choices,
                });
                AppCommand::None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, PaneUpdate, StreamPurpose};
    use crate::input::Action;
    use crate::model::{ContainerChoice, ErrorEnvelope, FocusTarget, Screen};
    use std::time::{Duration, Instant};

    fn app_with_namespaces() -> App {
        let mut app = App::new("https://kube.example:6443".to_string(), false);
        let _ = app.apply_update(PaneUpdate::Namespaces(vec![
            "default".to_string(),
            "kube-system".to_string(),
        ]));
        app
    }

    fn app_on_pods() -> App {
        let mut app = app_with_namespaces();
        let _ = app.apply_action(Action::Select);
        let _ = app.apply_update(PaneUpdate::Pods {
            namespace: "default".to_string(),
            names: vec!["web-7f-abc12".to_string(), "db-0".to_string()],
        });
        app
    }

    #[test]
    fn selecting_namespace_loads_pods_and_switches_screen() {
        let mut app = app_with_namespaces();
        let command = app.apply_action(Action::Select);
        assert_eq!(
            command,
            AppCommand::LoadPods {
                namespace: "default".to_string()
            }
        );
        assert_eq!(app.screen(), Screen::Pods);
        assert_eq!(app.current_namespace(), Some("default"));
    }

    #[test]
    fn pod_list_error_keeps_screen_and_raises_overlay() {
        let mut app = app_with_namespaces();
        let _ = app.apply_action(Action::Select);

        let envelope = ErrorEnvelope::new("pods list failed");
        let command = app.apply_update(PaneUpdate::Error(envelope));
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.screen(), Screen::Pods);
        assert!(app.error_overlay().is_some());
        assert!(
            app.console()
                .rows
                .iter()
                .any(|row| row.contains("pods list failed"))
        );
    }

    #[test]
    fn error_overlay_dismisses_after_display_duration() {
        let mut app = app_with_namespaces();
        let _ = app.apply_update(PaneUpdate::Error(ErrorEnvelope::new("boom")));
        assert!(app.error_overlay().is_some());

        app.tick(Instant::now() + Duration::from_secs(3));
        assert!(app.error_overlay().is_none());
    }

    #[test]
    fn selecting_pod_requests_detail_and_tail() {
        let mut app = app_on_pods();
        let command = app.apply_action(Action::Select);
        assert_eq!(
            command,
            AppCommand::SelectPod {
                namespace: "default".to_string(),
                pod: "web-7f-abc12".to_string(),
            }
        );
        assert!(app.detail_text().contains("Loading details"));
        assert!(app.log_rows()[0].contains("Fetching logs"));
    }

    #[test]
    fn tail_resolves_containers_first() {
        let mut app = app_on_pods();
        let command = app.apply_action(Action::TailLogs);
        assert_eq!(
            command,
            AppCommand::ResolveContainers {
                namespace: "default".to_string(),
                pod: "web-7f-abc12".to_string(),
                purpose: StreamPurpose::Tail,
            }
        );
    }

    #[test]
    fn single_container_starts_exec_without_prompt() {
        let mut app = app_on_pods();
        let command = app.apply_update(PaneUpdate::Containers {
            namespace: "default".to_string(),
            pod: "web-7f-abc12".to_string(),
            purpose: StreamPurpose::Exec,
            choices: vec![ContainerChoice {
                name: "app".to_string(),
                image: "nginx:1.25".to_string(),
            }],
        });
        assert_eq!(
            command,
            AppCommand::StartExec {
                namespace: "default".to_string(),
                pod: "web-7f-abc12".to_string(),
                container: "app".to_string(),
            }
        );
        assert_eq!(app.screen(), Screen::Exec);
    }

    #[test]
    fn multi_container_prompt_escape_starts_nothing() {
        let mut app = app_on_pods();
        let command = app.apply_update(PaneUpdate::Containers {
            namespace: "default".to_string(),
            pod: "web-7f-abc12".to_string(),
            purpose: StreamPurpose::Exec,
            choices: vec![
                ContainerChoice {
                    name: "app".to_string(),
                    image: "nginx:1.25".to_string(),
                },
                ContainerChoice {
                    name: "sidecar".to_string(),
                    image: "envoy:1.28".to_string(),
                },
            ],
        });
        assert_eq!(command, AppCommand::None);
        assert!(app.picker().is_some());

        let command = app.apply_action(Action::CancelPrompt);
        assert_eq!(command, AppCommand::None);
        assert!(app.picker().is_none());
        assert_eq!(app.screen(), Screen::Pods);
    }

    #[test]
    fn picker_selection_starts_tail_for_chosen_container() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::Containers {
            namespace: "default".to_string(),
            pod: "web-7f-abc12".to_string(),
            purpose: StreamPurpose::Tail,
            choices: vec![
                ContainerChoice {
                    name: "app".to_string(),
                    image: "nginx:1.25".to_string(),
                },
                ContainerChoice {
                    name: "sidecar".to_string(),
                    image: "envoy:1.28".to_string(),
                },
            ],
        });

        let _ = app.apply_action(Action::Down);
        let command = app.apply_action(Action::Select);
        assert_eq!(
            command,
            AppCommand::StartLogTail {
                namespace: "default".to_string(),
                pod: "web-7f-abc12".to_string(),
                container: Some("sidecar".to_string()),
            }
        );
    }

    #[test]
    fn tab_cycles_focus_through_three_panes() {
        let mut app = app_on_pods();
        assert_eq!(app.focus(), FocusTarget::PodList);
        let _ = app.apply_action(Action::CycleFocus);
        assert_eq!(app.focus(), FocusTarget::Detail);
        let _ = app.apply_action(Action::CycleFocus);
        assert_eq!(app.focus(), FocusTarget::Log);
        let _ = app.apply_action(Action::CycleFocus);
        assert_eq!(app.focus(), FocusTarget::PodList);
    }

    #[test]
    fn scrolling_log_pane_pauses_the_tail() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::LogSnapshot("one\ntwo\nthree".to_string()));
        let _ = app.apply_action(Action::CycleFocus);
        let _ = app.apply_action(Action::CycleFocus);
        assert_eq!(app.focus(), FocusTarget::Log);

        let command = app.apply_action(Action::Up);
        assert_eq!(command, AppCommand::CancelStreams);
        assert!(app.log_paused());

        // Paused pane ignores further snapshots.
        let _ = app.apply_update(PaneUpdate::LogSnapshot("replaced".to_string()));
        assert_eq!(app.log_rows().len(), 3);
    }

    #[test]
    fn leaving_pods_screen_cancels_streams() {
        let mut app = app_on_pods();
        let command = app.apply_action(Action::ShowNamespaces);
        assert_eq!(command, AppCommand::CancelStreams);
        assert_eq!(app.screen(), Screen::Namespaces);
    }

    #[test]
    fn exec_stop_returns_to_pod_list() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::Containers {
            namespace: "default".to_string(),
            pod: "web-7f-abc12".to_string(),
            purpose: StreamPurpose::Exec,
            choices: vec![ContainerChoice {
                name: "app".to_string(),
                image: "nginx:1.25".to_string(),
            }],
        });
        assert_eq!(app.screen(), Screen::Exec);

        let _ = app.apply_update(PaneUpdate::ExecStopped {
            error: Some("stream reset".to_string()),
        });
        assert_eq!(app.screen(), Screen::Pods);
        assert!(app.error_overlay().is_some());
    }

    #[test]
    fn exec_screen_forwards_bytes() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::Containers {
            namespace: "default".to_string(),
            pod: "web-7f-abc12".to_string(),
            purpose: StreamPurpose::Exec,
            choices: vec![ContainerChoice {
                name: "app".to_string(),
                image: "nginx:1.25".to_string(),
            }],
        });
        let command = app.apply_action(Action::ExecInput(b"ls\r".to_vec()));
        assert_eq!(command, AppCommand::WriteExec(b"ls\r".to_vec()));
    }

    #[test]
    fn resize_preserves_pane_content() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::LogSnapshot("one\ntwo\nthree".to_string()));
        let rows_before = app.log_rows().to_vec();
        let pods_before = app.pods().rows.clone();

        app.handle_resize(120, 40);
        assert_eq!(app.log_rows(), rows_before.as_slice());
        assert_eq!(app.pods().rows, pods_before);
        assert_eq!(app.viewport(), (120, 40));
    }

    #[test]
    fn exec_pane_size_accounts_for_header_footer_and_border() {
        let mut app = app_on_pods();
        app.handle_resize(120, 40);
        assert_eq!(app.exec_pane_size(), (118, 36));

        app.handle_resize(3, 3);
        assert_eq!(app.exec_pane_size(), (1, 0));
    }

    #[test]
    fn empty_namespace_placeholder_is_not_selectable() {
        let mut app = App::new("https://kube.example:6443".to_string(), false);
        let _ = app.apply_update(PaneUpdate::Namespaces(Vec::new()));

        let command = app.apply_action(Action::Select);
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.screen(), Screen::Namespaces);
        assert_eq!(app.current_namespace(), None);
    }

    #[test]
    fn stale_pod_listing_is_ignored() {
        let mut app = app_on_pods();
        let _ = app.apply_update(PaneUpdate::Pods {
            namespace: "kube-system".to_string(),
            names: vec!["coredns-xyz".to_string()],
        });
        assert_eq!(app.pods().rows[0], "web-7f-abc12");
    }

    #[test]
    fn quit_terminates_from_any_screen() {
        let mut app = app_with_namespaces();
        let command = app.apply_action(Action::Quit);
        assert_eq!(command, AppCommand::Quit);
        assert!(!app.running());
    }
}
