use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::App;
use crate::input::InputMode;
use crate::model::{FocusTarget, ListPane, Screen};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const ERROR: Color = Color::Rgb(248, 113, 113);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);

    if let Some(picker) = app.picker() {
        render_picker_modal(frame, &picker.pane);
    }
    // Painted last so it sits above everything else.
    if app.error_overlay().is_some() {
        render_error_overlay(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(" ", Style::default().bg(BG))];
    for (label, screen) in [
        ("[N]amespaces", Screen::Namespaces),
        ("[P]ods", Screen::Pods),
        ("[C]onsole", Screen::Console),
    ] {
        let style = if app.screen() == screen {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED).bg(BG)
        };
        spans.push(Span::styled(format!(" {label} "), style));
        spans.push(Span::styled(" ", Style::default().bg(BG)));
    }

    let marker = if app.debug_to_file() {
        "[debug.log]  "
    } else {
        ""
    };
    let host = Line::from(Span::styled(
        format!("{marker}Connected to: {} ", app.api_host()),
        Style::default().fg(MUTED).bg(BG),
    ));
    let host_width = host.width() as u16;
    if host_width == 0 || host_width >= area.width {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(host_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(Paragraph::new(host).style(Style::default().bg(BG)), chunks[1]);
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    match app.screen() {
        Screen::Namespaces => render_namespaces(frame, area, app),
        Screen::Pods => render_pods(frame, area, app),
        Screen::Console => render_console(frame, area, app),
        Screen::Exec => render_exec(frame, area, app),
    }
}

fn render_namespaces(frame: &mut Frame, area: Rect, app: &App) {
    render_list_pane(frame, area, app.namespaces(), "Namespaces", true);
}

fn render_pods(frame: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(34), Constraint::Percentage(66)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(columns[1]);

    let namespace = app.current_namespace().unwrap_or("-");
    render_list_pane(
        frame,
        columns[0],
        app.pods(),
        &format!("Pods ({namespace})"),
        app.focus() == FocusTarget::PodList,
    );

    let detail = Paragraph::new(app.detail_text().to_string())
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll(), 0))
        .block(pane_block("Details", app.focus() == FocusTarget::Detail));
    frame.render_widget(detail, right[0]);

    let log_title = if app.log_paused() {
        "Logs (PAUSED)"
    } else {
        "Logs"
    };
    let inner_height = right[1].height.saturating_sub(2) as usize;
    let offset = log_scroll_offset(app.log_scroll(), inner_height);
    let log = Paragraph::new(app.log_rows().join("\n"))
        .scroll((offset, 0))
        .block(pane_block(log_title, app.focus() == FocusTarget::Log));
    frame.render_widget(log, right[1]);
}

/// Paragraph scroll offset that keeps the cursor row on the last visible
/// line, saturating instead of wrapping for very long logs.
fn log_scroll_offset(scroll: usize, inner_height: usize) -> u16 {
    u16::try_from((scroll + 1).saturating_sub(inner_height)).unwrap_or(u16::MAX)
}

fn render_console(frame: &mut Frame, area: Rect, app: &App) {
    render_list_pane(frame, area, app.console(), "Console", true);
}

fn render_exec(frame: &mut Frame, area: Rect, app: &App) {
    let title = match app.selected_pod() {
        Some(pod) => format!("Shell ({pod})"),
        None => "Shell".to_string(),
    };
    let pane = Paragraph::new(app.exec_rows().join("\n")).block(pane_block(&title, true));
    frame.render_widget(pane, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let help = help_line(app.mode());
    frame.render_widget(
        Paragraph::new(help)
            .alignment(Alignment::Left)
            .style(Style::default().fg(MUTED).bg(BG)),
        area,
    );
}

pub fn help_line(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Namespaces => " Enter select  r reload  p pods  c console  q quit",
        InputMode::Pods => {
            " Enter select  t tail logs  e exec  Tab focus  r reload  n namespaces  c console  q quit"
        }
        InputMode::Console => " n namespaces  p pods  arrows scroll  q quit",
        InputMode::Picker => " Enter choose container  Esc cancel",
        InputMode::Exec => " all keys are sent to the remote shell (exit to leave)",
    }
}

fn render_picker_modal(frame: &mut Frame, pane: &ListPane) {
    let area = centered_rect(50, 40, frame.area());
    frame.render_widget(Clear, area);
    render_list_pane(frame, area, pane, "Select container", true);
}

fn render_error_overlay(frame: &mut Frame, app: &App) {
    let Some(envelope) = app.error_overlay() else {
        return;
    };
    let area = centered_rect(60, 30, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from(envelope.message.clone())];
    if let Some(detail) = &envelope.detail {
        lines.push(Line::from(""));
        for cause in detail.lines() {
            lines.push(Line::from(cause.to_string()));
        }
    }
    let overlay = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Error")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ERROR))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(ERROR));
    frame.render_widget(overlay, area);
}

fn render_list_pane(frame: &mut Frame, area: Rect, pane: &ListPane, title: &str, focused: bool) {
    let items: Vec<ListItem> = pane
        .rows
        .iter()
        .map(|row| ListItem::new(row.clone()))
        .collect();
    let list = List::new(items)
        .block(pane_block(title, focused))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        );
    let mut state = ListState::default().with_selected(Some(pane.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { ACCENT } else { MUTED };
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL))
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{centered_rect, help_line, log_scroll_offset};
    use crate::input::InputMode;
    use ratatui::layout::Rect;

    #[test]
    fn help_lines_cover_every_mode() {
        assert!(help_line(InputMode::Namespaces).contains("select"));
        assert!(help_line(InputMode::Pods).contains("tail logs"));
        assert!(help_line(InputMode::Picker).contains("Esc"));
        assert!(help_line(InputMode::Exec).contains("remote shell"));
    }

    #[test]
    fn log_offset_saturates_for_very_long_logs() {
        assert_eq!(log_scroll_offset(5, 10), 0);
        assert_eq!(log_scroll_offset(30, 10), 21);
        assert_eq!(log_scroll_offset(100_000, 20), u16::MAX);
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(60, 30, area);
        assert!(rect.x >= area.x && rect.y >= area.y);
        assert!(rect.right() <= area.right());
        assert!(rect.bottom() <= area.bottom());
    }
}
