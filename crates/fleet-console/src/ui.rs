use crate::app::{App, InputMode};
use crate::board::{ActionButton, ServerCard};
use crate::page::{LogView, ServersPage};
use crate::poll::View;
use crate::theme::{self, icons};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

const SKELETON_ROWS: usize = 3;

pub fn render(f: &mut Frame, app: &App) {
    let area = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(area);

    render_header(f, app, layout[0]);
    match app.view() {
        View::Servers => {
            // A page whose view went away renders nothing.
            if let Some(page) = app.page().filter(|page| page.is_live()) {
                render_servers(f, page, layout[1]);
                if let Some(logs) = page.logs() {
                    render_logs(f, logs, area);
                }
            }
        }
        View::Help => render_help(f, layout[1]),
    }
    render_footer(f, app, layout[2]);

    if let Some(notice) = app.notices().pending_error() {
        render_error(f, &notice.title, &notice.message, area);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(format!(" {} fleet ", icons::SERVER), theme::HEADER_STYLE),
        Span::raw(" "),
    ];
    for view in [View::Servers, View::Help] {
        let style = if view == app.view() {
            theme::SELECTED_STYLE
        } else {
            Style::default().fg(theme::MUTED)
        };
        spans.push(Span::styled(format!(" {} ", view.title()), style));
        spans.push(Span::raw(" "));
    }
    if let Some(page) = app.page() {
        let filter = page.filter();
        spans.push(Span::styled(
            format!("filter: {}", filter.status.label()),
            Style::default().fg(theme::MUTED),
        ));
        if !filter.query.is_empty() {
            spans.push(Span::styled(
                format!("  search: {}", filter.query),
                Style::default().fg(theme::MUTED),
            ));
        }
        let refresh = if page.is_polling() {
            format!("  {} servers, every {}ms", page.cache().len(), page.poll_interval().as_millis())
        } else {
            format!("  {} servers, polling paused", page.cache().len())
        };
        spans.push(Span::styled(refresh, Style::default().fg(theme::MUTED)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_servers(f: &mut Frame, page: &ServersPage, area: Rect) {
    let board = page.board();
    let loading = board.is_loading() && board.cards().is_empty();
    let title = if loading { "Servers (loading)" } else { "Servers" };
    let block = Block::default().borders(Borders::ALL).title(title);

    if loading {
        let lines: Vec<Line> = (0..SKELETON_ROWS)
            .map(|_| {
                Line::from(Span::styled(
                    format!("{} ░░░░░░░░░░░░  ░░░░░░  ░░░░  ░░░░", icons::SPINNER),
                    Style::default().fg(theme::MUTED),
                ))
            })
            .collect();
        f.render_widget(Paragraph::new(lines).block(block), area);
        return;
    }

    if board.visible_cards().next().is_none() {
        let message = if board.cards().is_empty() {
            "No servers configured. Install a server, then press r to refresh."
        } else {
            "No servers match the current filter."
        };
        let p = Paragraph::new(Line::from(Span::styled(
            message,
            Style::default().fg(theme::MUTED),
        )))
        .block(block)
        .wrap(Wrap { trim: true });
        f.render_widget(p, area);
        return;
    }

    let rows: Vec<Row> = board
        .visible_cards()
        .enumerate()
        .map(|(index, card)| card_row(card).style(theme::zebra_row_style(index)))
        .collect();
    let widths = [
        Constraint::Length(3),
        Constraint::Min(16),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Length(11),
        Constraint::Length(7),
        Constraint::Length(8),
        Constraint::Min(20),
    ];
    let header = Row::new(vec![
        "", "Name", "Status", "Version", "Port", "Uptime", "CPU", "Memory", "Actions",
    ])
    .style(theme::HEADER_STYLE);
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);
    let mut state = TableState::default().with_selected(Some(page.selected_index()));
    f.render_stateful_widget(table, area, &mut state);
}

fn card_row(card: &ServerCard) -> Row<'_> {
    let text = Style::default().fg(theme::TEXT);
    Row::new(vec![
        Cell::from(Span::styled(
            format!(" {} ", icons::DOT),
            Style::default().bg(card.icon_bg).fg(card.icon_fg),
        )),
        Cell::from(Span::styled(card.name.as_str(), text)),
        Cell::from(Span::styled(format!(" {} ", card.badge_text), card.badge_style)),
        Cell::from(Span::styled(card.version.as_str(), text)),
        Cell::from(Span::styled(card.port.as_str(), text)),
        Cell::from(Span::styled(card.uptime.as_str(), text)),
        Cell::from(Span::styled(card.cpu.as_str(), text)),
        Cell::from(Span::styled(card.memory.as_str(), text)),
        Cell::from(Line::from(button_spans(&card.buttons))),
    ])
}

fn button_spans(buttons: &[ActionButton]) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    for button in buttons {
        let style = if button.loading {
            Style::default().fg(theme::MUTED).add_modifier(Modifier::DIM)
        } else if button.highlight {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        spans.push(Span::styled(format!("[{}]", button.label), style));
        spans.push(Span::raw(" "));
    }
    spans
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    let keys = [
        ("j / Down", "Next server"),
        ("k / Up", "Previous server"),
        ("s", "Start selected server"),
        ("x", "Stop selected server"),
        ("R", "Restart selected server"),
        ("d", "Show recent logs"),
        ("r", "Reload the server list"),
        ("f", "Cycle status filter"),
        ("/", "Search by name"),
        ("Esc", "Clear search / dismiss"),
        ("Tab / ?", "Switch view"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(keys.iter().map(|(key, action)| {
        Line::from(vec![
            Span::styled(format!("{key:<11}"), Color::Cyan),
            Span::raw(*action),
        ])
    }));
    text.push(Line::from(""));
    text.push(Line::from(Span::styled(
        "Polling pauses while this view is open.",
        Style::default().fg(theme::MUTED),
    )));

    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner_area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if app.input_mode() == InputMode::Search {
        lines.push(Line::from(vec![
            Span::styled("/", Color::Cyan),
            Span::raw(app.search().to_string()),
            Span::styled("▏", Color::Cyan),
        ]));
    } else if let Some(notice) = app.notices().latest_success() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{} ", notice.at.format("%H:%M:%S")),
                Style::default().fg(theme::MUTED),
            ),
            Span::styled(format!("{}: ", notice.title), Style::default().fg(Color::Green)),
            Span::raw(notice.message),
        ]));
    } else if let Some(note) = app.status_note.as_deref() {
        lines.push(Line::from(Span::styled(note, Style::default().fg(theme::MUTED))));
    } else {
        lines.push(Line::from(Span::styled(
            "Status: Ready",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(Span::styled(
        "s start  x stop  R restart  d logs  r reload  f filter  / search  ? help  q quit",
        Style::default().fg(theme::MUTED),
    )));
    f.render_widget(Paragraph::new(lines), area);
}

fn render_logs(f: &mut Frame, logs: &LogView, area: Rect) {
    let popup = centered_rect(80, 70, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Logs: {} (Esc to close)", logs.name))
        .border_style(Style::default().fg(Color::Cyan));
    let body = if logs.text.trim().is_empty() {
        "No log output.".to_string()
    } else {
        logs.text.clone()
    };
    let line_count = body.lines().count() as u16;
    let visible = popup.height.saturating_sub(2);
    let p = Paragraph::new(body)
        .block(block)
        .scroll((line_count.saturating_sub(visible), 0));
    f.render_widget(Clear, popup);
    f.render_widget(p, popup);
}

fn render_error(f: &mut Frame, title: &str, message: &str, area: Rect) {
    let popup = centered_rect(60, 30, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(Style::default().fg(Color::Red));
    let text = vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or Enter to dismiss",
            Style::default().fg(theme::MUTED),
        )),
    ];
    f.render_widget(Clear, popup);
    f.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, rect: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(rect);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}
