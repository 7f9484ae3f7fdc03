use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use macropad_core::types::{KeyId, PadView, StateName};

use crate::App;
use crate::app::PAD_CHARS;
use crate::colors::to_color;
use crate::display::display_lines;

const PAD_COLUMNS: usize = 3;
const PAD_ROWS: usize = 4;

pub fn draw(f: &mut Frame, app: &App, view: &PadView) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: display, keypad, help --

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(12), Constraint::Length(2)])
        .split(chunks[0]);

    draw_display(f, view, left[0]);
    draw_pad(f, app, view, left[1]);

    let help = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(" 1-9 0 - =", Style::default().fg(Color::Yellow)),
            Span::raw(" keys  "),
            Span::styled("[ ]", Style::default().fg(Color::Yellow)),
            Span::raw(" profile  "),
            Span::styled("esc", Style::default().fg(Color::Yellow)),
            Span::raw(" stop all"),
        ]),
        Line::from(vec![
            Span::styled(" l", Style::default().fg(Color::Yellow)),
            Span::raw(" logs  "),
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(" quit"),
        ]),
    ]);
    f.render_widget(help, left[2]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app
            .log_messages
            .range(start..end)
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

fn draw_display(f: &mut Frame, view: &PadView, area: Rect) {
    let border = if view.error.is_some() { Color::Red } else { Color::Cyan };
    let lines: Vec<Line> = display_lines(view)
        .into_iter()
        .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::White))))
        .collect();
    let display = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} ", view.profile_name)),
    );
    f.render_widget(display, area);
}

fn draw_pad(f: &mut Frame, app: &App, view: &PadView, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, PAD_ROWS as u32); PAD_ROWS])
        .split(area);

    for (r, row) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, PAD_COLUMNS as u32); PAD_COLUMNS])
            .split(*row);
        for (c, cell) in cells.iter().enumerate() {
            let key_id = (r * PAD_COLUMNS + c) as KeyId;
            draw_key(f, app, view, key_id, *cell);
        }
    }
}

fn draw_key(f: &mut Frame, app: &App, view: &PadView, key_id: KeyId, area: Rect) {
    let led = to_color(app.colors.for_key(view, key_id));
    let held = app.held.get(key_id as usize).copied().unwrap_or(false);
    let key = view.key(key_id);

    let mut lines = vec![Line::from(Span::styled(
        PAD_CHARS[key_id as usize].to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ))];
    match key {
        Some(k) => {
            lines.push(Line::from(k.name.clone()));
            let mut status = format!("{} {}", k.kind.label(), k.state);
            if let Some(pos) = view.queue.iter().position(|&q| q == key_id) {
                status = format!("{} #{}", status, pos + 1);
            }
            if let (StateName::Wait | StateName::Sleeping, Some(rem)) = (k.state, k.remaining) {
                status = format!("{} {:.1}s", status, rem.as_secs_f32());
            }
            lines.push(Line::from(Span::styled(status, Style::default().fg(Color::Gray))));
        }
        None => lines.push(Line::from(Span::styled("-", Style::default().fg(Color::DarkGray)))),
    }

    let border = if view.slot == Some(key_id) {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else if held {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let cell = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(led))
        .block(Block::default().borders(Borders::ALL).border_style(border));
    f.render_widget(cell, area);
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        return Line::from(raw);
    }

    let (level, prefix, timestamp, message) = (parts[0], parts[1], parts[3], parts[4]);
    let color = match parts[2].parse::<u8>().unwrap_or(0) {
        1 => Color::DarkGray,
        2 => Color::LightBlue,
        3 => Color::LightMagenta,
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(color)));
    Line::from(spans)
}
