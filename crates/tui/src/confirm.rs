use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Yes/No popup. Defaults to No.
pub struct ConfirmDialog {
    pub message: String,
    pub selected: bool, // true = Yes
}

impl ConfirmDialog {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), selected: false }
    }

    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.message.chars().count() as u16 + 6).max(30);
        let area = centered_rect(width, 6, f.area());
        f.render_widget(Clear, area);

        let button = |label: &'static str, on: bool, bg: Color| {
            if on {
                Span::styled(label, Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD))
            } else {
                Span::styled(label, Style::default().fg(Color::DarkGray))
            }
        };

        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(self.message.as_str(), Style::default().fg(Color::White))),
            Line::from(""),
            Line::from(vec![
                button("  [Yes]  ", self.selected, Color::Green),
                Span::raw("   "),
                button("  [No]  ", !self.selected, Color::Red),
            ]),
        ];

        let dialog = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Quit "),
        );
        f.render_widget(dialog, area);
    }
}

/// A `width` x `height` rect centered in `area`, clipped to it.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
