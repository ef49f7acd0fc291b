use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::View;
use crate::mode::Mode;

/// Names of the active modes, with the bound one highlighted.
#[derive(Debug, Default)]
pub struct ModeBar {
    pub names: Vec<String>,
    pub current: Option<usize>,
    pub visible: bool,
}

pub fn render(frame: &mut Frame, view: &mut View, mode: Option<&dyn Mode>, bar: &ModeBar) {
    match (view.dialog_text().map(str::to_string), mode) {
        (Some(text), _) => render_dialog(frame, &text),
        (None, Some(mode)) => render_launcher(frame, view, mode, bar),
        (None, None) => {}
    }
}

fn render_launcher(frame: &mut Frame, view: &mut View, mode: &dyn Mode, bar: &ModeBar) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let message = view
        .message()
        .map(str::to_string)
        .or_else(|| mode.message());
    let show_bar = bar.visible && bar.names.len() > 1;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(if message.is_some() { 1 } else { 0 }),
            Constraint::Min(1),
            Constraint::Length(if show_bar { 1 } else { 0 }),
        ])
        .split(area);

    let prompt = mode
        .prompt()
        .unwrap_or_else(|| mode.display_name().to_string());
    let input = Paragraph::new(view.user_input().to_string()).block(
        Block::default()
            .title(format!(" {prompt} "))
            .borders(Borders::ALL)
            .style(Style::default().bg(Color::Rgb(15, 15, 24))),
    );
    frame.render_widget(input, chunks[0]);

    if let Some(message) = message {
        frame.render_widget(
            Paragraph::new(format!(" {message}")).style(
                Style::default()
                    .bg(Color::Rgb(10, 10, 18))
                    .fg(Color::Yellow),
            ),
            chunks[1],
        );
    }

    let rows = view.layout_rows(chunks[2]);
    let results: Vec<Line> = if view.filtered().is_empty() {
        vec![Line::from(Span::styled(
            "No matches",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let selected = view.selected_row();
        rows.map(|row| {
            let label = view.filtered()[row];
            let label = mode.display_value(label).unwrap_or_default();
            if row == selected {
                Line::from(Span::styled(
                    format!("> {label}"),
                    Style::default().fg(Color::Black).bg(Color::Cyan),
                ))
            } else {
                Line::from(Span::styled(
                    format!("  {label}"),
                    Style::default().fg(Color::Gray),
                ))
            }
        })
        .collect()
    };

    let result_block = Paragraph::new(results).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .style(Style::default().bg(Color::Rgb(10, 10, 18))),
    );
    frame.render_widget(result_block, chunks[2]);

    if show_bar {
        render_mode_bar(frame, bar, chunks[3]);
    }

    let cursor_x = chunks[0].x + 1 + view.input().cursor() as u16;
    let cursor_y = chunks[0].y + 1;
    frame.set_cursor_position((cursor_x, cursor_y));
}

fn render_mode_bar(frame: &mut Frame, bar: &ModeBar, area: Rect) {
    let spans: Vec<Span> = bar
        .names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let style = if bar.current == Some(index) {
                Style::default()
                    .bg(Color::Rgb(30, 30, 45))
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().bg(Color::Rgb(18, 18, 28)).fg(Color::Gray)
            };
            Span::styled(format!(" {name} "), style)
        })
        .collect();

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(20, 20, 30))),
        area,
    );
}

fn render_dialog(frame: &mut Frame, text: &str) {
    let area = centered_rect(70, 30, frame.area());
    frame.render_widget(Clear, area);

    let dialog = Paragraph::new(text.to_string())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(" quiver ")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(15, 15, 24)).fg(Color::Red)),
        );
    frame.render_widget(dialog, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

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
    use super::*;

    #[test]
    fn centered_rect_stays_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(70, 60, outer);
        assert!(inner.width <= 71 && inner.height <= 25);
        assert!(inner.x > 0 && inner.y > 0);
        assert!(inner.right() < outer.right() && inner.bottom() < outer.bottom());
    }
}
