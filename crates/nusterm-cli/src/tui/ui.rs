//! Rendering for the TUI.
//!
//! Layout, top to bottom: a header row with the connect button, the output
//! pane, the input pane and a status line. The menu and picker draw over
//! the output pane.

use nusterm_core::SessionState;
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Clear, List, ListItem, ListState, Paragraph};

use super::app::{App, Areas, Focus, MenuItem};

const INPUT_PROMPT: &str = "> ";

/// Split the screen into header, button, output, input and status regions.
pub fn layout(area: Rect, button_label: &str) -> (Rect, Rect, Rect, Rect, Rect) {
    let [header, output, input, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let button_width = (button_label.len() as u16 + 4).min(header.width);
    let button = Rect::new(
        header.x + header.width - button_width,
        header.y,
        button_width,
        1,
    );
    (header, button, output, input, status)
}

fn state_color(state: SessionState) -> Color {
    match state {
        SessionState::Connected => Color::Green,
        SessionState::Connecting => Color::Yellow,
        SessionState::Disconnected => Color::Red,
    }
}

fn focus_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

/// Draw the whole UI and record the regions used for mouse hit testing.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let (header, button, output, input, status) = layout(frame.area(), app.button);
    app.areas = Areas {
        button,
        output,
        input,
        menu: None,
        picker: None,
    };

    draw_header(frame, app, header, button);
    draw_output(frame, app, output);
    draw_input(frame, app, input);
    draw_status(frame, app, status);

    if app.picker.is_some() {
        app.areas.picker = Some(draw_picker(frame, app, output));
    } else if app.menu.is_some() {
        app.areas.menu = Some(draw_menu(frame, app, output));
    }
}

fn draw_header(frame: &mut Frame, app: &App, header: Rect, button: Rect) {
    let title = Line::from(vec![
        Span::styled(" nusterm ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(app.device.as_deref().unwrap_or("")),
    ]);
    frame.render_widget(Paragraph::new(title), header);

    let style = match app.state {
        SessionState::Connected => Style::default().fg(Color::Black).bg(Color::Red),
        SessionState::Connecting => Style::default().fg(Color::Black).bg(Color::DarkGray),
        SessionState::Disconnected => Style::default().fg(Color::Black).bg(Color::Green),
    };
    frame.render_widget(
        Paragraph::new(format!("[ {} ]", app.button))
            .style(style)
            .alignment(Alignment::Center),
        button,
    );
}

fn draw_output(frame: &mut Frame, app: &App, area: Rect) {
    let height = usize::from(area.height.saturating_sub(2));
    let total = app.output.len();
    let end = total.saturating_sub(app.scroll);
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = app
        .output
        .lines()
        .skip(start)
        .take(end - start)
        .map(Line::raw)
        .collect();

    let mut title = String::from(" Output ");
    if app.scroll > 0 {
        title = format!(" Output (+{}) ", app.scroll);
    }
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(focus_border(app.focus == Focus::Output))
        .title(title);

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Input;
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(focus_border(focused))
        .title(" Input ");

    let text = app.input.as_str();
    let inner_width = usize::from(area.width.saturating_sub(2 + INPUT_PROMPT.len() as u16));
    // Keep the tail of a long line visible
    let shown: String = {
        let count = text.chars().count();
        text.chars().skip(count.saturating_sub(inner_width.saturating_sub(1))).collect()
    };

    let line = Line::from(vec![
        Span::styled(INPUT_PROMPT, Style::default().fg(Color::DarkGray)),
        Span::raw(shown.as_str()),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);

    if focused && app.menu.is_none() && app.picker.is_none() {
        let x = area.x + 1 + INPUT_PROMPT.len() as u16 + shown.chars().count() as u16;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.state),
            Style::default().fg(state_color(app.state)).bold(),
        ),
        Span::raw(" "),
    ];
    match app.status_message() {
        Some(message) => spans.push(Span::raw(message.to_string())),
        None => spans.push(Span::styled(
            "F5 connect  F2 menu  Tab focus  PgUp/PgDn scroll  Ctrl-C quit",
            Style::default().fg(Color::DarkGray),
        )),
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rect of `width` x `height` centered in `area`, clamped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn draw_menu(frame: &mut Frame, app: &App, output: Rect) -> Rect {
    let width = MenuItem::ALL
        .iter()
        .map(|item| item.label().len() as u16)
        .max()
        .unwrap_or(0)
        + 6;
    let area = Rect::new(
        output.x + 2,
        output.y + 1,
        width,
        MenuItem::ALL.len() as u16 + 2,
    )
    .intersection(output);

    let items: Vec<ListItem> = MenuItem::ALL
        .iter()
        .map(|item| ListItem::new(item.label()))
        .collect();
    let mut state = ListState::default().with_selected(app.menu.map(|m| m.selected));
    let list = List::new(items)
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Menu "),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
    area
}

fn draw_picker(frame: &mut Frame, app: &App, output: Rect) -> Rect {
    let Some(picker) = app.picker.as_ref() else {
        return Rect::default();
    };

    let longest = picker
        .labels
        .iter()
        .map(|l| l.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let area = centered(
        output,
        (longest + 4).max(40),
        picker.labels.len() as u16 + 2,
    );

    let items: Vec<ListItem> = picker
        .labels
        .iter()
        .map(|label| ListItem::new(label.as_str()))
        .collect();
    let mut state = ListState::default().with_selected(Some(picker.selected));
    let list = List::new(items)
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Select a device ")
                .title_bottom(" Enter connect · Esc cancel "),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use tokio::sync::mpsc;

    fn render(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(usize::from(width))
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> App {
        let (_tx, rx) = mpsc::unbounded_channel();
        App::new(rx, 100)
    }

    #[test]
    fn test_layout_button_on_right() {
        let (header, button, output, input, status) = layout(Rect::new(0, 0, 80, 24), "Connect");
        assert_eq!(header.height, 1);
        assert_eq!(button, Rect::new(69, 0, 11, 1));
        assert_eq!(input.height, 3);
        assert_eq!(status.y, 23);
        assert_eq!(output.height, 24 - 1 - 3 - 1);
    }

    #[test]
    fn test_draw_records_areas_and_shows_banner() {
        let mut app = app();
        let screen = render(&mut app, 80, 24);
        assert!(screen.contains("[ Connect ]"));
        assert!(screen.contains("Welcome to nusterm"));
        assert_eq!(app.areas.output.height, 19);
        assert!(app.areas.menu.is_none());
    }

    #[test]
    fn test_draw_menu_overlay() {
        let mut app = app();
        app.open_menu();
        let screen = render(&mut app, 80, 24);
        assert!(screen.contains("Terminal Reset"));
        assert!(screen.contains("Project Page"));
        assert!(app.areas.menu.is_some());
    }

    #[test]
    fn test_draw_input_line() {
        let mut app = app();
        app.key("l");
        app.key("s");
        let screen = render(&mut app, 80, 24);
        assert!(screen.contains("> ls"));
    }

    #[test]
    fn test_draw_tiny_terminal_does_not_panic() {
        let mut app = app();
        app.open_menu();
        render(&mut app, 10, 6);
    }
}
