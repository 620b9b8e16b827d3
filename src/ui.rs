use crate::app::{App, FocusedPanel, TagFocus, UIMode};
use crate::controller::DetailPane;
use crate::models::{Folder, Message};
use crate::process::ProcessState;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

fn panel_block(title: &str, focused: bool) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        })
}

pub fn render(f: &mut Frame, app: &mut App<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(18), // Folders and company
            Constraint::Percentage(32), // Message list
            Constraint::Percentage(50), // Selected message
        ])
        .split(f.area());

    render_sidebar(f, app, chunks[0]);
    render_message_list(f, app, chunks[1]);
    render_details(f, app, chunks[2]);

    match app.mode {
        UIMode::PickingCompany => render_company_picker(f, app),
        UIMode::Tagging => render_tag_overlay(f, app),
        UIMode::Browsing | UIMode::Searching => {}
    }
}

fn render_sidebar(f: &mut Frame, app: &App<'_>, area: Rect) {
    let ctl = &app.controller;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(area);

    let unread = ctl.emails().unread_count();
    let items: Vec<ListItem> = ctl
        .folders()
        .iter()
        .enumerate()
        .map(|(i, folder)| {
            let style = if i == ctl.folder_index() {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let badge = if folder.is_inbox() && unread > 0 {
                format!(" ({})", unread)
            } else {
                String::new()
            };
            ListItem::new(format!("{} {}{}", folder.icon, folder.display_name, badge)).style(style)
        })
        .collect();

    let folders = List::new(items).block(panel_block(
        "Folders",
        app.focused_panel == FocusedPanel::Folders,
    ));
    f.render_widget(folders, rows[0]);

    let company_text = match ctl.company() {
        Some(company) => vec![
            Line::from(Span::styled(
                company.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                company.base_url.clone(),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "[c] change  [x] clear",
                Style::default().fg(Color::DarkGray),
            )),
        ],
        None => vec![
            Line::from("No company selected"),
            Line::from(Span::styled(
                "[c] choose",
                Style::default().fg(Color::DarkGray),
            )),
        ],
    };
    let company = Paragraph::new(company_text)
        .block(panel_block("Company", false))
        .wrap(Wrap { trim: true });
    f.render_widget(company, rows[1]);
}

fn render_message_list(f: &mut Frame, app: &mut App<'_>, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let searching = app.mode == UIMode::Searching;
    app.search_input
        .set_block(panel_block(" Search [/] ", searching));
    f.render_widget(&app.search_input, rows[0]);
    if searching {
        let (row, col) = app.search_input.cursor();
        f.set_cursor_position((rows[0].x + 1 + col as u16, rows[0].y + 1 + row as u16));
    }

    app.message_hitboxes.clear();
    let ctl = &app.controller;
    let selection = ctl.selection();
    let title = if selection.search_text.is_empty() {
        "Messages".to_string()
    } else {
        format!("Messages matching \"{}\"", selection.search_text)
    };
    let block = panel_block(
        &title,
        app.focused_panel == FocusedPanel::Messages && !searching,
    );

    let placeholder = if ctl.emails().is_loading() {
        Some(("Loading emails...", Color::Yellow))
    } else if selection.company_id.is_none() && selection.folder == Folder::INBOX {
        Some(("Choose a company with [c] to load mail", Color::DarkGray))
    } else if ctl.visible_messages().is_empty() {
        Some(("No messages", Color::DarkGray))
    } else {
        None
    };
    if let Some((text, color)) = placeholder {
        let p = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true });
        f.render_widget(p, rows[1]);
        return;
    }

    let width = rows[1].width.saturating_sub(4) as usize;
    let selected = selection.selected_message_id;
    let items: Vec<ListItem> = ctl
        .visible_messages()
        .into_iter()
        .map(|m| message_item(m, selected == Some(m.id), width))
        .collect();
    let heights: Vec<u16> = items.iter().map(|item| item.height() as u16).collect();

    let inner = block.inner(rows[1]);
    let mut state = ListState::default();
    state.select(app.selected_visible_index());
    f.render_stateful_widget(List::new(items).block(block), rows[1], &mut state);

    // remember where each visible row landed so clicks can be mapped back
    let mut y = inner.y;
    for (index, height) in heights.iter().enumerate().skip(state.offset()) {
        if y >= inner.bottom() {
            break;
        }
        let height = (*height).min(inner.bottom() - y);
        app.message_hitboxes
            .push((Rect::new(inner.x, y, inner.width, height), index));
        y += height;
    }
}

fn message_item(m: &Message, is_selected: bool, width: usize) -> ListItem<'static> {
    let mut style = if is_selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    if m.is_unread {
        style = style.add_modifier(Modifier::BOLD);
    }

    let indicator = if is_selected { "█" } else { " " };
    let unread = if m.is_unread { "●" } else { " " };
    let mut lines = vec![
        format!(
            "{}{} {}  {}",
            indicator,
            unread,
            truncate(&m.sender, width.saturating_sub(m.timestamp_label.len() + 4)),
            m.timestamp_label
        ),
        format!("{}  {}", indicator, truncate(&m.subject, width)),
        format!("{}  {}", indicator, truncate(&preview_line(&m.body_preview), width)),
    ];
    if let Some(category) = &m.category {
        lines.push(format!("{}  [{}]", indicator, category));
    }
    lines.push(String::new());

    ListItem::new(lines.join("\n")).style(style)
}

fn render_details(f: &mut Frame, app: &App<'_>, area: Rect) {
    let ctl = &app.controller;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(4)])
        .split(area);
    let block = panel_block(
        "Message Details",
        app.focused_panel == FocusedPanel::Details,
    );

    let body_width = rows[0].width.saturating_sub(2) as usize;
    let content = match ctl.detail() {
        DetailPane::Loading { .. } => {
            let p = Paragraph::new("Loading email details...")
                .block(block)
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(p, rows[0]);
            render_process_bar(f, app, rows[1]);
            return;
        }
        DetailPane::Empty => vec![Line::from(Span::styled(
            "Select an email to view details.",
            Style::default().fg(Color::DarkGray),
        ))],
        DetailPane::Ready(m) => detail_lines(
            m,
            &ctl.tags().tags_for(m.id),
            &ctl.folder().display_name,
            body_width,
        ),
    };

    let p = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(p, rows[0]);
    render_process_bar(f, app, rows[1]);
}

fn detail_lines(m: &Message, tags: &[String], folder: &str, width: usize) -> Vec<Line<'static>> {
    let badge = |text: String, bg: Color| {
        Span::styled(
            format!(" {} ", text),
            Style::default().fg(Color::Black).bg(bg),
        )
    };

    let mut badges = vec![badge(folder.to_uppercase(), Color::Gray)];
    if m.is_unread {
        badges.push(Span::raw(" "));
        badges.push(badge("Important".to_string(), Color::LightRed));
    }
    if let Some(category) = &m.category {
        badges.push(Span::raw(" "));
        badges.push(badge(category.clone(), Color::LightBlue));
    }

    let mut tag_line = vec![Span::styled("Tags: ", Style::default().fg(Color::DarkGray))];
    if tags.is_empty() {
        tag_line.push(Span::styled("none  [t] add", Style::default().fg(Color::DarkGray)));
    } else {
        for tag in tags {
            tag_line.push(badge(tag.clone(), Color::LightGreen));
            tag_line.push(Span::raw(" "));
        }
    }

    let mut lines = vec![
        Line::from(Span::styled(
            m.subject.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(badges),
        Line::from(""),
        Line::from(format!("[{}] {}", m.sender_initials(), m.sender)),
        Line::from(format!("To: {}", m.recipient.as_deref().unwrap_or("-"))),
        Line::from(format!("Date: {}", m.timestamp_label)),
        Line::from(tag_line),
        Line::from(""),
    ];
    lines.extend(
        clean_body(&html_to_text(&m.body_preview, width))
            .lines()
            .map(|l| Line::from(l.to_string())),
    );
    lines
}

fn render_process_bar(f: &mut Frame, app: &App<'_>, area: Rect) {
    let process = app.controller.process();
    let button = if process.is_in_flight() {
        Span::styled(" Processing... ", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            " [p] Process ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    };

    let banner = match process.state() {
        ProcessState::Succeeded => Some(Span::styled(
            "Email processed successfully.",
            Style::default().fg(Color::Green),
        )),
        ProcessState::Failed(e) => Some(Span::styled(
            format!("Error: {}", e),
            Style::default().fg(Color::Red),
        )),
        ProcessState::Idle | ProcessState::InFlight => None,
    };

    let mut lines = vec![Line::from(button)];
    if let Some(banner) = banner {
        lines.push(Line::from(banner));
    }
    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn render_company_picker(f: &mut Frame, app: &mut App<'_>) {
    let suggestions = app.company_suggestions();
    let directory_error = app
        .controller
        .directory()
        .last_error()
        .map(|e| format!("Directory unavailable: {}", e));
    let directory_empty = app.controller.directory().is_empty();
    let Some(picker) = app.company_picker.as_mut() else {
        return;
    };

    let area = centered_rect(50, 50, f.area());
    f.render_widget(Clear, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    picker.input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Company [Enter to choose, Esc to cancel] ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(&picker.input, chunks[0]);
    let (row, col) = picker.input.cursor();
    f.set_cursor_position((chunks[0].x + 1 + col as u16, chunks[0].y + 1 + row as u16));

    let block = Block::default().borders(Borders::ALL).title(" Suggestions ");
    if suggestions.is_empty() {
        let text = match directory_error {
            Some(error) => error,
            None if directory_empty => "No suggestions available".to_string(),
            None => "No matching companies".to_string(),
        };
        let p = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(p, chunks[1]);
        return;
    }

    let items: Vec<ListItem> = suggestions
        .iter()
        .map(|c| ListItem::new(format!("{}  ({})", c.name, c.base_url)))
        .collect();
    let mut state = ListState::default();
    state.select(Some(picker.cursor));
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_tag_overlay(f: &mut Frame, app: &mut App<'_>) {
    let Some(overlay) = app.tag_overlay.as_mut() else {
        return;
    };
    let tags = app.controller.tags();

    let area = centered_rect(40, 60, f.area());
    f.render_widget(Clear, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(3), Constraint::Length(1)])
        .split(area);

    let items: Vec<ListItem> = tags
        .palette()
        .iter()
        .map(|tag| {
            let on = tags.has_tag(overlay.message_id, tag);
            let style = if on {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("[{}] {}", if on { "x" } else { " " }, tag)).style(style)
        })
        .collect();

    let palette_focused = overlay.focus == TagFocus::Palette;
    let mut state = ListState::default();
    state.select(palette_focused.then_some(overlay.cursor));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Manage Tags ")
                .border_style(Style::default().fg(if palette_focused {
                    Color::Cyan
                } else {
                    Color::Gray
                })),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, chunks[0], &mut state);

    overlay.input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Add Custom Tag ")
            .border_style(Style::default().fg(if palette_focused {
                Color::Gray
            } else {
                Color::Cyan
            })),
    );
    f.render_widget(&overlay.input, chunks[1]);
    if !palette_focused {
        let (row, col) = overlay.input.cursor();
        f.set_cursor_position((chunks[1].x + 1 + col as u16, chunks[1].y + 1 + row as u16));
    }

    let help = Paragraph::new("Enter toggle/add  Tab switch  Esc close")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[2]);
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

fn truncate(s: &str, len: usize) -> String {
    if s.chars().count() > len {
        let truncated: String = s.chars().take(len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        s.to_string()
    }
}

/// Previews are HTML fragments; render them as wrapped plain text.
fn html_to_text(s: &str, width: usize) -> String {
    html2text::from_read(s.as_bytes(), width.max(20)).unwrap_or_else(|_| s.to_string())
}

/// A preview flattened onto one line for the message list.
fn preview_line(s: &str) -> String {
    html_to_text(s, 200)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse runs of blank lines to one and trim trailing whitespace.
fn clean_body(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut result = String::with_capacity(normalized.len());
    let mut consecutive_empty_lines = 0;
    let mut first_content = true;

    for line in normalized.split('\n') {
        let trimmed = line.trim_end();

        if trimmed.is_empty() {
            consecutive_empty_lines += 1;
            continue;
        }
        if !first_content {
            let newlines_to_add = std::cmp::min(consecutive_empty_lines + 1, 2);
            for _ in 0..newlines_to_add {
                result.push('\n');
            }
        }
        result.push_str(trimmed);
        consecutive_empty_lines = 0;
        first_content = false;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn test_clean_body_removes_extra_newlines() {
        let input = "Line 1\n\n\nLine 2\n\n\n\nLine 3";
        assert_eq!(clean_body(input), "Line 1\n\nLine 2\n\nLine 3");
    }

    #[test]
    fn test_clean_body_normalizes_crlf_and_whitespace_lines() {
        assert_eq!(clean_body("Line 1\r\n   \r\n\t\r\nLine 2  "), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text("<p>Hi Mike</p>", 80).trim(), "Hi Mike");
        assert_eq!(preview_line("a<br>b &amp; c"), "a b & c");
        assert_eq!(preview_line("plain text"), "plain text");
    }

    #[test]
    fn test_html_to_text_keeps_bare_angle_brackets_and_entities() {
        assert_eq!(
            preview_line("Q3 revenue < forecast, see attached"),
            "Q3 revenue < forecast, see attached"
        );
        assert_eq!(
            preview_line("It&#39;s ready &mdash; thanks"),
            "It's ready \u{2014} thanks"
        );
    }

    #[test]
    fn test_detail_body_is_wrapped_and_cleaned() {
        let mut m = crate::api::testing::message(1, "a", "b", "");
        m.body_preview = "<p>First paragraph</p><p></p><p></p><p>Second</p>".to_string();
        let text: Vec<String> = detail_lines(&m, &[], "Inbox", 60)
            .iter()
            .map(|l| l.to_string())
            .collect();
        let first = text.iter().position(|l| l == "First paragraph").unwrap();
        assert_eq!(text[first + 1], "");
        assert_eq!(text[first + 2], "Second");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long subject", 10), "a very ...");
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_without_company_prompts_for_one() {
        let mut app = App::new(&Config::default());
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Folders"));
        assert!(text.contains("No company selected"));
        assert!(text.contains("Select an email to view details."));
    }

    #[test]
    fn test_render_loading_state() {
        let mut app = App::new(&Config::default());
        app.controller.select_company(crate::models::Company {
            id: "1".into(),
            name: "Acme".into(),
            base_url: "https://a.test".into(),
        });
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();

        assert!(buffer_text(&terminal).contains("Loading emails..."));
    }
}
