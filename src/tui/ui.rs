//! UI rendering functions for the TUI.
//!
//! Implements the three-panel layout with search input, note list, and
//! editor (with optional markdown preview), plus the confirm and history
//! overlays, using ratatui widgets and layout management.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use time::format_description;

use crate::manager::SaveStatus;
use crate::models::Note;
use crate::utils::{stats_label, truncate_chars};
use crate::SortMode;

use super::app::{App, Focus};

/// Main rendering function for the TUI.
///
/// Draws the three-panel layout and, when open, the confirm or history
/// overlay on top of it.
pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    // Main layout: search input at top, content in middle, status bar at bottom
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search input
            Constraint::Min(0),    // Content area
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    // Content area: note list (30%) | editor (70%)
    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(main_chunks[1]);

    render_search_input(frame, app, main_chunks[0]);
    render_note_list(frame, app, content_chunks[0]);
    render_editor(frame, app, content_chunks[1]);
    render_status_bar(frame, app, main_chunks[2]);

    if app.history().is_some() {
        render_history_modal(frame, app, size);
    }
    if app.confirm().is_some() {
        render_confirm_modal(frame, app, size);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Renders the search input panel with the current sort mode in the title.
fn render_search_input(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = matches!(app.focus(), Focus::SearchInput);

    let sort_label = match app.manager().sort_mode() {
        SortMode::UpdatedDesc => "updated",
        SortMode::CreatedDesc => "created",
        SortMode::TitleAsc => "title",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Search [sort: {sort_label}]"))
        .border_style(focus_style(is_focused));

    let mut content = app.manager().search_term().to_string();
    if is_focused {
        content.push('█'); // Cursor indicator
    }

    frame.render_widget(Paragraph::new(content).block(block), area);
}

fn save_status_label(app: &App, note: &Note) -> (&'static str, Color) {
    match app.manager().save_state(note.id()).status {
        SaveStatus::Saved => ("saved", Color::DarkGray),
        SaveStatus::Saving => ("saving…", Color::Yellow),
        SaveStatus::Error => ("save failed", Color::Red),
    }
}

/// Renders the note list panel from the search/sort projection.
///
/// Each row shows a pin marker, the title, and the note's save status.
fn render_note_list(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = matches!(app.focus(), Focus::NoteList);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Notes")
        .border_style(focus_style(is_focused));

    let items: Vec<ListItem> = app
        .visible_notes()
        .iter()
        .map(|note| {
            let marker = if note.is_pinned() { "* " } else { "  " };
            let title = if note.title().is_empty() {
                "(untitled)"
            } else {
                note.title()
            };
            let (status, color) = save_status_label(app, note);

            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::raw(truncate_chars(title, 40).to_string()),
                Span::raw(" "),
                Span::styled(
                    format!("[{status}]"),
                    Style::default().fg(color).add_modifier(Modifier::ITALIC),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::REVERSED),
    );

    let mut list_state = ListState::default();
    list_state.select(app.selected_index());

    frame.render_stateful_widget(list, area, &mut list_state);
}

/// Renders the editor panel: metadata header plus content (or its
/// markdown preview).
fn render_editor(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = matches!(app.focus(), Focus::Editor);

    let title = if app.preview() {
        "Preview".to_string()
    } else if let Some(note) = app.selected_note() {
        let (status, _) = save_status_label(app, note);
        format!("Editor [{status}]")
    } else {
        "Editor".to_string()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(focus_style(is_focused));

    let content = if let Some(note) = app.selected_note() {
        if app.preview() {
            tui_markdown::from_str(note.content())
        } else {
            let mut text = Text::default();
            text.lines.push(Line::from(vec![
                Span::styled("Title: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(note.title().to_string()),
            ]));

            let mut meta = vec![Span::styled(
                format!("Tags: {}", note.tags().unwrap_or("-")),
                Style::default().fg(Color::DarkGray),
            )];
            if let Some(token) = note.public_token() {
                meta.push(Span::raw("  "));
                meta.push(Span::styled(
                    format!("public:{token}"),
                    Style::default().fg(Color::Green),
                ));
            }
            text.lines.push(Line::from(meta));

            let date_format =
                format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
                    .expect("valid datetime format");
            text.lines.push(Line::from(Span::styled(
                format!(
                    "Updated: {}  ·  {}",
                    note.updated_at()
                        .format(&date_format)
                        .unwrap_or_else(|_| "????-??-?? ??:??:??".to_string()),
                    stats_label(note.content()),
                ),
                Style::default().fg(Color::DarkGray),
            )));

            text.lines.push(Line::from(""));
            for line in note.content().lines() {
                text.lines.push(Line::from(line.to_string()));
            }
            if is_focused {
                // Cursor indicator at the end of content
                if let Some(last) = text.lines.last_mut() {
                    last.spans.push(Span::raw("█"));
                }
            }
            text
        }
    } else {
        Text::from("No note selected")
    };

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, area);
}

/// Renders the status bar: a one-shot notice if present, otherwise
/// context-aware keyboard shortcuts.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(notice) = app.notice() {
        let line = Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let key_style = Style::default().fg(Color::Cyan);
    let sep_style = Style::default().fg(Color::DarkGray);

    let pairs: &[(&str, &str)] = match app.focus() {
        Focus::SearchInput => &[
            ("type", "filter"),
            ("Enter", "to list"),
            ("Tab", "next panel"),
            ("Ctrl+Q", "quit"),
        ],
        Focus::NoteList => &[
            ("j/k", "navigate"),
            ("Enter", "edit"),
            ("n", "new"),
            ("d", "delete"),
            ("p", "pin"),
            ("P", "share"),
            ("h", "history"),
            ("s", "save"),
            ("o", "sort"),
            ("q", "quit"),
        ],
        Focus::Editor => &[
            ("type", "edit"),
            ("Ctrl+S", "save"),
            ("Ctrl+P", "preview"),
            ("Esc", "back"),
        ],
    };

    let mut spans = Vec::new();
    for (i, (keys, action)) in pairs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", sep_style));
        }
        spans.push(Span::styled(*keys, key_style));
        spans.push(Span::raw(format!(": {action}")));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Centers a modal rect of the given size within `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(
        x,
        y,
        width.min(area.width),
        height.min(area.height),
    )
}

/// Renders the version-history overlay.
fn render_history_modal(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.history() else {
        return;
    };

    let modal = centered_rect(area.width.saturating_mul(3) / 4, 20, area);
    frame.render_widget(Clear, modal);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Note History (j/k navigate, r restore, Esc close)")
        .border_style(Style::default().fg(Color::Cyan));

    if view.versions.is_empty() {
        let paragraph =
            Paragraph::new("No versions yet. Edits are versioned automatically.").block(block);
        frame.render_widget(paragraph, modal);
        return;
    }

    let date_format = format_description::parse("[year]-[month]-[day] [hour]:[minute]")
        .expect("valid datetime format");

    let items: Vec<ListItem> = view
        .versions
        .iter()
        .map(|version| {
            let when = version
                .created_at()
                .format(&date_format)
                .unwrap_or_else(|_| "????-??-?? ??:??".to_string());
            let preview = version.preview().replace('\n', " ");
            let line = Line::from(vec![
                Span::styled(when, Style::default().add_modifier(Modifier::BOLD)),
                Span::raw("  "),
                Span::styled(preview, Style::default().fg(Color::DarkGray)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::REVERSED),
    );

    let mut list_state = ListState::default();
    list_state.select(Some(view.selected));

    frame.render_stateful_widget(list, modal, &mut list_state);
}

/// Renders the confirm overlay for destructive actions.
fn render_confirm_modal(frame: &mut Frame, app: &App, area: Rect) {
    let Some(confirm) = app.confirm() else {
        return;
    };

    let modal = centered_rect(area.width.saturating_mul(2) / 3, 5, area);
    frame.render_widget(Clear, modal);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Confirm")
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(confirm.prompt.clone())
        .block(block)
        .wrap(Wrap { trim: false });

    frame.render_widget(paragraph, modal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::NoteManager;
    use crate::models::{NoteBuilder, NoteId, UserId};

    fn test_app() -> App {
        let mut manager = NoteManager::new();
        manager.set_notes(vec![
            NoteBuilder::new()
                .id(NoteId::new(1))
                .user_id(UserId::new(1))
                .title("A note with a fairly long title that should be cut for the list")
                .content("body")
                .build(),
        ]);
        App::with_manager(manager)
    }

    #[test]
    fn three_panel_layout_structure() {
        let area = Rect::new(0, 0, 100, 30);

        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        assert_eq!(main_chunks[0].height, 3, "search input should be 3 lines tall");
        assert_eq!(main_chunks[2].height, 1, "status bar should be 1 line tall");

        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(main_chunks[1]);

        let total_width = content_chunks[0].width + content_chunks[1].width;
        let left_percentage = (content_chunks[0].width as f32 / total_width as f32) * 100.0;
        assert!(
            (left_percentage - 30.0).abs() < 5.0,
            "left panel should be approximately 30% wide, got {left_percentage}%"
        );
    }

    #[test]
    fn list_titles_are_truncated_to_forty_chars() {
        let app = test_app();
        let note = app.visible_notes()[0];

        let cut = truncate_chars(note.title(), 40);
        assert_eq!(cut.chars().count(), 40);
        assert!(note.title().starts_with(cut));
    }

    #[test]
    fn centered_rect_stays_within_bounds() {
        let area = Rect::new(0, 0, 100, 30);
        let modal = centered_rect(75, 20, area);

        assert!(modal.x + modal.width <= area.width);
        assert!(modal.y + modal.height <= area.height);

        // Degenerate terminal sizes clamp instead of overflowing
        let tiny = Rect::new(0, 0, 10, 3);
        let modal = centered_rect(75, 20, tiny);
        assert!(modal.width <= tiny.width);
        assert!(modal.height <= tiny.height);
    }

    #[test]
    fn save_status_labels_cover_all_states() {
        use std::time::Instant;

        let mut app = test_app();
        let note_id = NoteId::new(1);

        let note = app.manager().note(note_id).unwrap().clone();
        assert_eq!(save_status_label(&app, &note).0, "saved");

        app.manager_mut()
            .queue_content_edit(note_id, "changed", Instant::now());
        let note = app.manager().note(note_id).unwrap().clone();
        assert_eq!(save_status_label(&app, &note).0, "saving…");

        app.manager_mut()
            .flush_failed(note_id, crate::FlushKind::Content, "boom");
        let note = app.manager().note(note_id).unwrap().clone();
        assert_eq!(save_status_label(&app, &note).0, "save failed");
    }
}
