//! Rendering of the application state.
//!
//! Stateless: every frame is drawn from [`App`] and the input line alone.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use swapchat_app::{App, MessageBody, MessageView, Screen, SessionView};
use swapchat_core::SessionState;

use crate::input::InputState;

const LOGIN_HELP: [&str; 4] = [
    "You are not logged in.",
    "",
    "  /login <email> <password>",
    "  /register <username> <email> <password>",
];

/// Draw one frame.
pub fn draw(frame: &mut Frame<'_>, app: &App, input: &InputState) {
    let [header, body, status, input_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1), Constraint::Length(3)])
            .areas(frame.area());

    draw_header(frame, header, app);
    match app.screen() {
        Screen::Loading => {
            frame.render_widget(Paragraph::new("Checking login…").alignment(Alignment::Center), body);
        },
        Screen::Login => {
            let lines: Vec<Line<'_>> = LOGIN_HELP.iter().map(|l| Line::from(*l)).collect();
            frame.render_widget(Paragraph::new(lines), body);
        },
        Screen::ChatList => draw_chat_list(frame, body, app),
        Screen::Conversation => {
            if let Some(view) = app.session() {
                draw_conversation(frame, body, view);
            }
        },
    }

    let status_text = app.status().map_or_else(|| hint(app.screen()).to_string(), ToString::to_string);
    frame.render_widget(Paragraph::new(status_text).style(Style::default().fg(Color::DarkGray)), status);

    draw_input(frame, input_area, app, input);
}

fn hint(screen: Screen) -> &'static str {
    match screen {
        Screen::Loading | Screen::Login => "/quit to exit",
        Screen::ChatList => "↑/↓ select · Enter open · /open <uuid> · /refresh · /logout · /quit",
        Screen::Conversation => "Enter send · /file <name> <mime> <path> · Esc or /back to leave",
    }
}

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let title = match (app.screen(), app.session()) {
        (Screen::Conversation, Some(view)) => Line::from(vec![
            Span::styled(view.counterpart.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  {}", state_label(view))),
        ]),
        _ => match app.user() {
            Some(user) => Line::from(format!("Logged in as {}", user.username)),
            None => Line::from("Swapchat"),
        },
    };
    let block = Block::default().borders(Borders::ALL).title(" Swapchat ");
    frame.render_widget(Paragraph::new(title).block(block), area);
}

/// Short label for the session state shown in the header.
pub fn state_label(view: &SessionView) -> &'static str {
    match view.state {
        SessionState::Connecting => "connecting…",
        SessionState::AwaitingHistory => "loading history…",
        SessionState::Active if view.pending => "sending…",
        SessionState::Active => "encrypted",
        SessionState::Disconnected => "disconnected",
    }
}

fn draw_chat_list(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Conversations ");
    if app.chats().is_empty() {
        let empty = Paragraph::new("No conversations yet. Use /open <uuid> to start one.").block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem<'_>> = app
        .chats()
        .iter()
        .enumerate()
        .map(|(i, chat)| ListItem::new(format!("{}. {}", i + 1, chat.name)))
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(app.selected()));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Text of one message line.
pub fn message_text(message: &MessageView) -> String {
    let marker = if message.by_me { "(me) " } else { "" };
    let time = if message.time.is_empty() { String::new() } else { format!("{} ", message.time) };
    match &message.body {
        MessageBody::File { url, label } => format!("{time}{marker}{label} <{url}>"),
        _ => format!("{time}{marker}{}", message.text()),
    }
}

/// All lines of the conversation body, oldest first.
pub fn conversation_lines(view: &SessionView) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(banner) = view.banner() {
        lines.push(Line::styled(banner, Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)));
    }
    if view.groups.is_empty() && matches!(view.state, SessionState::Connecting | SessionState::AwaitingHistory) {
        lines.push(Line::styled("Establishing a secure session…", Style::default().fg(Color::DarkGray)));
    }

    for group in &view.groups {
        lines.push(Line::styled(format!("── {} ──", group.date), Style::default().fg(Color::Cyan)).centered());
        for message in &group.messages {
            let style = match message.body {
                MessageBody::Placeholder(_) | MessageBody::Deleted => {
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
                },
                MessageBody::File { .. } => Style::default().add_modifier(Modifier::UNDERLINED),
                MessageBody::Text(_) if message.by_me => Style::default().fg(Color::Green),
                MessageBody::Text(_) => Style::default(),
            };
            lines.push(Line::styled(message_text(message), style));
        }
    }

    if view.pending {
        lines.push(Line::styled("sending…", Style::default().fg(Color::DarkGray)));
    }
    lines
}

fn draw_conversation(frame: &mut Frame<'_>, area: Rect, view: &SessionView) {
    let lines = conversation_lines(view);
    let visible = usize::from(area.height.saturating_sub(2));
    let scroll = u16::try_from(lines.len().saturating_sub(visible)).unwrap_or(u16::MAX);
    let block = Block::default().borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);

    if view.state == SessionState::Disconnected {
        draw_disconnected(frame, area, view.notice.as_deref().unwrap_or("disconnected"));
    }
}

fn draw_disconnected(frame: &mut Frame<'_>, area: Rect, notice: &str) {
    let [_, middle, _] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(5), Constraint::Fill(1)]).areas(area);
    let [_, modal, _] =
        Layout::horizontal([Constraint::Percentage(15), Constraint::Percentage(70), Constraint::Percentage(15)])
            .areas(middle);

    let text = vec![
        Line::from(notice.to_string()),
        Line::from(""),
        Line::from("Press Esc to return to your conversations"),
    ];
    let block = Block::default().borders(Borders::ALL).title(" Disconnected ").style(Style::default().fg(Color::Red));
    frame.render_widget(Clear, modal);
    frame.render_widget(Paragraph::new(text).block(block).alignment(Alignment::Center).wrap(Wrap { trim: true }), modal);
}

fn draw_input(frame: &mut Frame<'_>, area: Rect, app: &App, input: &InputState) {
    let title = match app.session() {
        Some(view) if app.screen() == Screen::Conversation && view.can_send() => " Message ",
        _ => " Command ",
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(Paragraph::new(input.text()).block(block), area);

    let column = u16::try_from(input.cursor()).unwrap_or(u16::MAX);
    frame.set_cursor_position((area.x.saturating_add(1).saturating_add(column), area.y.saturating_add(1)));
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};
    use swapchat_app::{AppEvent, AuthState, DateGroup};
    use swapchat_core::{CloseReason, Counterpart};
    use swapchat_proto::rest::{ChatSummary, User};

    use super::*;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(70, 20)).unwrap();
        terminal.draw(|frame| draw(frame, app, &InputState::new())).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn logged_in() -> App {
        let mut app = App::new();
        let user = User { email: "ada@example.org".into(), username: "ada".into(), uuid: None };
        app.handle(AppEvent::AuthChanged(AuthState::Authenticated(user)));
        app
    }

    fn counterpart() -> Counterpart {
        Counterpart { to: "u-2".into(), name: "Grace".into(), profile_pic: None }
    }

    fn message(body: MessageBody, by_me: bool) -> MessageView {
        MessageView { body, time: "09:30".into(), by_me }
    }

    #[test]
    fn chat_list_is_numbered() {
        let mut app = logged_in();
        let chat = |name: &str| ChatSummary { convo_id: name.into(), name: name.into(), profile_pic: None };
        app.handle(AppEvent::ChatsLoaded(vec![chat("Grace"), chat("Linus")]));

        let screen = render(&app);
        assert!(screen.contains("1. Grace"));
        assert!(screen.contains("2. Linus"));
        assert!(screen.contains("Logged in as ada"));
    }

    #[test]
    fn login_screen_shows_commands() {
        let mut app = App::new();
        app.handle(AppEvent::AuthChanged(AuthState::Anonymous));
        assert!(render(&app).contains("/login <email> <password>"));
    }

    #[test]
    fn conversation_lines_show_banner_dates_and_markers() {
        let mut view = SessionView::connecting(counterpart());
        view.state = SessionState::Active;
        view.archived = true;
        view.groups = vec![DateGroup {
            date: "2024-03-01".into(),
            messages: vec![
                message(MessageBody::Text("hi".into()), true),
                message(MessageBody::Deleted, false),
                message(
                    MessageBody::File { url: "https://cdn/x.pdf".into(), label: "A certain .pdf file shared".into() },
                    false,
                ),
            ],
        }];

        let text: Vec<String> = conversation_lines(&view).iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            vec![
                "Previous Conversations have been archived.",
                "── 2024-03-01 ──",
                "09:30 (me) hi",
                "09:30 This message is deleted",
                "09:30 A certain .pdf file shared <https://cdn/x.pdf>",
            ]
        );
    }

    #[test]
    fn pending_send_is_indicated() {
        let mut view = SessionView::connecting(counterpart());
        view.state = SessionState::Active;
        view.pending = true;
        assert_eq!(state_label(&view), "sending…");
        assert_eq!(conversation_lines(&view).last().map(ToString::to_string).as_deref(), Some("sending…"));
    }

    #[test]
    fn disconnected_session_shows_modal() {
        let mut app = logged_in();
        app.handle(AppEvent::SessionOpened(counterpart()));
        let mut view = SessionView::connecting(counterpart());
        view.state = SessionState::Disconnected;
        view.notice = Some(CloseReason::TransportLost("ping timeout".into()).to_string());
        app.handle(AppEvent::SessionUpdated(view));

        let screen = render(&app);
        assert!(screen.contains("Disconnected"));
        assert!(screen.contains("disconnected: ping timeout"));
        assert!(screen.contains("Grace"));
    }
}
