use crate::api::{Message, Role};
use crate::client::ChatClient;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const INPUT_HEIGHT: u16 = 6;

// Restores terminal settings even if the loop exits early.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Self {
        Self
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = io::stdout().flush();
    }
}

#[derive(Debug)]
enum UiEvent {
    /// A fresh snapshot of the whole conversation; replaces the rendered one.
    Conversation(Vec<Message>),
    TurnFinished,
    Quit,
}

struct InputBuffer {
    lines: Vec<String>,
    cursor_x: usize,
    cursor_y: usize,
}

impl InputBuffer {
    fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_x: 0,
            cursor_y: 0,
        }
    }

    fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    // cursor_x counts characters, not bytes; convert before slicing so
    // multi-byte input lands on a char boundary.
    fn byte_offset(line: &str, cursor_x: usize) -> usize {
        line.char_indices()
            .nth(cursor_x)
            .map(|(idx, _)| idx)
            .unwrap_or(line.len())
    }

    fn insert_char(&mut self, c: char) {
        let idx = Self::byte_offset(&self.lines[self.cursor_y], self.cursor_x);
        self.lines[self.cursor_y].insert(idx, c);
        self.cursor_x += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_x > 0 {
            let idx = Self::byte_offset(&self.lines[self.cursor_y], self.cursor_x - 1);
            self.lines[self.cursor_y].remove(idx);
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            let prev_line = self.lines.remove(self.cursor_y);
            self.cursor_y -= 1;
            self.cursor_x = self.lines[self.cursor_y].chars().count();
            self.lines[self.cursor_y].push_str(&prev_line);
        }
    }

    fn new_line(&mut self) {
        let line = &self.lines[self.cursor_y];
        let remaining: String = line.chars().skip(self.cursor_x).collect();
        self.lines[self.cursor_y] = line.chars().take(self.cursor_x).collect();
        self.lines.insert(self.cursor_y + 1, remaining);
        self.cursor_y += 1;
        self.cursor_x = 0;
    }

    fn move_left(&mut self) {
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.lines[self.cursor_y].chars().count();
        }
    }

    fn move_right(&mut self) {
        let line_len = self.lines[self.cursor_y].chars().count();
        if self.cursor_x < line_len {
            self.cursor_x += 1;
        } else if self.cursor_y < self.lines.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = 0;
        }
    }

    fn move_up(&mut self) {
        if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.cursor_x.min(self.lines[self.cursor_y].chars().count());
        }
    }

    fn move_down(&mut self) {
        if self.cursor_y < self.lines.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = self.cursor_x.min(self.lines[self.cursor_y].chars().count());
        }
    }

    fn to_string(&self) -> String {
        self.lines.join("\n")
    }

    fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    fn render(&self) -> Text<'static> {
        if self.is_empty() {
            return Text::from(Span::styled(
                "Ask the health assistant...",
                Style::default().fg(Color::DarkGray),
            ));
        }
        Text::from(
            self.lines
                .iter()
                .map(|l| Line::from(l.clone()))
                .collect::<Vec<_>>(),
        )
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn transcript_lines(conversation: &[Message]) -> Vec<LineSpec> {
    let mut specs = Vec::new();
    for message in conversation {
        let (header, color) = match message.role {
            Role::User => ("You:", Color::Blue),
            Role::Assistant => ("Assistant:", Color::Yellow),
        };
        let header_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
        let body_style = Style::default().fg(color);
        specs.push(LineSpec::new(header, header_style));
        for line in message.content.lines() {
            specs.push(LineSpec::new(format!("  {}", line), body_style));
        }
        specs.push(LineSpec::new("", body_style));
    }
    specs
}

#[derive(Debug, Clone)]
struct LineSpec {
    text: String,
    style: Style,
}

impl LineSpec {
    fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    fn rendered_height(&self, width: u16) -> usize {
        let width = width.max(1) as usize;
        let len = self.text.chars().count().max(1);
        len.div_ceil(width)
    }
}

pub struct App {
    conversation: Vec<Message>,
    input: InputBuffer,
    should_quit: bool,
    sender: mpsc::Sender<UiEvent>,
    receiver: mpsc::Receiver<UiEvent>,
    is_busy: bool,
    client: Arc<ChatClient>,
}

impl App {
    pub fn new(client: ChatClient) -> Self {
        let (sender, receiver) = mpsc::channel(100);

        Self {
            conversation: Vec::new(),
            input: InputBuffer::new(),
            should_quit: false,
            sender,
            receiver,
            is_busy: false,
            client: Arc::new(client),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let [transcript_area, input_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(INPUT_HEIGHT)])
                .areas(f.area());

        let specs = transcript_lines(&self.conversation);
        let inner_width = transcript_area.width.saturating_sub(2);
        let inner_height = transcript_area.height.saturating_sub(2) as usize;
        let total_height: usize = specs
            .iter()
            .map(|spec| spec.rendered_height(inner_width))
            .sum();
        // Keep the newest lines visible while a reply streams in.
        let scroll = total_height.saturating_sub(inner_height) as u16;

        let transcript = Paragraph::new(Text::from(
            specs
                .into_iter()
                .map(|spec| Line::from(Span::styled(spec.text, spec.style)))
                .collect::<Vec<_>>(),
        ))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Health Assistant ")
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
        f.render_widget(transcript, transcript_area);

        let title = if self.is_busy {
            " Input (Enter to send, Esc to quit) [Assistant is typing...] "
        } else {
            " Input (Enter to send, Esc to quit) "
        };
        let input_paragraph = Paragraph::new(self.input.render())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(input_paragraph, input_area);

        let cursor_x = (self.input.cursor_x + 1) as u16;
        let cursor_y = self.input.cursor_y as u16;
        let x = (input_area.x + cursor_x).min(input_area.x + input_area.width.saturating_sub(2));
        let y =
            (input_area.y + 1 + cursor_y).min(input_area.y + input_area.height.saturating_sub(2));
        f.set_cursor_position((x, y));
    }

    fn start_turn(&mut self, user_text: String) {
        self.is_busy = true;

        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        let conversation = self.conversation.clone();
        tokio::spawn(async move {
            let publish_tx = sender.clone();
            client
                .send_turn(conversation, user_text, move |snapshot| {
                    let tx = publish_tx.clone();
                    async move {
                        let _ = tx.send(UiEvent::Conversation(snapshot)).await;
                    }
                })
                .await;
            let _ = sender.send(UiEvent::TurnFinished).await;
        });
    }

    fn handle_events(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        while let Ok(ui_event) = self.receiver.try_recv() {
            match ui_event {
                UiEvent::Conversation(snapshot) => {
                    self.conversation = snapshot;
                }
                UiEvent::TurnFinished => {
                    self.is_busy = false;
                }
                UiEvent::Quit => {
                    self.should_quit = true;
                    return Ok(false);
                }
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
                {
                    self.should_quit = true;
                    let _ = self.sender.try_send(UiEvent::Quit);
                    return Ok(false);
                }

                match key.code {
                    KeyCode::Esc => {
                        self.should_quit = true;
                        let _ = self.sender.try_send(UiEvent::Quit);
                        return Ok(false);
                    }
                    KeyCode::Enter => {
                        if key.modifiers.contains(KeyModifiers::SHIFT) {
                            self.input.new_line();
                        } else if !self.is_busy && !self.input.is_empty() {
                            // One turn in flight at a time; the decode buffer
                            // belongs to it until it finishes.
                            let msg = self.input.to_string();
                            if !msg.trim().is_empty() {
                                self.input.clear();
                                self.start_turn(msg);
                            }
                        }
                    }
                    KeyCode::Char(c) => {
                        self.input.insert_char(c);
                    }
                    KeyCode::Backspace => {
                        self.input.delete_char();
                    }
                    KeyCode::Left => {
                        self.input.move_left();
                    }
                    KeyCode::Right => {
                        self.input.move_right();
                    }
                    KeyCode::Up => {
                        self.input.move_up();
                    }
                    KeyCode::Down => {
                        self.input.move_down();
                    }
                    KeyCode::Home => {
                        self.input.cursor_x = 0;
                    }
                    KeyCode::End => {
                        self.input.cursor_x =
                            self.input.lines[self.input.cursor_y].chars().count();
                    }
                    _ => {}
                }
            }
        }

        Ok(true)
    }
}

pub fn run_tui(client: ChatClient) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(client);

    let _guard = TerminalGuard::new();

    terminal.draw(|f| app.draw(f))?;

    while !app.should_quit {
        if !app.handle_events()? {
            break;
        }

        terminal.draw(|f| app.draw(f))?;
    }

    Ok(())
}
