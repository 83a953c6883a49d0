use std::time::Duration;

use anyhow::Result;
use crossterm::{event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind}, execute, terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen}};
use ratatui::{backend::CrosstermBackend, Terminal, widgets::{Block, Borders, List, ListItem, Paragraph, ListState}, layout::{Layout, Constraint, Direction}, style::{Style, Modifier, Color}};
use tokio::sync::watch;

use item_sync::client::{ApiClient, AuthState, ClientError};
use item_sync::domain::item::Item;

const DEFAULT_URL: &str = "http://127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let base_url = std::env::var("ITEM_SYNC_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let client = ApiClient::new(base_url.clone(), AuthState::new())?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, client, base_url).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode { Login, View, Create, Edit }

#[derive(Clone, Copy, PartialEq, Eq)]
enum Filter { All, Open, Done }

#[derive(Clone, Copy, PartialEq, Eq)]
enum LoginField { Name, Email, Password }

struct App {
    client: ApiClient,
    auth_events: watch::Receiver<bool>,
    base_url: String,
    items: Vec<Item>,
    selected: usize,
    mode: Mode,
    list_state: ListState,
    filter: Filter,
    filtered_indices: Vec<usize>,
    field: LoginField,
    name: String,
    email: String,
    password: String,
    draft: String,
    status: String,
}

impl App {
    fn new(client: ApiClient, base_url: String) -> Self {
        let auth_events = client.auth().subscribe();
        App {
            client, auth_events, base_url, items: vec![], selected: 0, mode: Mode::Login, list_state: ListState::default(),
            filter: Filter::All, filtered_indices: Vec::new(), field: LoginField::Email,
            name: String::new(), email: String::new(), password: String::new(), draft: String::new(), status: String::new(),
        }
    }

    /// Keeps `Ok` values; failures land in the status line. A 401 needs no
    /// message here because the auth watcher sends the user to the login screen.
    fn report<T>(&mut self, result: Result<T, ClientError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(ClientError::Unauthenticated) => None,
            Err(ClientError::Api { message, errors, .. }) => {
                let detail: Vec<String> = errors.into_values().flatten().collect();
                self.status = if detail.len() > 1 { detail.join(" ") } else { message };
                None
            }
            Err(e) => { self.status = e.to_string(); None }
        }
    }

    async fn load(&mut self) {
        let result = self.client.list_items().await;
        if let Some(items) = self.report(result) {
            self.items = items;
            self.recompute_filtered();
        }
    }

    fn recompute_filtered(&mut self) {
        self.filtered_indices.clear();
        for (i, item) in self.items.iter().enumerate() {
            let done = item.completion.is_complete();
            let include = match self.filter { Filter::All => true, Filter::Open => !done, Filter::Done => done };
            if include { self.filtered_indices.push(i); }
        }
        let len = self.filtered_indices.len();
        if len == 0 { self.selected = 0; self.list_state.select(None); }
        else { if self.selected >= len { self.selected = len - 1; } self.list_state.select(Some(self.selected)); }
    }

    fn selected_item(&self) -> Option<&Item> {
        self.filtered_indices.get(self.selected).and_then(|&idx| self.items.get(idx))
    }

    fn field_mut(&mut self) -> &mut String {
        match self.field { LoginField::Name => &mut self.name, LoginField::Email => &mut self.email, LoginField::Password => &mut self.password }
    }

    async fn enter(&mut self, register: bool) {
        let result = if register {
            self.client.register(self.name.trim(), self.email.trim(), &self.password).await
        } else {
            self.client.login(self.email.trim(), &self.password).await
        };
        if let Some(user) = self.report(result) {
            self.password.clear();
            self.auth_events.borrow_and_update();
            self.status = format!("Signed in as {}", user.name);
            self.mode = Mode::View;
            self.load().await;
        }
    }

    /// Drops back to the login screen whenever the client reports a logout.
    fn watch_auth(&mut self) {
        if self.auth_events.has_changed().unwrap_or(false) && !*self.auth_events.borrow_and_update() && self.mode != Mode::Login {
            self.mode = Mode::Login;
            self.field = LoginField::Email;
            self.items.clear();
            self.recompute_filtered();
            self.status = "Session ended; please sign in again".to_string();
        }
    }
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, client: ApiClient, base_url: String) -> Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut app = App::new(client, base_url);
    // Resume an existing session if the cookie jar already has one.
    if app.client.current_user().await.is_ok() {
        app.auth_events.borrow_and_update();
        app.mode = Mode::View;
        app.load().await;
    }

    loop {
        app.watch_auth();
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(3)])
                .split(f.size());

            let help = match app.mode {
                Mode::Login => "Tab: next field, Enter: log in, F2: register, Esc: quit",
                _ => "Enter: toggle, n: new, e: rename, d: delete, f: filter, r: reload, L: log out, q: quit",
            };
            let header = Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("item-sync"));
            f.render_widget(header, chunks[0]);

            if app.mode == Mode::Login {
                let masked = "*".repeat(app.password.chars().count());
                let mark = |field: LoginField| if app.field == field { ">" } else { " " };
                let form = format!(
                    "{} Name (register only): {}\n\n{} Email: {}\n\n{} Password: {}",
                    mark(LoginField::Name), app.name, mark(LoginField::Email), app.email, mark(LoginField::Password), masked,
                );
                let login = Paragraph::new(form).block(Block::default().borders(Borders::ALL).title("sign in"));
                f.render_widget(login, chunks[1]);
            } else {
                let middle = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(chunks[1]);

                let list_items: Vec<ListItem> = app.filtered_indices.iter().filter_map(|&idx| app.items.get(idx)).map(|item| {
                    let mark = if item.completion.is_complete() { "[x]" } else { "[ ]" };
                    ListItem::new(format!("{} {}", mark, item.name))
                }).collect();
                if app.filtered_indices.is_empty() { app.list_state.select(None); } else { app.list_state.select(Some(app.selected)); }
                let filter = match app.filter { Filter::All => "All", Filter::Open => "Open", Filter::Done => "Done" };
                let list = List::new(list_items)
                    .block(Block::default().borders(Borders::ALL).title(format!("items [{}]", filter)))
                    .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD | Modifier::REVERSED))
                    .highlight_symbol(">> ");
                f.render_stateful_widget(list, middle[0], &mut app.list_state);

                let detail = app.selected_item().map(|item| {
                    let completed = item.completion.completed_at().map(|at| at.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_else(|| "not yet".to_string());
                    format!("Name:\n{}\n\nCreated: {}\nCompleted: {}", item.name, item.created_at.format("%Y-%m-%d %H:%M"), completed)
                }).unwrap_or_default();
                f.render_widget(Paragraph::new(detail).block(Block::default().borders(Borders::ALL).title("details")), middle[1]);
            }

            let footer_text = match app.mode {
                Mode::Create => format!("New item: {}_  (Enter to save, Esc to cancel)", app.draft),
                Mode::Edit => format!("Rename: {}_  (Enter to save, Esc to cancel)", app.draft),
                _ if !app.status.is_empty() => app.status.clone(),
                _ => format!("server {}", app.base_url),
            };
            let title = match app.mode { Mode::Login => "login", Mode::View => "info", Mode::Create => "create", Mode::Edit => "edit" };
            f.render_widget(Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL).title(title)), chunks[2]);
        })?;

        if !event::poll(tick_rate)? { continue; }
        let Event::Key(key) = event::read()? else { continue };
        // Only act on key presses; ignore repeats and releases to prevent duplicate input
        if key.kind != KeyEventKind::Press { continue; }

        match app.mode {
            Mode::Login => match key.code {
                KeyCode::Esc => break,
                KeyCode::Tab | KeyCode::Down => {
                    app.field = match app.field { LoginField::Name => LoginField::Email, LoginField::Email => LoginField::Password, LoginField::Password => LoginField::Name };
                }
                KeyCode::Up => {
                    app.field = match app.field { LoginField::Name => LoginField::Password, LoginField::Email => LoginField::Name, LoginField::Password => LoginField::Email };
                }
                KeyCode::Enter => app.enter(false).await,
                KeyCode::F(2) => app.enter(true).await,
                KeyCode::Backspace => { app.field_mut().pop(); }
                KeyCode::Char(c) => app.field_mut().push(c),
                _ => {}
            },
            Mode::View => match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Up => { if app.selected > 0 { app.selected -= 1; } }
                KeyCode::Down => { if app.selected + 1 < app.filtered_indices.len() { app.selected += 1; } }
                KeyCode::Enter => {
                    if let Some((id, done)) = app.selected_item().map(|i| (i.id, i.completion.is_complete())) {
                        let result = app.client.set_completed(id, !done).await;
                        if app.report(result).is_some() { app.load().await; }
                    }
                }
                KeyCode::Char('n') => { app.mode = Mode::Create; app.draft.clear(); }
                KeyCode::Char('e') => {
                    if let Some(name) = app.selected_item().map(|i| i.name.to_string()) {
                        app.mode = Mode::Edit;
                        app.draft = name;
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(id) = app.selected_item().map(|i| i.id) {
                        let result = app.client.delete_item(id).await;
                        if let Some(message) = app.report(result) {
                            app.status = message;
                            if app.selected > 0 { app.selected -= 1; }
                            app.load().await;
                        }
                    }
                }
                KeyCode::Char('f') => {
                    app.filter = match app.filter { Filter::All => Filter::Open, Filter::Open => Filter::Done, Filter::Done => Filter::All };
                    app.recompute_filtered();
                }
                KeyCode::Char('r') => app.load().await,
                KeyCode::Char('L') => {
                    let result = app.client.logout().await;
                    app.report(result);
                }
                _ => {}
            },
            Mode::Create | Mode::Edit => match key.code {
                KeyCode::Esc => { app.mode = Mode::View; app.draft.clear(); }
                KeyCode::Enter => {
                    let name = app.draft.trim().to_string();
                    let result = if app.mode == Mode::Create {
                        app.client.create_item(&name).await
                    } else {
                        match app.selected_item().map(|i| i.id) {
                            Some(id) => app.client.rename_item(id, &name).await,
                            None => { app.mode = Mode::View; continue; }
                        }
                    };
                    if app.report(result).is_some() {
                        app.mode = Mode::View;
                        app.draft.clear();
                        app.load().await;
                    }
                }
                KeyCode::Backspace => { app.draft.pop(); }
                KeyCode::Char(c) => app.draft.push(c),
                _ => {}
            },
        }
    }
    Ok(())
}
