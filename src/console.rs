/// Terminal surface
/// Draws the current route and the active dialog as text and feeds stdin
/// lines back into the shell. Lines starting with ':' are commands; anything
/// else answers the open dialog or goes into the login input.
use std::fmt::Write as _;
use std::sync::Arc;
use std::io::ErrorKind;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app::{APP_NAME, APP_VERSION};
use crate::dialog::{confirm_handler, DialogView};
use crate::router::{GuardRender, NavigateOptions, Navigator, Page};
use crate::state::AppState;
use crate::user_data::{DataValue, SECRET_KEY};
use crate::window::{ChromeAction, WindowChrome, WindowControls};

const HELP: &str = "\
commands:
  :go <path>        navigate (/login, /home, /home/settings, /windows)
  :back             previous page
  :tab <name>       select a home tab
  :set <key> <val>  write a user data field
  :unset <key>      delete a user data field
  :forget-key       delete the saved card key
  :logout           end the session
  :minimize :close :drag
answer an open dialog with y / n";

/// Window controls for a terminal: close ends the input loop
pub struct TerminalWindow {
    closed: watch::Sender<bool>,
}

impl TerminalWindow {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self { closed }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl Default for TerminalWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowControls for TerminalWindow {
    fn minimize(&self) -> anyhow::Result<()> {
        info!("Minimize has no effect in a terminal");
        Ok(())
    }

    fn close(&self) -> anyhow::Result<()> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn start_drag(&self) -> anyhow::Result<()> {
        debug!("Drag ignored in a terminal");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chrome(ChromeAction),
    Go(String),
    Back,
    Tab(String),
    Set(String, DataValue),
    Unset(String),
    ForgetKey,
    Logout,
    Help,
    Unknown(String),
    /// Plain text: dialog answer or login input
    Text(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix(':') else {
            return Command::Text(line.to_string());
        };

        let mut parts = command.splitn(3, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let first = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match (name, first, rest) {
            ("go", Some(path), None) => Command::Go(path.to_string()),
            ("back", None, None) => Command::Back,
            ("tab", Some(tab), None) => Command::Tab(tab.to_string()),
            ("set", Some(key), Some(value)) => Command::Set(key.to_string(), parse_value(value)),
            ("unset", Some(key), None) => Command::Unset(key.to_string()),
            ("forget-key", None, None) => Command::ForgetKey,
            ("logout", None, None) => Command::Logout,
            ("help", None, None) => Command::Help,
            (action, None, None) => match ChromeAction::parse(action) {
                Some(action) => Command::Chrome(action),
                None => Command::Unknown(line.to_string()),
            },
            _ => Command::Unknown(line.to_string()),
        }
    }
}

fn parse_value(raw: &str) -> DataValue {
    if let Ok(i) = raw.parse::<i64>() {
        return DataValue::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return DataValue::Float(f);
    }
    match raw {
        "true" => DataValue::Bool(true),
        "false" => DataValue::Bool(false),
        "null" | "~" => DataValue::Null,
        _ => DataValue::Text(raw.to_string()),
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn render_dialog(out: &mut String, view: &DialogView) {
    let _ = writeln!(out, "+--------------------------------------");
    let marker = if view.destructive { "!" } else { " " };
    let _ = writeln!(out, "|{} {}", marker, view.title);
    if let Some(description) = &view.description {
        let _ = writeln!(out, "|  {}", description);
    }
    let mut buttons = Vec::new();
    if let Some(confirm) = &view.confirm_label {
        buttons.push(format!("[y] {}", confirm));
    }
    if let Some(cancel) = &view.cancel_label {
        if !view.busy {
            buttons.push(format!("[n] {}", cancel));
        }
    }
    let _ = writeln!(out, "|  {}", buttons.join("   "));
    let _ = writeln!(out, "+--------------------------------------");
}

/// One full frame of the surface
pub fn render(state: &AppState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} {} ==  [_] [x]", APP_NAME, APP_VERSION);

    let location = state.router().current();
    if location.protected && state.guard_render() == GuardRender::Pending {
        let _ = writeln!(out, "Checking login status...");
    } else {
        match location.page {
            Page::Login => {
                let form = state.login().form();
                let _ = writeln!(out, "[ Card key ]");
                let _ = writeln!(out, "> {}", form.card_key);
                let _ = writeln!(out, "({})", form.submit_label());
            }
            Page::Settings => {
                let tabs: Vec<String> = state
                    .home()
                    .tab_states()
                    .into_iter()
                    .map(|s| {
                        if s.active {
                            format!("[*{}]", s.tab.name())
                        } else {
                            format!("[{}]", s.tab.name())
                        }
                    })
                    .collect();
                let _ = writeln!(out, "{}", tabs.join(" "));
                if let Some(expiration) = state
                    .session()
                    .user_info()
                    .and_then(|info| info.expiration_timestamp)
                {
                    let _ = writeln!(out, "Session valid until {}", format_timestamp(expiration));
                }
                let snapshot = state.user_data_model().snapshot();
                for (key, value) in snapshot.data.iter() {
                    if key == SECRET_KEY {
                        let _ = writeln!(out, "  {}: ********", key);
                    } else {
                        let _ = writeln!(out, "  {}: {}", key, value);
                    }
                }
                if let Some(error) = snapshot.error {
                    let _ = writeln!(out, "  (user data error: {})", error);
                }
            }
            Page::WindowsFrame => {
                let _ = writeln!(out, "[ windows ]");
            }
            Page::NotFound => {
                let _ = writeln!(out, "No page at {}", location.path);
            }
        }
    }

    if let Some(view) = state.dialog_provider().view() {
        render_dialog(&mut out, &view);
    }
    out
}

/// Next stdin line. Lines that are not UTF-8 are skipped; `None` once input
/// ends or can no longer be read.
async fn next_input<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    loop {
        match lines.next_line().await {
            Ok(line) => return line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("Skipping unreadable input line: {}", e);
            }
            Err(e) => {
                error!("Failed to read input: {}", e);
                return None;
            }
        }
    }
}

pub struct Console {
    state: Arc<AppState>,
    window: Arc<TerminalWindow>,
    chrome: WindowChrome,
}

impl Console {
    pub fn new(state: Arc<AppState>) -> Self {
        let window = Arc::new(TerminalWindow::new());
        Self {
            chrome: WindowChrome::new(window.clone()),
            window,
            state,
        }
    }

    /// Draw and read input until the window closes, stdin ends, or Ctrl-C
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut closed = self.window.subscribe();
        let mut route_rx = self.state.router().subscribe();
        let mut dialog_rx = self.state.dialog_provider().subscribe();
        let mut session_rx = self.state.session().subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        self.draw();
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received");
                    break;
                }
                _ = closed.changed() => break,
                line = next_input(&mut lines) => {
                    match line {
                        Some(line) => self.handle(Command::parse(&line)).await,
                        None => break,
                    }
                }
                _ = route_rx.changed() => {}
                _ = dialog_rx.changed() => {}
                _ = session_rx.changed() => {}
            }
            if *closed.borrow() {
                break;
            }
            self.draw();
        }

        info!("Surface closed");
        Ok(())
    }

    fn draw(&self) {
        println!("{}", render(&self.state));
    }

    pub async fn handle(&self, command: Command) {
        let state = &self.state;
        match command {
            Command::Text(text) => {
                if state.dialog_provider().view().is_some() {
                    match text.as_str() {
                        "y" | "yes" => state.dialog_provider().confirm().await,
                        "n" | "no" | "esc" => state.dialog_provider().dismiss(),
                        _ => println!("Answer the dialog with y or n"),
                    }
                } else if state.router().current().page == Page::Login {
                    if !text.is_empty() {
                        state.login().set_input(&text);
                    }
                    let outcome = state.login().submit().await;
                    debug!("Login submit: {:?}", outcome);
                } else if !text.is_empty() {
                    println!("Type :help for commands");
                }
            }
            Command::Chrome(action) => {
                if let Err(e) = self.chrome.handle(action) {
                    warn!("Window action {:?} failed: {:#}", action, e);
                }
            }
            Command::Go(path) => state.router().navigate(&path, NavigateOptions::default()),
            Command::Back => {
                state.router().back();
            }
            Command::Tab(name) => {
                if !state.home().select_tab(&name) {
                    state.dialogs().warning("Unknown tab", Some(&name));
                }
            }
            Command::Set(key, value) => {
                if let Err(e) = state.user_data_model().update_field(&key, value).await {
                    state.dialogs().error("Could not save", Some(&e.to_string()));
                }
            }
            Command::Unset(key) => {
                if let Err(e) = state.user_data_model().remove_field(&key).await {
                    state.dialogs().error("Could not delete", Some(&e.to_string()));
                }
            }
            Command::ForgetKey => self.forget_key(),
            Command::Logout => self.logout(),
            Command::Help => println!("{}", HELP),
            Command::Unknown(line) => println!("Unknown command {}, try :help", line),
        }
    }

    /// Asks first; the answer arrives through later input lines
    fn forget_key(&self) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let confirmed = state
                .dialogs()
                .confirm_delete("Forget saved card key?", Some("You will need to enter it again"))
                .await;
            if !confirmed {
                return;
            }
            match state.user_data().clear_secret_key().await {
                Ok(()) => {
                    state.user_data_model().reload().await;
                    state.dialogs().success("Card key removed", None);
                }
                Err(e) => {
                    error!("Failed to clear card key: {}", e);
                    state.dialogs().error("", Some(&e.to_string()));
                }
            }
        });
    }

    fn logout(&self) {
        let session = self.state.session().clone();
        let _ = self.state.dialogs().show_confirm(
            "Log out?",
            Some("The saved card key is kept"),
            Some(confirm_handler(move || async move {
                session.logout().await?;
                Ok::<_, anyhow::Error>(())
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::router::{LOGIN, SETTINGS};
    use crate::testing::{ManualClock, MockHost, T0};

    fn console() -> (Arc<MockHost>, Console) {
        let clock = Arc::new(ManualClock::new(T0));
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let state = Arc::new(AppState::with_clock(ShellConfig::default(), host.clone(), clock));
        (host, Console::new(state))
    }

    async fn logged_in() -> (Arc<MockHost>, Console) {
        let (host, console) = console();
        host.accept_key("CARD-1", 3600);
        console.state.start().await;
        console.handle(Command::Text("CARD-1".to_string())).await;
        while console.state.guard_render() != GuardRender::Content {
            tokio::task::yield_now().await;
        }
        (host, console)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(":go /windows"), Command::Go("/windows".to_string()));
        assert_eq!(Command::parse(" :back "), Command::Back);
        assert_eq!(
            Command::parse(":set volume 0.5"),
            Command::Set("volume".to_string(), DataValue::Float(0.5))
        );
        assert_eq!(
            Command::parse(":set nickname some body"),
            Command::Set("nickname".to_string(), DataValue::Text("some body".to_string()))
        );
        assert_eq!(Command::parse(":close"), Command::Chrome(ChromeAction::Close));
        assert_eq!(Command::parse(":go"), Command::Unknown(":go".to_string()));
        assert_eq!(Command::parse("CARD-1"), Command::Text("CARD-1".to_string()));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), DataValue::Integer(42));
        assert_eq!(parse_value("true"), DataValue::Bool(true));
        assert_eq!(parse_value("~"), DataValue::Null);
        assert_eq!(parse_value("abc"), DataValue::Text("abc".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut lines = BufReader::new(&b"\xff\xfe\nCARD-1\n"[..]).lines();
        assert_eq!(next_input(&mut lines).await.as_deref(), Some("CARD-1"));
        assert_eq!(next_input(&mut lines).await, None);
    }

    #[tokio::test]
    async fn test_login_screen_and_blank_submit() {
        let (host, console) = console();
        console.state.start().await;

        let frame = render(&console.state);
        assert!(frame.contains("[ Card key ]"));
        assert!(frame.contains("(Log in)"));

        console.handle(Command::Text(String::new())).await;
        assert_eq!(host.calls("login"), 0);
        let frame = render(&console.state);
        assert!(frame.contains("Invalid input"));
        assert!(frame.contains("[y] Understood"));

        console.handle(Command::Text("y".to_string())).await;
        assert!(console.state.dialog_provider().view().is_none());
    }

    #[tokio::test]
    async fn test_settings_frame_masks_key() {
        let (_host, console) = logged_in().await;

        let frame = render(&console.state);
        assert!(frame.contains("[*settings]"));
        assert!(frame.contains("Session valid until 2023-11-14T23:13:20+00:00"));

        console.state.user_data_model().reload().await;
        let frame = render(&console.state);
        assert!(frame.contains("secret_key: ********"));
        assert!(!frame.contains("CARD-1"));
    }

    #[tokio::test]
    async fn test_logout_runs_through_confirm_dialog() {
        let (host, console) = logged_in().await;

        console.handle(Command::Logout).await;
        assert!(render(&console.state).contains("Log out?"));
        console.handle(Command::Text("y".to_string())).await;

        assert_eq!(host.calls("logout"), 1);
        while console.state.router().current().page != Page::Login {
            tokio::task::yield_now().await;
        }
        assert_eq!(console.state.router().current().path, LOGIN);
    }

    #[tokio::test]
    async fn test_forget_key_cancel_keeps_key() {
        let (host, console) = logged_in().await;

        console.handle(Command::ForgetKey).await;
        while console.state.dialog_provider().view().is_none() {
            tokio::task::yield_now().await;
        }
        let view = console.state.dialog_provider().view().unwrap();
        assert!(view.destructive);
        assert_eq!(view.confirm_label.as_deref(), Some("Delete"));

        console.handle(Command::Text("n".to_string())).await;
        tokio::task::yield_now().await;
        assert!(host.stored_data().contains_key(SECRET_KEY));
    }

    #[tokio::test]
    async fn test_set_field_and_navigation() {
        let (host, console) = logged_in().await;

        console.handle(Command::parse(":set volume 3")).await;
        assert_eq!(host.stored_data().get("volume"), Some(&DataValue::Integer(3)));

        console.handle(Command::parse(":go /nowhere")).await;
        assert!(render(&console.state).contains("No page at /nowhere"));
        console.handle(Command::Back).await;
        assert_eq!(console.state.router().current().path, SETTINGS);
    }

    #[tokio::test]
    async fn test_close_marks_window_closed() {
        let (_host, console) = console();
        let closed = console.window.subscribe();
        console.handle(Command::Chrome(ChromeAction::Close)).await;
        assert!(*closed.borrow());
    }
}
