/// Route table and navigation history for the shell
mod guard;
mod home;

pub use guard::{GuardRender, RouteGuard};
pub use home::{HomeShell, HomeTab, TabState};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const ROOT: &str = "/";
pub const LOGIN: &str = "/login";
pub const HOME: &str = "/home";
pub const SETTINGS: &str = "/home/settings";
pub const WINDOWS: &str = "/windows";

// Guards against redirect cycles in the table
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Settings,
    WindowsFrame,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Redirect(&'static str),
    Page(Page),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: &'static str,
    pub target: RouteTarget,
    /// Rendered behind the route guard
    pub protected: bool,
    /// Tab icon name for children of the home shell
    pub icon: Option<&'static str>,
    /// Parent shell this route is a tab of
    pub tab_of: Option<&'static str>,
}

pub static ROUTES: &[RouteEntry] = &[
    RouteEntry {
        path: ROOT,
        target: RouteTarget::Redirect(LOGIN),
        protected: false,
        icon: None,
        tab_of: None,
    },
    RouteEntry {
        path: LOGIN,
        target: RouteTarget::Page(Page::Login),
        protected: false,
        icon: None,
        tab_of: None,
    },
    RouteEntry {
        path: HOME,
        target: RouteTarget::Redirect(SETTINGS),
        protected: true,
        icon: None,
        tab_of: None,
    },
    RouteEntry {
        path: SETTINGS,
        target: RouteTarget::Page(Page::Settings),
        protected: true,
        icon: Some("settings"),
        tab_of: Some(HOME),
    },
    RouteEntry {
        path: WINDOWS,
        target: RouteTarget::Page(Page::WindowsFrame),
        protected: true,
        icon: None,
        tab_of: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub page: Page,
    pub protected: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Overwrite the current history entry instead of pushing
    pub replace: bool,
}

impl NavigateOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str, options: NavigateOptions);
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim();
    let with_root = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    let stripped = with_root.trim_end_matches('/');
    if stripped.is_empty() {
        ROOT.to_string()
    } else {
        stripped.to_string()
    }
}

pub fn find_route(path: &str) -> Option<&'static RouteEntry> {
    ROUTES.iter().find(|r| r.path == path)
}

/// Follow redirects until a page (or an unknown path) is reached
pub fn resolve(path: &str) -> Location {
    let mut current = normalize(path);
    for _ in 0..MAX_REDIRECTS {
        match find_route(&current) {
            Some(RouteEntry {
                target: RouteTarget::Redirect(to),
                ..
            }) => {
                debug!("Redirect {} -> {}", current, to);
                current = to.to_string();
            }
            Some(entry @ RouteEntry {
                target: RouteTarget::Page(page),
                ..
            }) => {
                return Location {
                    path: current,
                    page: *page,
                    protected: entry.protected,
                };
            }
            None => break,
        }
    }

    warn!("No route for {}", current);
    Location {
        path: current,
        page: Page::NotFound,
        protected: false,
    }
}

/// In-memory history stack. The top entry is the current location.
pub struct Router {
    history: Mutex<Vec<Location>>,
    current: watch::Sender<Location>,
}

impl Router {
    pub fn new(initial: &str) -> Self {
        let location = resolve(initial);
        let (current, _) = watch::channel(location.clone());
        Self {
            history: Mutex::new(vec![location]),
            current,
        }
    }

    pub fn current(&self) -> Location {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.current.subscribe()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn push(&self, path: &str) {
        self.navigate(path, NavigateOptions::default());
    }

    pub fn replace(&self, path: &str) {
        self.navigate(path, NavigateOptions::replace());
    }

    /// Pop the current entry; false when already at the first one
    pub fn back(&self) -> bool {
        let previous = {
            let mut history = self.history.lock();
            if history.len() <= 1 {
                return false;
            }
            history.pop();
            history.last().cloned()
        };
        if let Some(location) = previous {
            self.current.send_replace(location);
        }
        true
    }
}

impl Navigator for Router {
    fn navigate(&self, path: &str, options: NavigateOptions) {
        let location = resolve(path);
        {
            let mut history = self.history.lock();
            if options.replace {
                history.pop();
            }
            history.push(location.clone());
        }
        debug!(
            "Navigated to {} ({})",
            location.path,
            if options.replace { "replace" } else { "push" }
        );
        self.current.send_replace(location);
    }
}
