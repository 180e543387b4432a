use std::sync::Arc;
use tracing::debug;

use super::{Router, ROUTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeTab {
    pub path: &'static str,
    pub icon: &'static str,
}

impl HomeTab {
    /// Last path segment, shown as the tab label
    pub fn name(&self) -> &'static str {
        self.path.rsplit('/').next().unwrap_or(self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabState {
    pub tab: HomeTab,
    pub active: bool,
}

/// Tab strip of the logged-in home page
pub struct HomeShell {
    router: Arc<Router>,
    parent: &'static str,
}

impl HomeShell {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            parent: super::HOME,
        }
    }

    /// Child routes that carry an icon, in table order
    pub fn tabs(&self) -> Vec<HomeTab> {
        ROUTES
            .iter()
            .filter(|r| r.tab_of == Some(self.parent))
            .filter_map(|r| r.icon.map(|icon| HomeTab { path: r.path, icon }))
            .collect()
    }

    pub fn tab_states(&self) -> Vec<TabState> {
        let current = self.router.current().path;
        self.tabs()
            .into_iter()
            .map(|tab| TabState {
                tab,
                active: current.starts_with(tab.path),
            })
            .collect()
    }

    pub fn active_tab(&self) -> Option<HomeTab> {
        self.tab_states()
            .into_iter()
            .find(|s| s.active)
            .map(|s| s.tab)
    }

    /// Navigate to the tab with this name; false if there is none
    pub fn select_tab(&self, name: &str) -> bool {
        match self.tabs().into_iter().find(|t| t.name() == name) {
            Some(tab) => {
                debug!("Selecting home tab {}", name);
                self.router.push(tab.path);
                true
            }
            None => false,
        }
    }
}
