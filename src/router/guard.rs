use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{NavigateOptions, Navigator, Router, LOGIN};
use crate::session::{SessionCoordinator, SessionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRender {
    /// Neutral "checking login" placeholder
    Pending,
    /// The protected page itself
    Content,
}

/// Keeps protected pages behind a valid session.
/// Redirects to the login route (replacing history) once per transition into
/// the denied state, so re-renders never stack navigations.
#[derive(Debug, Default)]
pub struct RouteGuard {
    redirected: AtomicBool,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&self, view: SessionView, navigator: &dyn Navigator) -> GuardRender {
        if view.loading {
            return GuardRender::Pending;
        }

        if !view.is_logged_in || !view.is_valid {
            if !self.redirected.swap(true, Ordering::SeqCst) {
                info!(
                    "Session not valid (logged_in={}), redirecting to {}",
                    view.is_logged_in, LOGIN
                );
                navigator.navigate(LOGIN, NavigateOptions::replace());
            }
            return GuardRender::Pending;
        }

        self.redirected.store(false, Ordering::SeqCst);
        GuardRender::Content
    }

    /// Forget an earlier redirect, as when the guarded page unmounts
    pub fn reset(&self) {
        self.redirected.store(false, Ordering::SeqCst);
    }

    /// Evaluate whenever the session or the location changes while a
    /// protected route is showing. `render` receives each decision.
    pub async fn watch(
        &self,
        coordinator: Arc<SessionCoordinator>,
        router: Arc<Router>,
        mut render: impl FnMut(GuardRender) + Send,
    ) {
        let mut session_rx = coordinator.subscribe();
        let mut route_rx = router.subscribe();
        let mut last = None;
        loop {
            if router.current().protected {
                let view = coordinator.view();
                if last != Some(view) {
                    render(self.evaluate(view, router.as_ref()));
                    last = Some(view);
                }
            } else if last.take().is_some() {
                self.reset();
            }

            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        debug!("Session coordinator closed, guard stopping");
                        break;
                    }
                }
                changed = route_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
