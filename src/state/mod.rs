/// Application state
/// Wires the shell together around one host bridge:
/// - session coordinator and the route guard that watches it
/// - dialog registry with its mounted provider
/// - router, home tabs and the login screen
/// - user data accessor and its cached model
///
/// Shared by the surface through `Arc<AppState>`.
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bridge::HostBridge;
use crate::config::ShellConfig;
use crate::dialog::{DialogProvider, DialogRegistry};
use crate::login::LoginController;
use crate::router::{GuardRender, HomeShell, RouteGuard, Router, ROOT};
use crate::session::{Clock, SessionCoordinator, SystemClock};
use crate::user_data::{UserDataAccessor, UserDataModel};

pub struct AppState {
    config: ShellConfig,
    host: Arc<dyn HostBridge>,
    session: Arc<SessionCoordinator>,
    dialogs: Arc<DialogRegistry>,
    dialog_provider: Arc<DialogProvider>,
    router: Arc<Router>,
    home: HomeShell,
    login: Arc<LoginController>,
    user_data: UserDataAccessor,
    user_data_model: Arc<UserDataModel>,
    guard_render: Arc<Mutex<GuardRender>>,
    guard_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(config: ShellConfig, host: Arc<dyn HostBridge>) -> Self {
        Self::with_clock(config, host, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ShellConfig, host: Arc<dyn HostBridge>, clock: Arc<dyn Clock>) -> Self {
        let session = Arc::new(SessionCoordinator::new(
            host.clone(),
            clock,
            config.session_check_interval(),
        ));
        let dialogs = Arc::new(DialogRegistry::new());
        let dialog_provider = DialogProvider::mount(&dialogs);
        let router = Arc::new(Router::new(ROOT));
        let login = Arc::new(LoginController::new(
            host.clone(),
            session.clone(),
            dialogs.clone(),
            router.clone(),
        ));
        let user_data = UserDataAccessor::new(host.clone());

        Self {
            home: HomeShell::new(router.clone()),
            user_data_model: Arc::new(UserDataModel::new(user_data.clone())),
            user_data,
            config,
            host,
            session,
            dialogs,
            dialog_provider,
            router,
            login,
            guard_render: Arc::new(Mutex::new(GuardRender::Pending)),
            guard_task: Mutex::new(None),
        }
    }

    /// Start the coordinator and the route guard, then load the login screen.
    /// Later calls do nothing.
    pub async fn start(&self) {
        {
            let mut guard_task = self.guard_task.lock();
            if guard_task.is_some() {
                return;
            }
            let session = self.session.clone();
            let router = self.router.clone();
            let render = self.guard_render.clone();
            *guard_task = Some(tokio::spawn(async move {
                RouteGuard::new()
                    .watch(session, router, move |r| *render.lock() = r)
                    .await
            }));
        }

        self.session.start().await;
        self.login.mount().await;
        self.user_data_model.reload().await;
        info!("Shell state started");
    }

    pub fn shutdown(&self) {
        if let Some(task) = self.guard_task.lock().take() {
            task.abort();
        }
        self.session.shutdown();
        self.dialogs.clear_presenter();
        debug!("Shell state shut down");
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn HostBridge> {
        &self.host
    }

    pub fn session(&self) -> &Arc<SessionCoordinator> {
        &self.session
    }

    pub fn dialogs(&self) -> &Arc<DialogRegistry> {
        &self.dialogs
    }

    pub fn dialog_provider(&self) -> &Arc<DialogProvider> {
        &self.dialog_provider
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn home(&self) -> &HomeShell {
        &self.home
    }

    pub fn login(&self) -> &Arc<LoginController> {
        &self.login
    }

    pub fn user_data(&self) -> &UserDataAccessor {
        &self.user_data
    }

    pub fn user_data_model(&self) -> &Arc<UserDataModel> {
        &self.user_data_model
    }

    /// What a protected page shows right now
    pub fn guard_render(&self) -> GuardRender {
        *self.guard_render.lock()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.shutdown();
    }
}
