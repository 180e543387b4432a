/// Login screen controller
/// Holds the card-key input, validates it, and walks a successful login
/// through persistence, the host monitor and the coordinator refresh before
/// leaving for the home shell.
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bridge::HostBridge;
use crate::dialog::DialogRegistry;
use crate::error::{HostError, HostResult};
use crate::router::{NavigateOptions, Navigator, HOME};
use crate::session::SessionCoordinator;
use crate::user_data::UserDataAccessor;

pub const SUBMIT_LABEL: &str = "Log in";
pub const SUBMITTING_LABEL: &str = "Logging in...";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub card_key: String,
    /// Input and submit button are disabled while set
    pub busy: bool,
}

impl LoginForm {
    pub fn submit_label(&self) -> &'static str {
        if self.busy {
            SUBMITTING_LABEL
        } else {
            SUBMIT_LABEL
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    LoggedIn { expiration: i64 },
    /// Blank input, nothing was sent to the host
    Blank,
    /// A submission is already running
    Ignored,
    Failed(String),
}

pub struct LoginController {
    host: Arc<dyn HostBridge>,
    coordinator: Arc<SessionCoordinator>,
    user_data: UserDataAccessor,
    dialogs: Arc<DialogRegistry>,
    navigator: Arc<dyn Navigator>,
    form: Mutex<LoginForm>,
}

impl LoginController {
    pub fn new(
        host: Arc<dyn HostBridge>,
        coordinator: Arc<SessionCoordinator>,
        dialogs: Arc<DialogRegistry>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            user_data: UserDataAccessor::new(host.clone()),
            host,
            coordinator,
            dialogs,
            navigator,
            form: Mutex::new(LoginForm::default()),
        }
    }

    pub fn form(&self) -> LoginForm {
        self.form.lock().clone()
    }

    pub fn set_input(&self, card_key: &str) {
        let mut form = self.form.lock();
        if !form.busy {
            form.card_key = card_key.to_string();
        }
    }

    /// Prefill the input with the last saved key. Expiration is not checked here.
    pub async fn mount(&self) {
        match self.user_data.secret_key().await {
            Ok(key) if !key.is_empty() => {
                let mut form = self.form.lock();
                if form.card_key.is_empty() {
                    form.card_key = key;
                }
            }
            Ok(_) => {}
            Err(e) => error!("Failed to load saved card key: {}", e),
        }
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let card_key = {
            let mut form = self.form.lock();
            if form.busy {
                return SubmitOutcome::Ignored;
            }
            if form.card_key.trim().is_empty() {
                drop(form);
                self.dialogs
                    .warning("Invalid input", Some("Enter your card key before logging in"));
                return SubmitOutcome::Blank;
            }
            form.busy = true;
            form.card_key.clone()
        };

        let result = self.login(&card_key).await;

        let mut form = self.form.lock();
        form.busy = false;
        match result {
            Ok(expiration) => SubmitOutcome::LoggedIn { expiration },
            Err(e) => {
                form.card_key.clear();
                drop(form);
                let message = e.to_string();
                warn!("Card key verification failed: {}", message);
                self.dialogs
                    .error("Card key verification failed", Some(&message));
                SubmitOutcome::Failed(message)
            }
        }
    }

    async fn login(&self, card_key: &str) -> HostResult<i64> {
        let (accepted, expiration) = self.host.login(card_key).await?;
        if !accepted {
            return Err(HostError::rejected("card key was not accepted"));
        }

        self.user_data.save_secret_key(card_key).await?;
        self.user_data.save_expiration_time(expiration).await?;
        self.host.start_session_monitor(card_key).await?;

        self.coordinator.fetch_status().await;
        info!("Logged in, session valid until {}", expiration);
        self.navigator.navigate(HOME, NavigateOptions::default());
        Ok(expiration)
    }
}
