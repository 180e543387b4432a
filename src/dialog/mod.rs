/// Global dialog utility
/// `DialogRegistry` is shared (usually through `AppState`) by everything that
/// needs to prompt the user. It forwards each request to whichever presenter
/// mounted last; with no presenter mounted the request is dropped with a
/// diagnostic and resolves as `Unpresented`.
///
/// Every show-call returns a `DialogRequest` future. Awaiting it is optional.
mod config;
mod provider;

pub use config::{
    confirm_handler, CancelHandler, ConfirmHandler, DialogConfig, DialogVariant, BUSY_LABEL,
    CANCEL_LABEL, CONFIRM_LABEL, DELETE_LABEL, OK_LABEL,
};
pub use provider::{DialogPhase, DialogProvider, DialogView};

use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::error;

/// How a presented dialog ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    Confirmed,
    /// Cancel button or outside dismiss
    Cancelled,
    /// Another dialog replaced this one before the user answered
    Superseded,
    /// No presenter was mounted
    Unpresented,
}

impl DialogOutcome {
    pub fn is_confirmed(self) -> bool {
        self == DialogOutcome::Confirmed
    }
}

/// A dialog handed to a presenter together with its reply channel
pub struct PendingDialog {
    pub config: DialogConfig,
    reply: oneshot::Sender<DialogOutcome>,
}

impl PendingDialog {
    pub fn new(config: DialogConfig) -> (Self, DialogRequest) {
        let (reply, rx) = oneshot::channel();
        (
            Self { config, reply },
            DialogRequest { rx: Some(rx) },
        )
    }

    pub fn into_parts(self) -> (DialogConfig, oneshot::Sender<DialogOutcome>) {
        (self.config, self.reply)
    }
}

/// Resolves once the dialog is answered, replaced, or could not be shown
#[must_use = "drop the request if the answer is not needed"]
pub struct DialogRequest {
    rx: Option<oneshot::Receiver<DialogOutcome>>,
}

impl DialogRequest {
    fn unpresented() -> Self {
        Self { rx: None }
    }
}

impl Future for DialogRequest {
    type Output = DialogOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            None => Poll::Ready(DialogOutcome::Unpresented),
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|r| r.unwrap_or(DialogOutcome::Superseded)),
        }
    }
}

/// Renders dialogs. Exactly one is active per registry.
pub trait Presenter: Send + Sync {
    fn present(&self, dialog: PendingDialog);
}

/// Single-writer slot for the active presenter; the last `set_presenter` wins
#[derive(Default)]
pub struct DialogRegistry {
    presenter: RwLock<Option<Arc<dyn Presenter>>>,
}

impl DialogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_presenter(&self, presenter: Arc<dyn Presenter>) {
        *self.presenter.write() = Some(presenter);
    }

    pub fn clear_presenter(&self) {
        self.presenter.write().take();
    }

    pub fn has_presenter(&self) -> bool {
        self.presenter.read().is_some()
    }

    pub fn show_dialog(&self, config: DialogConfig) -> DialogRequest {
        let presenter = self.presenter.read().clone();
        match presenter {
            Some(presenter) => {
                let (pending, request) = PendingDialog::new(config);
                presenter.present(pending);
                request
            }
            None => {
                error!(
                    "DialogRegistry: no presenter mounted, dropping dialog {:?}",
                    config.title
                );
                DialogRequest::unpresented()
            }
        }
    }

    /// Single acknowledgement button
    pub fn show_alert(&self, title: &str, description: Option<&str>) -> DialogRequest {
        self.show_dialog(
            DialogConfig::new(title)
                .description(description)
                .confirm_text(OK_LABEL),
        )
    }

    pub fn show_confirm(
        &self,
        title: &str,
        description: Option<&str>,
        on_confirm: Option<ConfirmHandler>,
    ) -> DialogRequest {
        self.show_dialog(
            DialogConfig::new(title)
                .description(description)
                .confirm_text(CONFIRM_LABEL)
                .cancel_text(CANCEL_LABEL)
                .on_confirm_boxed(on_confirm),
        )
    }

    /// Same flow as `show_confirm`, styled as destructive
    pub fn show_destructive(
        &self,
        title: &str,
        description: Option<&str>,
        on_confirm: Option<ConfirmHandler>,
    ) -> DialogRequest {
        self.show_dialog(
            DialogConfig::new(title)
                .description(description)
                .confirm_text(DELETE_LABEL)
                .cancel_text(CANCEL_LABEL)
                .variant(DialogVariant::Destructive)
                .on_confirm_boxed(on_confirm),
        )
    }

    /// True only if the user confirmed
    pub async fn confirm(&self, title: &str, description: Option<&str>) -> bool {
        self.show_confirm(title, description, None).await.is_confirmed()
    }

    /// Returns as soon as the alert is handed to the presenter
    pub fn alert(&self, title: &str, description: Option<&str>) {
        let _ = self.show_alert(title, description);
    }

    /// True on confirm, false on cancel, dismiss or replacement
    pub async fn confirm_delete(&self, title: &str, description: Option<&str>) -> bool {
        self.show_destructive(title, description, None)
            .await
            .is_confirmed()
    }

    pub fn success(&self, title: &str, description: Option<&str>) {
        self.alert_with(title, description, "Great");
    }

    pub fn error(&self, title: &str, description: Option<&str>) {
        let title = if title.is_empty() { "Error" } else { title };
        self.alert_with(title, description, "Got it");
    }

    pub fn warning(&self, title: &str, description: Option<&str>) {
        self.alert_with(title, description, "Understood");
    }

    fn alert_with(&self, title: &str, description: Option<&str>, confirm_text: &str) {
        let _ = self.show_dialog(
            DialogConfig::new(title)
                .description(description)
                .confirm_text(confirm_text),
        );
    }
}
