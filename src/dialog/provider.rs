use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error};

use super::config::{CancelHandler, ConfirmHandler, DialogVariant, BUSY_LABEL};
use super::{DialogOutcome, DialogRegistry, PendingDialog, Presenter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPhase {
    Closed,
    Open,
    /// `on_confirm` is running; buttons are disabled
    Busy,
}

/// What the surface draws for the active dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub confirm_label: Option<String>,
    pub cancel_label: Option<String>,
    pub destructive: bool,
    pub busy: bool,
}

struct ActiveDialog {
    id: u64,
    title: String,
    description: Option<String>,
    confirm_text: Option<String>,
    cancel_text: Option<String>,
    variant: DialogVariant,
    on_confirm: Option<ConfirmHandler>,
    on_cancel: Option<CancelHandler>,
    reply: Option<oneshot::Sender<DialogOutcome>>,
}

struct ProviderState {
    phase: DialogPhase,
    active: Option<ActiveDialog>,
    next_id: u64,
}

/// Owns the transient dialog state: which dialog is up, and whether its
/// confirm handler is still running. One dialog at a time; a new one
/// replaces whatever is showing.
pub struct DialogProvider {
    state: Mutex<ProviderState>,
    view: watch::Sender<Option<DialogView>>,
}

impl Default for DialogProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogProvider {
    pub fn new() -> Self {
        let (view, _) = watch::channel(None);
        Self {
            state: Mutex::new(ProviderState {
                phase: DialogPhase::Closed,
                active: None,
                next_id: 1,
            }),
            view,
        }
    }

    /// Create a provider and register it as the registry's presenter
    pub fn mount(registry: &DialogRegistry) -> Arc<Self> {
        let provider = Arc::new(Self::new());
        registry.set_presenter(provider.clone());
        debug!("Dialog provider mounted");
        provider
    }

    pub fn phase(&self) -> DialogPhase {
        self.state.lock().phase
    }

    pub fn view(&self) -> Option<DialogView> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DialogView>> {
        self.view.subscribe()
    }

    /// Confirm button. Waits for `on_confirm`; its failure is logged, not returned.
    pub async fn confirm(&self) {
        let (id, handler, reply) = {
            let mut state = self.state.lock();
            if state.phase != DialogPhase::Open {
                debug!("Ignoring confirm while dialog is {:?}", state.phase);
                return;
            }
            let Some(active) = state.active.as_mut() else {
                return;
            };
            let id = active.id;
            let handler = active.on_confirm.take();
            let reply = active.reply.take();
            if handler.is_some() {
                state.phase = DialogPhase::Busy;
            }
            (id, handler, reply)
        };

        if let Some(handler) = handler {
            self.publish();
            if let Err(e) = handler().await {
                error!("Dialog confirm error: {:#}", e);
            }
        }

        self.close_if_current(id);
        if let Some(reply) = reply {
            let _ = reply.send(DialogOutcome::Confirmed);
        }
    }

    /// Cancel button. Ignored while busy.
    pub fn cancel(&self) {
        let active = {
            let mut state = self.state.lock();
            if state.phase != DialogPhase::Open {
                debug!("Ignoring cancel while dialog is {:?}", state.phase);
                return;
            }
            state.phase = DialogPhase::Closed;
            state.active.take()
        };
        self.publish();

        if let Some(mut active) = active {
            if let Some(on_cancel) = active.on_cancel.take() {
                on_cancel();
            }
            if let Some(reply) = active.reply.take() {
                let _ = reply.send(DialogOutcome::Cancelled);
            }
        }
    }

    /// Escape key or click outside the dialog
    pub fn dismiss(&self) {
        self.cancel();
    }

    fn close_if_current(&self, id: u64) {
        {
            let mut state = self.state.lock();
            match state.active.as_ref() {
                Some(active) if active.id == id => {
                    state.active = None;
                    state.phase = DialogPhase::Closed;
                }
                _ => {
                    debug!("Dialog {} was replaced before its confirm finished", id);
                    return;
                }
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let view = {
            let state = self.state.lock();
            state.active.as_ref().map(|active| {
                let busy = state.phase == DialogPhase::Busy;
                DialogView {
                    id: active.id,
                    title: active.title.clone(),
                    description: active.description.clone(),
                    confirm_label: active.confirm_text.as_ref().map(|text| {
                        if busy {
                            BUSY_LABEL.to_string()
                        } else {
                            text.clone()
                        }
                    }),
                    cancel_label: active.cancel_text.clone(),
                    destructive: active.variant == DialogVariant::Destructive,
                    busy,
                }
            })
        };
        self.view.send_replace(view);
    }
}

impl Presenter for DialogProvider {
    fn present(&self, dialog: PendingDialog) {
        let (config, reply) = dialog.into_parts();
        let replaced = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            let replaced = state.active.replace(ActiveDialog {
                id,
                title: config.title,
                description: config.description,
                confirm_text: config.confirm_text,
                cancel_text: config.cancel_text,
                variant: config.variant,
                on_confirm: config.on_confirm,
                on_cancel: config.on_cancel,
                reply: Some(reply),
            });
            state.phase = DialogPhase::Open;
            replaced
        };
        self.publish();

        if let Some(mut replaced) = replaced {
            debug!("Dialog {:?} replaced by a newer one", replaced.title);
            if let Some(reply) = replaced.reply.take() {
                let _ = reply.send(DialogOutcome::Superseded);
            }
        }
    }
}
