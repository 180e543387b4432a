use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;

pub const CONFIRM_LABEL: &str = "Confirm";
pub const CANCEL_LABEL: &str = "Cancel";
pub const OK_LABEL: &str = "OK";
pub const DELETE_LABEL: &str = "Delete";
pub const BUSY_LABEL: &str = "Processing...";

/// Runs once when the user confirms; the dialog stays busy until it resolves
pub type ConfirmHandler = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs once, synchronously, when the user cancels or dismisses
pub type CancelHandler = Box<dyn FnOnce() + Send>;

/// Styling hint only; both variants behave the same
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogVariant {
    #[default]
    Default,
    Destructive,
}

/// One dialog presentation. Button labels that are `None` are not rendered.
pub struct DialogConfig {
    pub title: String,
    pub description: Option<String>,
    pub confirm_text: Option<String>,
    pub cancel_text: Option<String>,
    pub variant: DialogVariant,
    pub on_confirm: Option<ConfirmHandler>,
    pub on_cancel: Option<CancelHandler>,
}

impl DialogConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            confirm_text: None,
            cancel_text: None,
            variant: DialogVariant::Default,
            on_confirm: None,
            on_cancel: None,
        }
    }

    pub fn description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }

    pub fn confirm_text(mut self, text: impl Into<String>) -> Self {
        self.confirm_text = Some(text.into());
        self
    }

    pub fn cancel_text(mut self, text: impl Into<String>) -> Self {
        self.cancel_text = Some(text.into());
        self
    }

    pub fn variant(mut self, variant: DialogVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn on_confirm<F, Fut>(mut self, handler: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_confirm = Some(confirm_handler(handler));
        self
    }

    pub fn on_confirm_boxed(mut self, handler: Option<ConfirmHandler>) -> Self {
        self.on_confirm = handler;
        self
    }

    pub fn on_cancel<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_cancel = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for DialogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogConfig")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("confirm_text", &self.confirm_text)
            .field("cancel_text", &self.cancel_text)
            .field("variant", &self.variant)
            .field("on_confirm", &self.on_confirm.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Box an async closure into a `ConfirmHandler`
pub fn confirm_handler<F, Fut>(handler: F) -> ConfirmHandler
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || handler().boxed())
}
