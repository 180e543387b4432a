/// Custom title bar actions for the frameless window
use std::sync::Arc;
use tracing::info;

pub trait WindowControls: Send + Sync {
    fn minimize(&self) -> anyhow::Result<()>;
    fn close(&self) -> anyhow::Result<()>;
    /// Begin an OS-level move of the window from the drag region
    fn start_drag(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeAction {
    Minimize,
    Close,
    Drag,
}

impl ChromeAction {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "minimize" | "min" => Some(ChromeAction::Minimize),
            "close" | "quit" | "exit" => Some(ChromeAction::Close),
            "drag" => Some(ChromeAction::Drag),
            _ => None,
        }
    }
}

pub struct WindowChrome {
    controls: Arc<dyn WindowControls>,
}

impl WindowChrome {
    pub fn new(controls: Arc<dyn WindowControls>) -> Self {
        Self { controls }
    }

    pub fn handle(&self, action: ChromeAction) -> anyhow::Result<()> {
        match action {
            ChromeAction::Minimize => self.minimize(),
            ChromeAction::Close => self.close(),
            ChromeAction::Drag => self.controls.start_drag(),
        }
    }

    pub fn minimize(&self) -> anyhow::Result<()> {
        self.controls.minimize()
    }

    pub fn close(&self) -> anyhow::Result<()> {
        info!("Close window requested");
        self.controls.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingControls {
        actions: Mutex<Vec<&'static str>>,
    }

    impl WindowControls for RecordingControls {
        fn minimize(&self) -> anyhow::Result<()> {
            self.actions.lock().push("minimize");
            Ok(())
        }

        fn close(&self) -> anyhow::Result<()> {
            self.actions.lock().push("close");
            Ok(())
        }

        fn start_drag(&self) -> anyhow::Result<()> {
            anyhow::bail!("drag not supported")
        }
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(ChromeAction::parse(" min "), Some(ChromeAction::Minimize));
        assert_eq!(ChromeAction::parse("exit"), Some(ChromeAction::Close));
        assert_eq!(ChromeAction::parse("drag"), Some(ChromeAction::Drag));
        assert_eq!(ChromeAction::parse("maximize"), None);
    }

    #[test]
    fn test_actions_reach_controls() {
        let controls = Arc::new(RecordingControls::default());
        let chrome = WindowChrome::new(controls.clone());

        chrome.handle(ChromeAction::Minimize).unwrap();
        chrome.handle(ChromeAction::Close).unwrap();
        assert!(chrome.handle(ChromeAction::Drag).is_err());

        assert_eq!(*controls.actions.lock(), vec!["minimize", "close"]);
    }
}
