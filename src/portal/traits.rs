use crate::portal::types::Locator;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// One live browser session against the portal.
///
/// Calls block; the orchestrator runs the whole session on a blocking
/// thread. Dropping the session must close the browser and remove its
/// profile directory.
pub trait PortalSession: Send {
    /// Load `url` and wait for navigation to finish
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether the element shows up within a short wait
    fn is_present(&self, locator: &Locator) -> bool;

    fn click(&self, locator: &Locator) -> Result<()>;

    /// Replace the element's value with `text`
    fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Attach local files to a file input
    fn upload(&self, locator: &Locator, files: &[PathBuf]) -> Result<()>;

    fn is_checked(&self, locator: &Locator) -> Result<bool>;

    /// Current page markup
    fn page_html(&self) -> Result<String>;

    /// Profile directory owned by this session
    fn profile_dir(&self) -> &Path;
}

/// Opens a fresh, isolated session for each publication attempt
pub trait SessionLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn PortalSession>>;
}
