use crate::portal::traits::{PortalSession, SessionLauncher};
use crate::portal::types::Locator;
use anyhow::{Context, Result};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// How long `is_present` waits before deciding an element is absent
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Launches headless Chrome with a throwaway profile per attempt
pub struct ChromeLauncher {
    headless: bool,
    profile_root: PathBuf,
    element_timeout: Duration,
    idle_timeout: Duration,
}

impl ChromeLauncher {
    /// `idle_timeout` must outlast the human verification wait, during
    /// which the browser sends no events.
    pub fn new(headless: bool, profile_root: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        Self {
            headless,
            profile_root: profile_root.into(),
            element_timeout: Duration::from_secs(15),
            idle_timeout,
        }
    }
}

impl SessionLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn PortalSession>> {
        std::fs::create_dir_all(&self.profile_root)
            .with_context(|| format!("Failed to create {}", self.profile_root.display()))?;
        let profile = tempfile::Builder::new()
            .prefix("portal-profile-")
            .tempdir_in(&self.profile_root)
            .context("Failed to create browser profile directory")?;

        info!(profile = %profile.path().display(), headless = self.headless, "Launching Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .window_size(Some((1366, 900)))
            .user_data_dir(Some(profile.path().to_path_buf()))
            .idle_browser_timeout(self.idle_timeout)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(self.element_timeout);

        Ok(Box::new(ChromeSession {
            tab,
            browser,
            profile,
        }))
    }
}

/// Fields drop in declaration order: the browser process is gone before
/// its profile directory is removed.
pub struct ChromeSession {
    tab: Arc<Tab>,
    #[allow(dead_code)]
    browser: Browser,
    profile: TempDir,
}

impl ChromeSession {
    fn find(&self, locator: &Locator) -> Result<Element<'_>> {
        match locator {
            Locator::Css(selector) => self.tab.wait_for_element(selector),
            Locator::XPath(xpath) => self.tab.wait_for_xpath(xpath),
        }
        .with_context(|| format!("Element not found: {locator}"))
    }
}

impl PortalSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn is_present(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(selector) => self
                .tab
                .wait_for_element_with_custom_timeout(selector, PROBE_TIMEOUT)
                .is_ok(),
            Locator::XPath(xpath) => self
                .tab
                .wait_for_xpath_with_custom_timeout(xpath, PROBE_TIMEOUT)
                .is_ok(),
        }
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.find(locator)?;
        element.scroll_into_view()?;
        element.click()?;
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.find(locator)?;
        element.click()?;
        element.call_js_fn("function() { this.value = ''; }", vec![], false)?;
        element.type_into(text)?;
        Ok(())
    }

    fn upload(&self, locator: &Locator, files: &[PathBuf]) -> Result<()> {
        let element = self.find(locator)?;
        let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        element
            .set_input_files(&paths)
            .with_context(|| format!("Failed to attach {} file(s)", paths.len()))?;
        Ok(())
    }

    fn is_checked(&self, locator: &Locator) -> Result<bool> {
        let element = self.find(locator)?;
        let result = element.call_js_fn("function() { return this.checked === true; }", vec![], false)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn page_html(&self) -> Result<String> {
        self.tab.get_content()
    }

    fn profile_dir(&self) -> &Path {
        self.profile.path()
    }
}
