//! Scriptable in-process stand-in for a browser session.

use crate::portal::traits::{PortalSession, SessionLauncher};
use crate::portal::types::{Locator, PortalLayout};
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SUCCESS_PAGE: &str =
    "<html><body><h1>Congratulations!</h1><p>Your ad has been posted successfully.</p></body></html>";

/// Operations a test can make fail
#[derive(Debug, Clone, PartialEq)]
pub enum FakeOp {
    Navigate,
    Upload,
    Submit,
    Click(Locator),
    /// Any exact-text click on this label
    ClickText(String),
    /// Fill of the CSS locator with this selector
    Fill(String),
}

#[derive(Debug, Default)]
pub struct FakeLog {
    pub clicks: Vec<Locator>,
    pub fills: Vec<(Locator, String)>,
    pub uploads: Vec<Vec<PathBuf>>,
    /// Whether every file existed at upload time
    pub uploads_existed: Vec<bool>,
}

pub struct FakeSession {
    layout: PortalLayout,
    overlay: bool,
    /// Op, root cause, and optional context wrapped around it
    failures: Vec<(FakeOp, String, Option<String>)>,
    result_page: String,
    log: Arc<Mutex<FakeLog>>,
    profile: TempDir,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::in_dir(&std::env::temp_dir())
    }

    pub fn in_dir(root: &Path) -> Self {
        Self {
            layout: PortalLayout::default(),
            overlay: false,
            failures: Vec::new(),
            result_page: SUCCESS_PAGE.to_string(),
            log: Arc::default(),
            profile: tempfile::Builder::new()
                .prefix("fake-profile-")
                .tempdir_in(root)
                .expect("create fake profile dir"),
        }
    }

    pub fn with_overlay(mut self) -> Self {
        self.overlay = true;
        self
    }

    pub fn with_result_page(mut self, html: &str) -> Self {
        self.result_page = html.to_string();
        self
    }

    pub fn fail_on(mut self, op: FakeOp, message: &str) -> Self {
        self.failures.push((op, message.to_string(), None));
        self
    }

    /// Fail `op` with `cause` wrapped in `context`, the way real session errors arrive
    pub fn fail_with_context(mut self, op: FakeOp, context: &str, cause: &str) -> Self {
        self.failures
            .push((op, cause.to_string(), Some(context.to_string())));
        self
    }

    pub fn log(&self) -> Arc<Mutex<FakeLog>> {
        Arc::clone(&self.log)
    }

    pub fn uploads(&self) -> Vec<Vec<PathBuf>> {
        self.log.lock().unwrap().uploads.clone()
    }

    pub fn clicked(&self, locator: &Locator) -> bool {
        self.log.lock().unwrap().clicks.contains(locator)
    }

    /// Last value filled into the CSS locator `selector`
    pub fn filled(&self, selector: &str) -> Option<String> {
        let target = Locator::css(selector);
        self.log
            .lock()
            .unwrap()
            .fills
            .iter()
            .rev()
            .find(|(locator, _)| *locator == target)
            .map(|(_, value)| value.clone())
    }

    fn check(&self, matches: impl Fn(&FakeOp) -> bool) -> Result<()> {
        match self.failures.iter().find(|(op, _, _)| matches(op)) {
            Some((_, cause, None)) => Err(anyhow!("{cause}")),
            Some((_, cause, Some(context))) => Err(anyhow!("{cause}").context(context.clone())),
            None => Ok(()),
        }
    }
}

impl PortalSession for FakeSession {
    fn navigate(&mut self, _url: &str) -> Result<()> {
        self.check(|op| *op == FakeOp::Navigate)
    }

    fn is_present(&self, locator: &Locator) -> bool {
        *locator != self.layout.location_overlay || self.overlay
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        if *locator == self.layout.submit_button {
            self.check(|op| *op == FakeOp::Submit)?;
        }
        self.check(|op| match op {
            FakeOp::Click(target) => target == locator,
            FakeOp::ClickText(text) => {
                matches!(locator, Locator::XPath(x) if x.ends_with(&format!("='{text}']")))
            }
            _ => false,
        })?;
        self.log.lock().unwrap().clicks.push(locator.clone());
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        self.check(|op| matches!((op, locator), (FakeOp::Fill(s), Locator::Css(l)) if s == l))?;
        self.log
            .lock()
            .unwrap()
            .fills
            .push((locator.clone(), text.to_string()));
        Ok(())
    }

    fn upload(&self, _locator: &Locator, files: &[PathBuf]) -> Result<()> {
        self.check(|op| *op == FakeOp::Upload)?;
        let mut log = self.log.lock().unwrap();
        log.uploads.push(files.to_vec());
        log.uploads_existed.push(files.iter().all(|f| f.exists()));
        Ok(())
    }

    fn is_checked(&self, _locator: &Locator) -> Result<bool> {
        Ok(false)
    }

    fn page_html(&self) -> Result<String> {
        Ok(self.result_page.clone())
    }

    fn profile_dir(&self) -> &Path {
        self.profile.path()
    }
}

/// What one launched session left behind
pub struct LaunchRecord {
    pub profile: PathBuf,
    pub log: Arc<Mutex<FakeLog>>,
}

/// Hands out fake sessions, each scripted with the next queued failure plan
pub struct FakeLauncher {
    root: PathBuf,
    plans: Mutex<VecDeque<Vec<(FakeOp, String)>>>,
    launched: Mutex<Vec<LaunchRecord>>,
}

impl FakeLauncher {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            plans: Mutex::default(),
            launched: Mutex::default(),
        }
    }

    /// Queue the failures for the next launched session; an empty plan succeeds
    pub fn plan(self, failures: Vec<(FakeOp, &str)>) -> Self {
        self.plans.lock().unwrap().push_back(
            failures
                .into_iter()
                .map(|(op, message)| (op, message.to_string()))
                .collect(),
        );
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn profiles(&self) -> Vec<PathBuf> {
        self.launched.lock().unwrap().iter().map(|r| r.profile.clone()).collect()
    }

    pub fn uploads(&self) -> Vec<Vec<PathBuf>> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.log.lock().unwrap().uploads.clone())
            .collect()
    }

    pub fn uploads_existed(&self) -> Vec<bool> {
        self.launched
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.log.lock().unwrap().uploads_existed.clone())
            .collect()
    }
}

impl SessionLauncher for FakeLauncher {
    fn launch(&self) -> Result<Box<dyn PortalSession>> {
        let plan = self.plans.lock().unwrap().pop_front().unwrap_or_default();
        let mut session = FakeSession::in_dir(&self.root);
        for (op, message) in plan {
            session = session.fail_on(op, &message);
        }
        self.launched.lock().unwrap().push(LaunchRecord {
            profile: session.profile_dir().to_path_buf(),
            log: session.log(),
        });
        Ok(Box::new(session))
    }
}
