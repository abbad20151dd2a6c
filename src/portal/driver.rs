//! Walks the portal's listing form one fixed step at a time.

use crate::models::{CanonicalListing, TransactionType};
use crate::portal::traits::PortalSession;
use crate::portal::types::{Locator, PortalLayout};
use scraper::Html;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use strum::Display;
use tracing::{debug, error, info, warn};

/// Steps of one publication attempt, in the only order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Step {
    OpenPostPage,
    SelectCity,
    SelectAttributes,
    FillDetails,
    UploadImages,
    SetNegotiable,
    AwaitHumanVerification,
    Submit,
    ConfirmSuccess,
}

pub const STEPS: [Step; 9] = [
    Step::OpenPostPage,
    Step::SelectCity,
    Step::SelectAttributes,
    Step::FillDetails,
    Step::UploadImages,
    Step::SetNegotiable,
    Step::AwaitHumanVerification,
    Step::Submit,
    Step::ConfirmSuccess,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    /// Logged, the attempt carries on
    SoftFail(String),
    /// Aborts the attempt
    HardFail(String),
}

/// A hard failure; displays as the underlying error text only
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct DriverError {
    pub step: Step,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub completed: Vec<Step>,
    pub warnings: Vec<String>,
    /// Whether a success indicator was found after submitting
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct PublicationDriver {
    layout: PortalLayout,
    human_wait: Duration,
    settle_delay: Duration,
}

impl PublicationDriver {
    pub fn new(layout: PortalLayout, human_wait: Duration) -> Self {
        Self {
            layout,
            human_wait,
            settle_delay: Duration::from_secs(3),
        }
    }

    /// Pause after page loads and submission before inspecting the page
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Run every step against `session`, stopping at the first hard failure.
    pub fn run(
        &self,
        session: &mut dyn PortalSession,
        listing: &CanonicalListing,
        images: &[PathBuf],
    ) -> Result<DriverReport, DriverError> {
        let mut report = DriverReport::default();

        for step in STEPS {
            debug!(listing_id = %listing.id, %step, "Running step");
            match self.run_step(step, session, listing, images) {
                StepOutcome::Ok => {
                    if step == Step::ConfirmSuccess {
                        report.confirmed = true;
                    }
                }
                StepOutcome::SoftFail(reason) => {
                    warn!(listing_id = %listing.id, %step, "Step incomplete: {}", reason);
                    report.warnings.push(format!("{step}: {reason}"));
                }
                StepOutcome::HardFail(reason) => {
                    error!(listing_id = %listing.id, %step, "Step failed: {}", reason);
                    return Err(DriverError { step, reason });
                }
            }
            report.completed.push(step);
        }

        info!(
            listing_id = %listing.id,
            steps = report.completed.len(),
            warnings = report.warnings.len(),
            confirmed = report.confirmed,
            "Listing form submitted"
        );
        Ok(report)
    }

    fn run_step(
        &self,
        step: Step,
        session: &mut dyn PortalSession,
        listing: &CanonicalListing,
        images: &[PathBuf],
    ) -> StepOutcome {
        match step {
            Step::OpenPostPage => self.open_post_page(session),
            Step::SelectCity => self.select_city(session, &listing.city),
            Step::SelectAttributes => self.select_attributes(session, listing),
            Step::FillDetails => self.fill_details(session, listing),
            Step::UploadImages => self.upload_images(session, images),
            Step::SetNegotiable => self.set_negotiable(session, listing.negotiable),
            Step::AwaitHumanVerification => self.await_human_verification(),
            Step::Submit => self.submit(session),
            Step::ConfirmSuccess => self.confirm_success(session),
        }
    }

    fn open_post_page(&self, session: &mut dyn PortalSession) -> StepOutcome {
        info!(url = %self.layout.post_url, "Opening listing form...");
        if let Err(e) = session.navigate(&self.layout.post_url) {
            return StepOutcome::HardFail(format!("{e:#}"));
        }
        thread::sleep(self.settle_delay);
        StepOutcome::Ok
    }

    fn select_city(&self, session: &mut dyn PortalSession, city: &str) -> StepOutcome {
        if !session.is_present(&self.layout.location_overlay) {
            debug!("No location overlay shown");
            return StepOutcome::Ok;
        }

        if let Err(e) = session.fill(&self.layout.city_search_input, city) {
            debug!("City search input unavailable: {:#}", e);
        }
        let search_hit = Locator::exact_text(&self.layout.city_results_scope, city);
        if session.click(&search_hit).is_ok() {
            debug!(city, "Selected city from search results");
            return StepOutcome::Ok;
        }

        let popular = Locator::exact_text(&self.layout.popular_cities_scope, city);
        if session.click(&popular).is_ok() {
            debug!(city, "Selected city from popular cities");
            return StepOutcome::Ok;
        }

        StepOutcome::SoftFail(format!("city '{city}' not found in location picker"))
    }

    fn select_attributes(&self, session: &mut dyn PortalSession, listing: &CanonicalListing) -> StepOutcome {
        let transaction = match listing.transaction_type {
            TransactionType::Sell => &self.layout.sell_label,
            TransactionType::Rent => &self.layout.rent_label,
        };
        let choices = [
            ("category", listing.category.to_string()),
            ("transaction type", transaction.clone()),
            ("property type", listing.property_type.clone()),
            ("furnishing", listing.furnishing.to_string()),
            ("bathrooms", listing.bathrooms.clone()),
            ("owner type", self.layout.owner_type_label.clone()),
        ];

        // The portal may have pre-selected some of these already
        let mut missed = Vec::new();
        for (name, label) in choices {
            let locator = Locator::exact_text(&self.layout.attributes_scope, &label);
            match session.click(&locator) {
                Ok(()) => debug!(attribute = name, %label, "Selected"),
                Err(e) => {
                    warn!(attribute = name, %label, "Could not select: {:#}", e);
                    missed.push(format!("{name}={label}"));
                }
            }
        }
        soft_if_any("could not select", missed)
    }

    fn fill_details(&self, session: &mut dyn PortalSession, listing: &CanonicalListing) -> StepOutcome {
        let price = listing.price.to_string();
        let fields = [
            ("availableFrom", &self.layout.available_from_input, listing.available_from.as_str()),
            ("price", &self.layout.price_input, price.as_str()),
            ("description", &self.layout.description_input, listing.description.as_str()),
            ("contactName", &self.layout.contact_name_input, listing.contact_name.as_str()),
            ("contactEmail", &self.layout.contact_email_input, listing.contact_email.as_str()),
            ("contactMobile", &self.layout.contact_mobile_input, listing.contact_mobile.as_str()),
        ];

        let mut missed = Vec::new();
        for (name, locator, value) in fields {
            if let Err(e) = session.fill(locator, value) {
                warn!(field = name, "Could not fill: {:#}", e);
                missed.push(name.to_string());
            }
        }
        soft_if_any("could not fill", missed)
    }

    fn upload_images(&self, session: &mut dyn PortalSession, images: &[PathBuf]) -> StepOutcome {
        if images.is_empty() {
            return StepOutcome::HardFail("no images to upload".to_string());
        }
        info!(count = images.len(), "Uploading images...");
        match session.upload(&self.layout.image_input, images) {
            Ok(()) => StepOutcome::Ok,
            Err(e) => StepOutcome::HardFail(format!("{e:#}")),
        }
    }

    fn set_negotiable(&self, session: &mut dyn PortalSession, negotiable: bool) -> StepOutcome {
        let checkbox = &self.layout.negotiable_checkbox;
        match session.is_checked(checkbox) {
            Ok(current) if current == negotiable => StepOutcome::Ok,
            Ok(_) => match session.click(checkbox) {
                Ok(()) => StepOutcome::Ok,
                Err(e) => StepOutcome::SoftFail(format!("could not toggle negotiable: {e:#}")),
            },
            Err(e) => StepOutcome::SoftFail(format!("negotiable checkbox unavailable: {e:#}")),
        }
    }

    /// The portal sends a one-time passcode that a person has to enter in
    /// the open browser window. There is no signal for completion, so the
    /// attempt holds for the whole window.
    fn await_human_verification(&self) -> StepOutcome {
        info!(
            wait_secs = self.human_wait.as_secs(),
            "Waiting for OTP verification in the browser window..."
        );
        thread::sleep(self.human_wait);
        StepOutcome::Ok
    }

    fn submit(&self, session: &mut dyn PortalSession) -> StepOutcome {
        info!("Submitting listing...");
        if let Err(e) = session.click(&self.layout.submit_button) {
            return StepOutcome::HardFail(format!("{e:#}"));
        }
        thread::sleep(self.settle_delay);
        StepOutcome::Ok
    }

    /// The ad may be live even when no indicator is found, so a miss is soft.
    fn confirm_success(&self, session: &mut dyn PortalSession) -> StepOutcome {
        match session.page_html() {
            Ok(html) if contains_success_text(&html, &self.layout.success_texts) => StepOutcome::Ok,
            Ok(_) => StepOutcome::SoftFail("success indicator not found on result page".to_string()),
            Err(e) => StepOutcome::SoftFail(format!("could not read result page: {e:#}")),
        }
    }
}

fn soft_if_any(what: &str, missed: Vec<String>) -> StepOutcome {
    if missed.is_empty() {
        StepOutcome::Ok
    } else {
        StepOutcome::SoftFail(format!("{what}: {}", missed.join(", ")))
    }
}

/// Search the visible text of `html` for any indicator, ignoring case and spacing
pub fn contains_success_text(html: &str, indicators: &[String]) -> bool {
    let document = Html::parse_document(html);
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    indicators
        .iter()
        .map(|i| i.trim().to_lowercase())
        .any(|i| !i.is_empty() && text.contains(&i))
}
