use serde::{Deserialize, Serialize};

/// How an element on the portal page is found
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    /// Element under `scope` (an XPath) whose own text is exactly `text`
    pub fn exact_text(scope: &str, text: &str) -> Self {
        Locator::XPath(format!(
            "{scope}//*[normalize-space(text())={}]",
            xpath_literal(text.trim())
        ))
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Quote `text` as an XPath string literal, even when it has both quote kinds
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// Element lookups and labels for the portal's listing form.
///
/// These track the portal's current markup and are expected to need
/// maintenance; override them with a JSON file instead of recompiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PortalLayout {
    /// Listing creation page
    pub post_url: String,
    pub location_overlay: Locator,
    pub city_search_input: Locator,
    /// XPath scope holding city search suggestions
    pub city_results_scope: String,
    /// XPath scope holding the popular city picker
    pub popular_cities_scope: String,
    /// XPath scope holding the fixed-choice attribute buttons
    pub attributes_scope: String,
    pub sell_label: String,
    pub rent_label: String,
    pub owner_type_label: String,
    pub available_from_input: Locator,
    pub price_input: Locator,
    pub description_input: Locator,
    pub contact_name_input: Locator,
    pub contact_email_input: Locator,
    pub contact_mobile_input: Locator,
    pub image_input: Locator,
    pub negotiable_checkbox: Locator,
    pub submit_button: Locator,
    /// Any of these (case-insensitive) on the result page means the ad went live
    pub success_texts: Vec<String>,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            post_url: "https://portal.example.com/post-property".to_string(),
            location_overlay: Locator::css("[data-testid='location-modal']"),
            city_search_input: Locator::css("[data-testid='location-modal'] input[type='search']"),
            city_results_scope: "//*[@data-testid='location-suggestions']".to_string(),
            popular_cities_scope: "//*[@data-testid='popular-cities']".to_string(),
            attributes_scope: "//form".to_string(),
            sell_label: "Sell".to_string(),
            rent_label: "Rent".to_string(),
            owner_type_label: "Owner".to_string(),
            available_from_input: Locator::css("input[name='availableFrom']"),
            price_input: Locator::css("input[name='price']"),
            description_input: Locator::css("textarea[name='description']"),
            contact_name_input: Locator::css("input[name='name']"),
            contact_email_input: Locator::css("input[name='email']"),
            contact_mobile_input: Locator::css("input[name='mobile']"),
            image_input: Locator::css("input[type='file']"),
            negotiable_checkbox: Locator::css("input[type='checkbox'][name='negotiable']"),
            submit_button: Locator::css("button[type='submit']"),
            success_texts: vec![
                "posted successfully".to_string(),
                "your ad is live".to_string(),
                "listing has been submitted".to_string(),
            ],
        }
    }
}

impl PortalLayout {
    /// Load a layout override; fields missing from the file keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
