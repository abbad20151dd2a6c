use crate::portal::PortalLayout;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Config {
    pub store_dir: PathBuf,
    /// Downloaded images and browser profiles live here
    pub temp_dir: PathBuf,
    pub sync_interval: Duration,
    pub otp_wait: Duration,
    pub image_timeout: Duration,
    pub headless: bool,
    pub layout: PortalLayout,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut layout = match get("PORTAL_LAYOUT_FILE") {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read portal layout {path}"))?;
                PortalLayout::from_json(&json)
                    .with_context(|| format!("Invalid portal layout {path}"))?
            }
            None => PortalLayout::default(),
        };
        if let Some(url) = get("PORTAL_POST_URL") {
            layout.post_url = url;
        }

        Ok(Self {
            store_dir: get("LISTING_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("listings")),
            temp_dir: get("LISTING_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("listing-sync")),
            sync_interval: Duration::from_secs(60 * parse_or(&get, "SYNC_INTERVAL_MINUTES", 30u64)?),
            otp_wait: Duration::from_secs(parse_or(&get, "OTP_WAIT_SECS", 300u64)?),
            image_timeout: Duration::from_secs(parse_or(&get, "IMAGE_TIMEOUT_SECS", 30u64)?),
            headless: parse_or(&get, "BROWSER_HEADLESS", false)?,
            layout,
        })
    }

    pub fn images_dir(&self) -> PathBuf {
        self.temp_dir.join("images")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.temp_dir.join("profiles")
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.sync_interval, Duration::from_secs(30 * 60));
        assert_eq!(config.otp_wait, Duration::from_secs(300));
        assert_eq!(config.image_timeout, Duration::from_secs(30));
        assert!(!config.headless);
        assert_eq!(config.store_dir, PathBuf::from("listings"));
        assert_eq!(config.layout, PortalLayout::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("SYNC_INTERVAL_MINUTES", "5"),
            ("OTP_WAIT_SECS", "0"),
            ("BROWSER_HEADLESS", "true"),
            ("PORTAL_POST_URL", "https://staging.example.com/post"),
        ])
        .unwrap();
        assert_eq!(config.sync_interval, Duration::from_secs(300));
        assert_eq!(config.otp_wait, Duration::ZERO);
        assert!(config.headless);
        assert_eq!(config.layout.post_url, "https://staging.example.com/post");
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = config(&[("OTP_WAIT_SECS", "five")]).unwrap_err();
        assert!(err.to_string().contains("OTP_WAIT_SECS"));
    }

    #[test]
    fn layout_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, r#"{ "ownerTypeLabel": "Individual" }"#).unwrap();
        let config = config(&[("PORTAL_LAYOUT_FILE", path.to_str().unwrap())]).unwrap();
        assert_eq!(config.layout.owner_type_label, "Individual");
    }
}
