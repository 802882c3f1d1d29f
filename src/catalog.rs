use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOffer {
    pub name: String,
    pub price: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkHours {
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRules {
    pub phone_regex: String,
    #[serde(default = "default_prefix")]
    pub confirmation_prefix: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_prefix() -> String {
    "EB".to_string()
}

fn default_country_code() -> String {
    "359".to_string()
}

fn default_language() -> String {
    "bg".to_string()
}

/// Raw shape of the business JSON file. Also served as the public config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    pub business: BusinessInfo,
    pub services: Vec<ServiceOffer>,
    pub work_hours: WorkHours,
    pub booking: BookingRules,
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidPhoneRegex(regex::Error),
    Invalid(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Cannot read business config: {}", e),
            CatalogError::Parse(e) => write!(f, "Cannot parse business config: {}", e),
            CatalogError::InvalidPhoneRegex(e) => write!(f, "Invalid booking.phoneRegex: {}", e),
            CatalogError::Invalid(e) => write!(f, "Invalid business config: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Services, prices, bookable slots and booking rules of the shop.
#[derive(Debug, Clone)]
pub struct BusinessCatalog {
    file: CatalogFile,
    phone_pattern: Regex,
}

impl BusinessCatalog {
    pub fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        if file.work_hours.slots.is_empty() {
            return Err(CatalogError::Invalid("workHours.slots is empty".into()));
        }
        if file.services.is_empty() {
            return Err(CatalogError::Invalid("services is empty".into()));
        }

        let phone_pattern =
            Regex::new(&file.booking.phone_regex).map_err(CatalogError::InvalidPhoneRegex)?;

        Ok(Self {
            file,
            phone_pattern,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json).map_err(CatalogError::Parse)?;
        Self::from_file(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(CatalogError::Io)?;
        Self::from_json(&json)
    }

    pub fn public_view(&self) -> &CatalogFile {
        &self.file
    }

    pub fn business(&self) -> &BusinessInfo {
        &self.file.business
    }

    pub fn slots(&self) -> &[String] {
        &self.file.work_hours.slots
    }

    pub fn is_slot(&self, time: &str) -> bool {
        self.slots().iter().any(|s| s == time)
    }

    pub fn price_of(&self, service: &str) -> Option<i32> {
        self.file
            .services
            .iter()
            .find(|s| s.name == service)
            .map(|s| s.price)
    }

    /// Matched against the phone with everything but digits and `+` removed.
    pub fn phone_matches(&self, stripped_phone: &str) -> bool {
        self.phone_pattern.is_match(stripped_phone)
    }

    pub fn confirmation_prefix(&self) -> &str {
        &self.file.booking.confirmation_prefix
    }

    pub fn country_code(&self) -> &str {
        &self.file.booking.country_code
    }

    pub fn language(&self) -> &str {
        &self.file.booking.language
    }
}
