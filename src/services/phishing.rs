//! Phishing drill scenarios.
//!
//! Scenario texts live in the locale files (`phishing-{id}-*` keys); the
//! message template receives the generated `$link` argument.

use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

/// Host used in the fake links. Deliberately look-alike.
pub const PHISHING_HOST: &str = "securit-y-check.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Scenario {
    BankAlert,
    ParcelDelivery,
    PrizeGiveaway,
}

impl Scenario {
    pub fn all() -> Vec<Scenario> {
        Scenario::iter().collect()
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Scenario::from_str(id).ok()
    }

    pub fn id(&self) -> &str {
        self.as_ref()
    }

    pub fn title_key(&self) -> String {
        format!("phishing-{}-title", self.id())
    }

    /// Message template; takes `$link`.
    pub fn message_key(&self) -> String {
        format!("phishing-{}-message", self.id())
    }

    /// Warning signs shown in the education step.
    pub fn signs_key(&self) -> String {
        format!("phishing-{}-signs", self.id())
    }

    /// What would have happened after following the link.
    pub fn consequence_key(&self) -> String {
        format!("phishing-{}-consequence", self.id())
    }
}

/// Random 8-hex-char token for the fake link.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub fn phishing_link(token: &str) -> String {
    format!("https://{}/{}", PHISHING_HOST, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_link_format() {
        assert_eq!(phishing_link("deadbeef"), "https://securit-y-check.com/deadbeef");
    }

    #[test]
    fn test_scenario_ids() {
        assert_eq!(Scenario::from_id("bank_alert"), Some(Scenario::BankAlert));
        assert_eq!(Scenario::from_id("nope"), None);
        assert_eq!(Scenario::ParcelDelivery.message_key(), "phishing-parcel_delivery-message");
        assert_eq!(Scenario::all().len(), 3);
    }
}
