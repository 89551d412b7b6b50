//! Known wallet provider hosts and their fixed request parameters.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::providers::types::ProviderError;

/// A wallet provider deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderHost {
    #[serde(rename = "benefort.org")]
    Benefort,
    #[serde(rename = "fianit.net")]
    Fianit,
    #[serde(rename = "whitetrade.net")]
    Whitetrade,
}

/// Request kinds that carry host-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Login,
    FetchWallets,
}

impl ProviderHost {
    pub const ALL: [ProviderHost; 3] = [
        ProviderHost::Benefort,
        ProviderHost::Fianit,
        ProviderHost::Whitetrade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderHost::Benefort => "benefort.org",
            ProviderHost::Fianit => "fianit.net",
            ProviderHost::Whitetrade => "whitetrade.net",
        }
    }

    /// Base URL of the provider's web office API.
    pub fn base_url(&self) -> String {
        format!("https://weboffice.{}", self.as_str())
    }

    /// The static `key` form value the host expects for `action`.
    pub fn key(&self, action: HostAction) -> &'static str {
        match (self, action) {
            (ProviderHost::Benefort, _) => "",
            (ProviderHost::Fianit, HostAction::Login) => "9913cab1ae0ebab298863cda7086f7c9",
            (ProviderHost::Fianit, HostAction::FetchWallets) => "12977a71be9e738190369850b437e3c9",
            (ProviderHost::Whitetrade, HostAction::Login) => "434b4a60f39960b0822fc68c51b39b3b",
            (ProviderHost::Whitetrade, HostAction::FetchWallets) => {
                "9e611606476d548ab07ebeb500f0cacf"
            }
        }
    }

    /// The static `rand_param` value the host expects for `action`.
    pub fn rand_param(&self, action: HostAction) -> &'static str {
        match (self, action) {
            (ProviderHost::Benefort, _) => "",
            (ProviderHost::Fianit, HostAction::Login) => "77097949",
            (ProviderHost::Fianit, HostAction::FetchWallets) => "88539607",
            (ProviderHost::Whitetrade, HostAction::Login) => "27320033",
            (ProviderHost::Whitetrade, HostAction::FetchWallets) => "71134563",
        }
    }
}

impl std::fmt::Display for ProviderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderHost {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderHost::ALL
            .into_iter()
            .find(|host| host.as_str() == s)
            .ok_or_else(|| ProviderError::UnknownHost(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_names_parse_back() {
        for host in ProviderHost::ALL {
            assert_eq!(host.to_string().parse::<ProviderHost>().unwrap(), host);
        }
        assert!("example.com".parse::<ProviderHost>().is_err());
    }

    #[test]
    fn test_host_parameters() {
        assert_eq!(
            ProviderHost::Whitetrade.key(HostAction::Login),
            "434b4a60f39960b0822fc68c51b39b3b"
        );
        assert_eq!(ProviderHost::Fianit.rand_param(HostAction::FetchWallets), "88539607");
        assert_eq!(ProviderHost::Benefort.key(HostAction::FetchWallets), "");
        assert_eq!(ProviderHost::Fianit.base_url(), "https://weboffice.fianit.net");
    }
}
