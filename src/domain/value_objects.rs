//! Domain value objects representing immutable concepts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::DomainError;
use super::validation;

/// Kind of value a provider can be queried with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Ip,
    Domain,
    Email,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Ip => "ip",
            TargetType::Domain => "domain",
            TargetType::Email => "email",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ip" => Ok(TargetType::Ip),
            "domain" => Ok(TargetType::Domain),
            "email" => Ok(TargetType::Email),
            _ => Err(DomainError::UnsupportedTargetType {
                value: s.to_string(),
            }),
        }
    }
}

/// A validated and normalized lookup target.
///
/// Construction always goes through [`Target::parse`], so a `Target` in hand is
/// never a reserved address or a malformed domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target_type: TargetType,
    pub value: String,
}

impl Target {
    /// Validate and normalize a raw value for the given target type
    pub fn parse(target_type: TargetType, raw: &str) -> Result<Self, DomainError> {
        let value = match target_type {
            TargetType::Ip => validation::validate_ip(raw)?.to_string(),
            TargetType::Domain => validation::validate_domain(raw)?,
            TargetType::Email => validation::validate_email(raw)?,
        };

        Ok(Self { target_type, value })
    }

    /// Accept either an address or a domain, preferring the address form
    pub fn parse_ip_or_domain(raw: &str) -> Result<Self, DomainError> {
        if let Ok(target) = Self::parse(TargetType::Ip, raw) {
            return Ok(target);
        }
        Self::parse(TargetType::Domain, raw).map_err(|_| {
            DomainError::invalid("targetValue", "Input must be a valid IP or domain")
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.value)
    }
}

/// Coarse qualitative risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Low,
    Medium,
    High,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Low => "low",
            Verdict::Medium => "medium",
            Verdict::High => "high",
            Verdict::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity tier used when deriving a verdict from categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

/// Closed set of vendor-neutral threat classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AbuseInfrastructure,
    MailReputation,
    MalwareHosting,
    PhishingRisk,
    SpamSource,
    #[serde(rename = "botnet_c2")]
    BotnetC2,
    ExploitKit,
    DropZone,
    ProxyVpn,
    NewlyObserved,
    CompromisedHost,
    UnknownThreat,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::AbuseInfrastructure,
        Category::MailReputation,
        Category::MalwareHosting,
        Category::PhishingRisk,
        Category::SpamSource,
        Category::BotnetC2,
        Category::ExploitKit,
        Category::DropZone,
        Category::ProxyVpn,
        Category::NewlyObserved,
        Category::CompromisedHost,
        Category::UnknownThreat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AbuseInfrastructure => "abuse_infrastructure",
            Category::MailReputation => "mail_reputation",
            Category::MalwareHosting => "malware_hosting",
            Category::PhishingRisk => "phishing_risk",
            Category::SpamSource => "spam_source",
            Category::BotnetC2 => "botnet_c2",
            Category::ExploitKit => "exploit_kit",
            Category::DropZone => "drop_zone",
            Category::ProxyVpn => "proxy_vpn",
            Category::NewlyObserved => "newly_observed",
            Category::CompromisedHost => "compromised_host",
            Category::UnknownThreat => "unknown_threat",
        }
    }

    pub fn severity(&self) -> SeverityTier {
        match self {
            Category::BotnetC2
            | Category::MalwareHosting
            | Category::ExploitKit
            | Category::DropZone
            | Category::CompromisedHost => SeverityTier::High,
            Category::PhishingRisk
            | Category::SpamSource
            | Category::AbuseInfrastructure
            | Category::ProxyVpn
            | Category::MailReputation => SeverityTier::Medium,
            Category::NewlyObserved | Category::UnknownThreat => SeverityTier::Low,
        }
    }

    /// Client-facing sentence for this category.
    ///
    /// This dictionary is the only source of `reasons` text, so its wording must
    /// stay free of vendor nomenclature.
    pub fn reason(&self) -> &'static str {
        match self {
            Category::AbuseInfrastructure => {
                "Associated with infrastructure used for abusive activity"
            }
            Category::MailReputation => "Poor email sending reputation observed",
            Category::MalwareHosting => "Associated with malware distribution",
            Category::PhishingRisk => "Associated with phishing or credential theft activity",
            Category::SpamSource => "Associated with unsolicited bulk email (spam) activity",
            Category::BotnetC2 => "Associated with botnet command-and-control activity",
            Category::ExploitKit => "Associated with exploit delivery infrastructure",
            Category::DropZone => "Associated with stolen data collection infrastructure",
            Category::ProxyVpn => "Traffic may be relayed through an anonymizing proxy or VPN",
            Category::NewlyObserved => "Recently observed with limited history",
            Category::CompromisedHost => "Host shows signs of compromise",
            Category::UnknownThreat => {
                "Threat indicators present without a specific classification"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstracted evidence entry; values are buckets, never exact vendor figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub key: String,
    pub value: String,
}

impl EvidenceItem {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}
