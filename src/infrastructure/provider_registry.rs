//! Static provider descriptor table

use std::time::Duration;

use crate::domain::{ProviderDescriptor, TargetType};

pub const THREAT_REPUTATION: &str = "threat_reputation";
pub const DNS_ACTIVITY: &str = "dns_activity";
pub const CONTENT_REPUTATION: &str = "content_reputation";
pub const BREACH_LOOKUP: &str = "breach_lookup";
pub const IP_ABUSE: &str = "ip_abuse";
pub const LEAK_SEARCH: &str = "leak_search";

const HOUR: u64 = 3_600;

/// Unit costs are per-call estimates, not billed actuals
static STANDARD_PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        id: THREAT_REPUTATION,
        title: "Threat Reputation",
        supported_target_types: &[TargetType::Ip, TargetType::Domain],
        cache_ttl: Duration::from_secs(24 * HOUR),
        unit_cost: 0.0,
        policy_tag: Some("enterprise"),
    },
    ProviderDescriptor {
        id: DNS_ACTIVITY,
        title: "DNS Activity",
        supported_target_types: &[TargetType::Ip, TargetType::Domain],
        cache_ttl: Duration::from_secs(24 * HOUR),
        unit_cost: 0.0,
        policy_tag: Some("enterprise"),
    },
    ProviderDescriptor {
        id: CONTENT_REPUTATION,
        title: "Content Reputation",
        supported_target_types: &[TargetType::Domain],
        cache_ttl: Duration::from_secs(24 * HOUR),
        unit_cost: 0.0,
        policy_tag: Some("enterprise"),
    },
    ProviderDescriptor {
        id: BREACH_LOOKUP,
        title: "Breach Lookup",
        supported_target_types: &[TargetType::Email],
        cache_ttl: Duration::from_secs(12 * HOUR),
        unit_cost: 0.0035,
        policy_tag: None,
    },
    ProviderDescriptor {
        id: IP_ABUSE,
        title: "IP Abuse Reputation",
        supported_target_types: &[TargetType::Ip],
        cache_ttl: Duration::from_secs(6 * HOUR),
        unit_cost: 0.001,
        policy_tag: None,
    },
    ProviderDescriptor {
        id: LEAK_SEARCH,
        title: "Leak Search",
        supported_target_types: &[TargetType::Email, TargetType::Domain],
        cache_ttl: Duration::from_secs(24 * HOUR),
        unit_cost: 0.01,
        policy_tag: Some("darkweb"),
    },
];

/// Single source of truth for provider defaults and listings
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    descriptors: Vec<ProviderDescriptor>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(STANDARD_PROVIDERS.to_vec())
    }
}

impl ProviderRegistry {
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|d| d.id)
    }
}
