//! Named policy gates controlling whole classes of providers

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::application::errors::ApplicationError;
use crate::config::PolicyConfig;
use crate::domain::ProviderDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PolicyGate {
    pub tag: String,
    pub enabled: bool,
    pub description: String,
}

/// Static set of gates, built once from configuration
#[derive(Debug, Clone, Default)]
pub struct PolicyGates {
    gates: HashMap<String, PolicyGate>,
}

impl PolicyGates {
    pub fn from_config(config: &PolicyConfig) -> Self {
        let gates = config
            .gates
            .iter()
            .map(|(tag, gate)| {
                (
                    tag.clone(),
                    PolicyGate {
                        tag: tag.clone(),
                        enabled: gate.enabled,
                        description: gate.description.clone(),
                    },
                )
            })
            .collect();
        Self { gates }
    }

    /// Reject any provider whose tag has no registered gate
    pub fn validate_registry(&self, descriptors: &[ProviderDescriptor]) -> Result<(), ApplicationError> {
        for descriptor in descriptors {
            if let Some(tag) = descriptor.policy_tag {
                if !self.gates.contains_key(tag) {
                    return Err(ApplicationError::Configuration {
                        message: format!(
                            "Provider '{}' references unregistered policy tag '{}'",
                            descriptor.id, tag
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether a call to a provider with this tag may proceed.
    ///
    /// Untagged providers are always allowed. Unknown tags are denied; startup
    /// validation keeps that path unreachable for registered providers.
    pub fn is_allowed(&self, tag: Option<&str>) -> bool {
        let Some(tag) = tag else {
            return true;
        };
        let allowed = self.gates.get(tag).is_some_and(|gate| gate.enabled);
        if !allowed {
            debug!(tag, "Policy gate closed");
        }
        allowed
    }

    pub fn gates(&self) -> Vec<PolicyGate> {
        let mut gates: Vec<_> = self.gates.values().cloned().collect();
        gates.sort_by(|a, b| a.tag.cmp(&b.tag));
        gates
    }
}
