//! Generic provider adapters run through the orchestrator
//!
//! Every failure degrades to a single synthetic unavailable finding so one
//! provider never blocks a multi-provider scan.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, warn};

use super::errors::ProviderError;
use super::orchestrator::{CallOptions, CallOrchestrator};
use crate::config::ProvidersConfig;
use crate::domain::{Finding, Target};
use crate::infrastructure::ProviderAdapter;
use crate::infrastructure::api_clients::{BreachLookupAdapter, IpAbuseAdapter, LeakSearchAdapter};

pub struct AdapterRunner {
    orchestrator: CallOrchestrator,
    adapters: BTreeMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl AdapterRunner {
    pub fn new(orchestrator: CallOrchestrator) -> Self {
        Self {
            orchestrator,
            adapters: BTreeMap::new(),
        }
    }

    /// Runner with the standard HTTP adapters
    pub fn from_config(
        orchestrator: CallOrchestrator,
        providers: &ProvidersConfig,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self::new(orchestrator)
            .with_adapter(Arc::new(BreachLookupAdapter::new(&providers.breach_lookup, timeout)?))
            .with_adapter(Arc::new(IpAbuseAdapter::new(&providers.ip_abuse, timeout)?))
            .with_adapter(Arc::new(LeakSearchAdapter::new(&providers.leak_search, timeout)?)))
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider_id(), adapter);
        self
    }

    pub fn has_adapter(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// Run one adapter; never fails
    pub async fn run(&self, provider_id: &str, target: &Target, skip_cache: bool) -> Vec<Finding> {
        let Some(adapter) = self.adapters.get(provider_id) else {
            return vec![Finding::unavailable(
                provider_id,
                "not_found",
                format!("No adapter registered for {}", provider_id),
            )];
        };

        let options = CallOptions {
            skip_cache,
            ..Default::default()
        };
        match self
            .orchestrator
            .call(provider_id, target, options, || adapter.fetch(target))
            .await
        {
            Ok(outcome) => outcome.value,
            Err(error) => {
                warn!(provider = provider_id, reason = error.reason_code(), "Adapter degraded: {}", error);
                vec![Finding::unavailable(
                    provider_id,
                    error.reason_code(),
                    unavailable_reason(&error),
                )]
            }
        }
    }

    /// Run every adapter that supports the target concurrently
    pub async fn run_all(self: &Arc<Self>, target: &Target) -> Vec<Finding> {
        let registry = &self.orchestrator.context().registry;
        let mut tasks = JoinSet::new();

        for &provider_id in self.adapters.keys() {
            if !registry
                .get(provider_id)
                .is_some_and(|d| d.supports(target.target_type))
            {
                continue;
            }
            let runner = Arc::clone(self);
            let target = target.clone();
            tasks.spawn(async move { runner.run(provider_id, &target, false).await });
        }

        let mut findings = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(batch) => findings.extend(batch),
                Err(e) => error!("Adapter task panicked: {}", e),
            }
        }
        findings.sort_by(|a, b| a.provider.cmp(&b.provider));
        findings
    }
}

/// Client-safe reason text; transport details stay in the logs
fn unavailable_reason(error: &ProviderError) -> String {
    match error {
        ProviderError::Network(_) | ProviderError::Json(_) => {
            "Provider request failed".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::ApiError;
    use crate::application::orchestrator::RuntimeContext;
    use crate::config::Config;
    use crate::domain::{FindingKind, TargetType, Verdict};
    use crate::infrastructure::provider_registry::{BREACH_LOOKUP, IP_ABUSE, LEAK_SEARCH};
    use async_trait::async_trait;

    struct StaticAdapter {
        id: &'static str,
        result: fn() -> Result<Vec<Finding>, ProviderError>,
    }

    #[async_trait]
    impl ProviderAdapter for StaticAdapter {
        fn provider_id(&self) -> &'static str {
            self.id
        }

        async fn fetch(&self, _target: &Target) -> Result<Vec<Finding>, ProviderError> {
            (self.result)()
        }
    }

    fn runner() -> AdapterRunner {
        let mut config = Config::default();
        config.runtime.max_retries = 0;
        AdapterRunner::new(CallOrchestrator::new(Arc::new(RuntimeContext::from_config(
            &config,
        ))))
    }

    fn email() -> Target {
        Target::parse(TargetType::Email, "someone@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_findings_pass_through() {
        let runner = runner().with_adapter(Arc::new(StaticAdapter {
            id: BREACH_LOOKUP,
            result: || {
                Ok(vec![Finding::new(BREACH_LOOKUP, FindingKind::Breach, "Shop", Verdict::High)])
            },
        }));

        let findings = runner.run(BREACH_LOOKUP, &email(), false).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Shop");
    }

    #[tokio::test]
    async fn test_errors_degrade_to_unavailable() {
        let runner = runner().with_adapter(Arc::new(StaticAdapter {
            id: BREACH_LOOKUP,
            result: || Err(ProviderError::Api(ApiError::ServiceUnavailable)),
        }));

        let findings = runner.run(BREACH_LOOKUP, &email(), false).await;
        assert_eq!(findings.len(), 1);
        assert!(findings[0].is_unavailable());
        assert_eq!(findings[0].provider, BREACH_LOOKUP);
        assert_eq!(findings[0].attributes["reason_code"], "api_error");
    }

    #[tokio::test]
    async fn test_policy_gate_degrades_with_reason() {
        let runner = runner().with_adapter(Arc::new(StaticAdapter {
            id: LEAK_SEARCH,
            result: || Ok(Vec::new()),
        }));

        let findings = runner.run(LEAK_SEARCH, &email(), false).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].attributes["reason_code"], "policy_blocked");
        assert!(findings[0].summary.as_deref().unwrap().contains("darkweb"));
    }

    #[tokio::test]
    async fn test_missing_adapter() {
        let findings = runner().run(IP_ABUSE, &email(), false).await;
        assert_eq!(findings[0].attributes["reason_code"], "not_found");
    }

    #[tokio::test]
    async fn test_run_all_skips_unsupported() {
        let runner = Arc::new(
            runner()
                .with_adapter(Arc::new(StaticAdapter {
                    id: BREACH_LOOKUP,
                    result: || {
                        Ok(vec![Finding::new(BREACH_LOOKUP, FindingKind::Breach, "Shop", Verdict::Low)])
                    },
                }))
                .with_adapter(Arc::new(StaticAdapter {
                    id: IP_ABUSE,
                    result: || Ok(Vec::new()),
                }))
                .with_adapter(Arc::new(StaticAdapter {
                    id: LEAK_SEARCH,
                    result: || Ok(Vec::new()),
                })),
        );

        let findings = runner.run_all(&email()).await;
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].provider, BREACH_LOOKUP);
        assert_eq!(findings[1].provider, LEAK_SEARCH);
        assert!(findings[1].is_unavailable());
    }
}
