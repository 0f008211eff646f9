//! Per-provider daily call quota and monthly cost budget tracking

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::SpendConfig;

/// Accounting period a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpendPeriod {
    Day,
    Month,
}

impl SpendPeriod {
    /// Period identity; a new key supersedes the old record at rollover
    pub fn key(&self, at: DateTime<Utc>) -> String {
        match self {
            SpendPeriod::Day => at.format("%Y-%m-%d").to_string(),
            SpendPeriod::Month => at.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpendRecord {
    pub provider_id: String,
    pub period_key: String,
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_latency_ms: u64,
    pub total_cost: f64,
    pub last_call_at: Option<DateTime<Utc>>,
}

impl SpendRecord {
    fn new(provider_id: &str, period_key: String) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            period_key,
            call_count: 0,
            success_count: 0,
            failure_count: 0,
            total_latency_ms: 0,
            total_cost: 0.0,
            last_call_at: None,
        }
    }
}

/// Outcome of a pre-call spend check
#[derive(Debug, Clone, PartialEq)]
pub struct SpendDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub daily_usage_pct: f64,
    pub monthly_usage_pct: f64,
}

/// Spend view for health reporting
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpendSnapshot {
    pub provider_id: String,
    pub daily_quota: u64,
    pub monthly_budget: f64,
    pub daily: Option<SpendRecord>,
    pub monthly: Option<SpendRecord>,
}

type RecordKey = (String, SpendPeriod, String);

/// Process-local spend bookkeeping
#[derive(Debug)]
pub struct SpendTracker {
    config: SpendConfig,
    records: Mutex<HashMap<RecordKey, SpendRecord>>,
}

impl SpendTracker {
    pub fn new(config: SpendConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check_spend(&self, provider_id: &str, unit_cost: f64) -> SpendDecision {
        self.check_spend_at(provider_id, unit_cost, Utc::now()).await
    }

    /// Evaluate quota and budget usage; denies only when hard-fail is enabled
    pub async fn check_spend_at(
        &self,
        provider_id: &str,
        unit_cost: f64,
        now: DateTime<Utc>,
    ) -> SpendDecision {
        let daily_quota = self.config.daily_quota_for(provider_id);
        let monthly_budget = self.config.monthly_budget_for(provider_id);

        let (calls_today, spent_this_month) = {
            let records = self.records.lock().await;
            let calls = records
                .get(&record_key(provider_id, SpendPeriod::Day, now))
                .map(|r| r.call_count)
                .unwrap_or(0);
            let spent = records
                .get(&record_key(provider_id, SpendPeriod::Month, now))
                .map(|r| r.total_cost)
                .unwrap_or(0.0);
            (calls, spent)
        };

        let daily_usage_pct = usage(calls_today as f64, daily_quota as f64);
        let monthly_usage_pct = usage(spent_this_month, monthly_budget);

        if daily_usage_pct >= self.config.warn_threshold
            || monthly_usage_pct >= self.config.warn_threshold
        {
            warn!(
                provider = provider_id,
                usage_pct = daily_usage_pct.max(monthly_usage_pct) * 100.0,
                unit_cost,
                "Provider spend approaching limit"
            );
        }

        if self.config.hard_fail_enabled {
            let threshold = self.config.hard_fail_threshold;
            if daily_usage_pct >= threshold {
                return SpendDecision {
                    allowed: false,
                    reason: Some(format!(
                        "Daily quota nearly exhausted for {}: {}/{} calls",
                        provider_id, calls_today, daily_quota
                    )),
                    daily_usage_pct,
                    monthly_usage_pct,
                };
            }
            if monthly_usage_pct >= threshold {
                return SpendDecision {
                    allowed: false,
                    reason: Some(format!(
                        "Monthly budget nearly exhausted for {}: ${:.2}/${:.2}",
                        provider_id, spent_this_month, monthly_budget
                    )),
                    daily_usage_pct,
                    monthly_usage_pct,
                };
            }
        }

        SpendDecision {
            allowed: true,
            reason: None,
            daily_usage_pct,
            monthly_usage_pct,
        }
    }

    pub async fn record_call(&self, provider_id: &str, success: bool, latency_ms: u64, unit_cost: f64) {
        self.record_call_at(provider_id, success, latency_ms, unit_cost, Utc::now())
            .await
    }

    /// Count every attempt; cost accrues only on success
    pub async fn record_call_at(
        &self,
        provider_id: &str,
        success: bool,
        latency_ms: u64,
        unit_cost: f64,
        now: DateTime<Utc>,
    ) {
        let mut records = self.records.lock().await;
        for period in [SpendPeriod::Day, SpendPeriod::Month] {
            let key = record_key(provider_id, period, now);
            let record = records
                .entry(key)
                .or_insert_with(|| SpendRecord::new(provider_id, period.key(now)));

            record.call_count += 1;
            if success {
                record.success_count += 1;
                record.total_cost += unit_cost;
            } else {
                record.failure_count += 1;
            }
            record.total_latency_ms += latency_ms;
            record.last_call_at = Some(now);
        }
    }

    pub async fn snapshot(&self, provider_id: &str) -> SpendSnapshot {
        let now = Utc::now();
        let records = self.records.lock().await;
        SpendSnapshot {
            provider_id: provider_id.to_string(),
            daily_quota: self.config.daily_quota_for(provider_id),
            monthly_budget: self.config.monthly_budget_for(provider_id),
            daily: records
                .get(&record_key(provider_id, SpendPeriod::Day, now))
                .cloned(),
            monthly: records
                .get(&record_key(provider_id, SpendPeriod::Month, now))
                .cloned(),
        }
    }

    /// Drop records from closed periods; their keys can no longer be written
    pub async fn prune_closed_periods(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|(_, period, key), _| *key == period.key(now));
        let removed = before - records.len();
        if removed > 0 {
            info!(removed, "Pruned spend records from closed periods");
        }
        removed
    }
}

fn record_key(provider_id: &str, period: SpendPeriod, at: DateTime<Utc>) -> RecordKey {
    (provider_id.to_string(), period, period.key(at))
}

fn usage(used: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 1.0;
    }
    used / limit
}
