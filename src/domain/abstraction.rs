//! Vendor-neutral abstraction of raw reputation data
//!
//! Raw indicator strings and structured fields from the reputation vendor never
//! reach a caller verbatim: indicators are reduced to [`Category`] values, reasons
//! come from the fixed dictionary in [`Category::reason`], and exact observations
//! (day counts, ownership records) are bucketed so the vendor's internal
//! thresholds cannot be inferred from our output.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::entities::AbstractedSignal;
use super::value_objects::{Category, EvidenceItem, SeverityTier, Target, Verdict};

/// Keyword table, keys already normalized (lowercase alphanumerics only)
static KEYWORD_TABLE: &[(&str, Category)] = &[
    ("spam", Category::SpamSource),
    ("spambot", Category::SpamSource),
    ("spamsource", Category::SpamSource),
    ("snowshoe", Category::SpamSource),
    ("sbl", Category::SpamSource),
    ("css", Category::SpamSource),
    ("botnet", Category::BotnetC2),
    ("c2", Category::BotnetC2),
    ("cnc", Category::BotnetC2),
    ("commandcontrol", Category::BotnetC2),
    ("botnetcontroller", Category::BotnetC2),
    ("bcl", Category::BotnetC2),
    ("malware", Category::MalwareHosting),
    ("dropper", Category::MalwareHosting),
    ("malwaredistribution", Category::MalwareHosting),
    ("ransomware", Category::MalwareHosting),
    ("payload", Category::MalwareHosting),
    ("phishing", Category::PhishingRisk),
    ("phish", Category::PhishingRisk),
    ("credentialtheft", Category::PhishingRisk),
    ("fraud", Category::PhishingRisk),
    ("exploit", Category::ExploitKit),
    ("exploitkit", Category::ExploitKit),
    ("dropzone", Category::DropZone),
    ("exfiltration", Category::DropZone),
    ("proxy", Category::ProxyVpn),
    ("openproxy", Category::ProxyVpn),
    ("vpn", Category::ProxyVpn),
    ("tor", Category::ProxyVpn),
    ("anonymizer", Category::ProxyVpn),
    ("newlyobserved", Category::NewlyObserved),
    ("newdomain", Category::NewlyObserved),
    ("recentlyregistered", Category::NewlyObserved),
    ("zrd", Category::NewlyObserved),
    ("compromised", Category::CompromisedHost),
    ("infected", Category::CompromisedHost),
    ("hijacked", Category::CompromisedHost),
    ("xbl", Category::CompromisedHost),
    ("authbl", Category::CompromisedHost),
    ("abuse", Category::AbuseInfrastructure),
    ("bulletproof", Category::AbuseInfrastructure),
    ("dbl", Category::AbuseInfrastructure),
    ("drop", Category::AbuseInfrastructure),
    ("edrop", Category::AbuseInfrastructure),
    ("dynamic", Category::MailReputation),
    ("enduser", Category::MailReputation),
    ("pbl", Category::MailReputation),
    ("badsender", Category::MailReputation),
];

static KEYWORD_INDEX: Lazy<HashMap<&'static str, Category>> =
    Lazy::new(|| KEYWORD_TABLE.iter().copied().collect());

/// Keys shorter than this only match exactly; substring matching them would
/// misfire on unrelated words.
const MIN_SUBSTRING_KEY_LEN: usize = 4;

const LIST_HIT_WEIGHT: f64 = 0.35;
const EVIDENCE_WEIGHT: f64 = 0.05;
const MAX_CONFIDENCE: f64 = 0.95;

const CLEAN_CONFIDENCE: f64 = 0.9;
const CLEAN_REASON: &str = "No threat indicators found";

/// Structured input for the abstraction layer, already decoded from a vendor response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    pub indicators: Vec<String>,
    pub listed: bool,
    pub country_code: Option<String>,
    pub has_network_owner: bool,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Result of abstraction, ready to be attached to a target
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractedOutcome {
    pub verdict: Verdict,
    pub categories: Vec<Category>,
    pub reasons: Vec<String>,
    pub confidence: f64,
    pub evidence: Vec<EvidenceItem>,
}

impl AbstractedOutcome {
    /// Confident clean result for targets the vendor has no record of
    pub fn clean() -> Self {
        Self {
            verdict: Verdict::Low,
            categories: Vec::new(),
            reasons: vec![CLEAN_REASON.to_string()],
            confidence: CLEAN_CONFIDENCE,
            evidence: vec![EvidenceItem::new("threat_detected", "false")],
        }
    }

    pub fn into_signal(
        self,
        provider: &str,
        target: &Target,
        fetched_at: DateTime<Utc>,
    ) -> AbstractedSignal {
        AbstractedSignal {
            provider: provider.to_string(),
            input_type: target.target_type,
            input_value: target.value.clone(),
            verdict: self.verdict,
            categories: self.categories,
            reasons: self.reasons,
            confidence: self.confidence,
            evidence: self.evidence,
            fetched_at,
            cache_hit: false,
        }
    }
}

/// Lowercase and strip everything but ASCII alphanumerics
pub fn normalize_indicator(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Map one raw indicator to a category: exact key, then the longest contained
/// key, then a short key matching one token of the raw text, then
/// [`Category::UnknownThreat`]. Returns `None` for blank input.
pub fn categorize_indicator(raw: &str) -> Option<Category> {
    let normalized = normalize_indicator(raw);
    if normalized.is_empty() {
        return None;
    }

    if let Some(category) = KEYWORD_INDEX.get(normalized.as_str()) {
        return Some(*category);
    }

    let fallback = KEYWORD_TABLE
        .iter()
        .filter(|(key, _)| key.len() >= MIN_SUBSTRING_KEY_LEN && normalized.contains(key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, category)| *category)
        .or_else(|| categorize_tokens(raw));

    Some(fallback.unwrap_or(Category::UnknownThreat))
}

/// Match keys against individual tokens: `c2-server`, `XBL/CBL`, `SBL123456`.
///
/// A token matches when it equals a key or when its leading letters do and
/// the rest is a numeric id.
fn categorize_tokens(raw: &str) -> Option<Category> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
        .find_map(|token| {
            if let Some(category) = KEYWORD_INDEX.get(token.as_str()) {
                return Some(*category);
            }
            let letters = token.trim_end_matches(|c: char| c.is_ascii_digit());
            if letters.len() < token.len() && letters.chars().all(|c| c.is_ascii_alphabetic()) {
                KEYWORD_INDEX.get(letters).copied()
            } else {
                None
            }
        })
}

/// Map raw indicators to a deduplicated category list, preserving first-seen order
pub fn abstract_categories<S: AsRef<str>>(indicators: &[S]) -> Vec<Category> {
    let mut categories = Vec::new();
    for indicator in indicators {
        if let Some(category) = categorize_indicator(indicator.as_ref()) {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }
    categories
}

/// Combine category severity with confidence into a verdict
pub fn derive_verdict(categories: &[Category], confidence: f64) -> Verdict {
    if categories.is_empty() {
        return Verdict::Unknown;
    }

    let has_high = categories
        .iter()
        .any(|c| c.severity() == SeverityTier::High);
    let has_medium = categories
        .iter()
        .any(|c| c.severity() == SeverityTier::Medium);

    if has_high && confidence >= 0.7 {
        Verdict::High
    } else if has_high && confidence >= 0.4 {
        Verdict::Medium
    } else if has_medium && confidence >= 0.6 {
        Verdict::Medium
    } else if confidence >= 0.3 {
        Verdict::Low
    } else {
        Verdict::Unknown
    }
}

/// One dictionary sentence per category
pub fn generate_reasons(categories: &[Category]) -> Vec<String> {
    categories.iter().map(|c| c.reason().to_string()).collect()
}

/// Capped additive confidence from the number of corroborating signals
pub fn compute_confidence(list_hits: usize, evidence_count: usize) -> f64 {
    let raw = list_hits as f64 * LIST_HIT_WEIGHT + evidence_count as f64 * EVIDENCE_WEIGHT;
    round_two(raw.min(MAX_CONFIDENCE))
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert raw structured fields into bucketed evidence
pub fn sanitize_evidence(observation: &RawObservation, now: DateTime<Utc>) -> Vec<EvidenceItem> {
    let mut evidence = vec![EvidenceItem::new(
        "threat_detected",
        observation.listed.to_string(),
    )];

    if let Some(cc) = observation
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|cc| cc.len() == 2 && cc.chars().all(|c| c.is_ascii_alphabetic()))
    {
        evidence.push(EvidenceItem::new("country_code", cc.to_ascii_uppercase()));
    }

    evidence.push(EvidenceItem::new(
        "has_network_info",
        observation.has_network_owner.to_string(),
    ));

    if let Some(first_seen) = observation.first_seen {
        evidence.push(EvidenceItem::new(
            "first_observed",
            first_observed_bucket(days_between(first_seen, now)),
        ));
    }
    if let Some(last_seen) = observation.last_seen {
        evidence.push(EvidenceItem::new(
            "last_activity",
            last_activity_bucket(days_between(last_seen, now)),
        ));
    }

    evidence
}

fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_days().max(0)
}

fn first_observed_bucket(days: i64) -> &'static str {
    match days {
        0..=30 => "recent",
        31..=180 => "moderate",
        _ => "established",
    }
}

fn last_activity_bucket(days: i64) -> &'static str {
    match days {
        0..=7 => "active",
        8..=90 => "recent",
        _ => "stale",
    }
}

/// Full abstraction of one vendor observation
pub fn abstract_observation(observation: &RawObservation, now: DateTime<Utc>) -> AbstractedOutcome {
    let mut distinct_hits: Vec<String> = observation
        .indicators
        .iter()
        .map(|i| normalize_indicator(i))
        .filter(|i| !i.is_empty())
        .collect();
    distinct_hits.sort();
    distinct_hits.dedup();

    if distinct_hits.is_empty() && !observation.listed {
        return AbstractedOutcome::clean();
    }

    let mut categories = abstract_categories(&observation.indicators);
    if categories.is_empty() {
        categories.push(Category::UnknownThreat);
    }

    let evidence = sanitize_evidence(observation, now);
    let confidence = compute_confidence(distinct_hits.len().max(1), evidence.len());
    let verdict = derive_verdict(&categories, confidence);
    let reasons = generate_reasons(&categories);

    AbstractedOutcome {
        verdict,
        categories,
        reasons,
        confidence,
        evidence,
    }
}

/// Abstraction of a passive-resolution history, which only exposes volume
pub fn abstract_passive_activity(record_count: usize) -> AbstractedOutcome {
    let activity = match record_count {
        0..=10 => "low",
        11..=50 => "moderate",
        _ => "high",
    };
    let categories = if record_count > 0 {
        vec![Category::NewlyObserved]
    } else {
        Vec::new()
    };
    let reasons = if record_count > 0 {
        vec!["DNS activity observed in passive monitoring".to_string()]
    } else {
        Vec::new()
    };

    AbstractedOutcome {
        verdict: if record_count > 50 {
            Verdict::Medium
        } else {
            Verdict::Low
        },
        categories,
        reasons,
        confidence: round_two((0.3 + record_count as f64 * 0.01).min(0.8)),
        evidence: vec![EvidenceItem::new("dns_activity_level", activity)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compliance::assert_no_disallowed_fields;
    use crate::domain::value_objects::TargetType;
    use chrono::Duration;

    #[test]
    fn test_maps_spam_indicators() {
        let result = abstract_categories(&["spam", "spambot"]);
        assert_eq!(result, vec![Category::SpamSource]);
        assert_no_disallowed_fields(&result, "abstract_categories output");
    }

    #[test]
    fn test_maps_botnet_indicators() {
        let result = abstract_categories(&["botnet", "c2", "command_control"]);
        assert_eq!(result, vec![Category::BotnetC2]);
    }

    #[test]
    fn test_maps_malware_and_phishing_indicators() {
        let result = abstract_categories(&["malware", "Dropper", "malware-distribution"]);
        assert!(result.contains(&Category::MalwareHosting));

        let result = abstract_categories(&["phishing", "phish", "credential_theft"]);
        assert_eq!(result, vec![Category::PhishingRisk]);
    }

    #[test]
    fn test_substring_fallback_prefers_longest_key() {
        assert_eq!(
            categorize_indicator("known-botnet-controller-host"),
            Some(Category::BotnetC2)
        );
        assert_eq!(
            categorize_indicator("mass_phishing_kit"),
            Some(Category::PhishingRisk)
        );
    }

    #[test]
    fn test_short_keys_match_whole_tokens() {
        let cases = [
            ("SBL123456", Category::SpamSource),
            ("SBL-12345", Category::SpamSource),
            ("c2-server", Category::BotnetC2),
            ("XBL/CBL", Category::CompromisedHost),
            ("tor-exit", Category::ProxyVpn),
            ("CNC_node", Category::BotnetC2),
            ("pbl 7731", Category::MailReputation),
        ];
        for (raw, expected) in cases {
            assert_eq!(categorize_indicator(raw), Some(expected), "{raw}");
        }
    }

    #[test]
    fn test_short_keys_do_not_match_inside_words() {
        for raw in ["torrent-site", "historic", "sblx", "c2x9"] {
            assert_eq!(categorize_indicator(raw), Some(Category::UnknownThreat), "{raw}");
        }
    }

    #[test]
    fn test_unknown_indicators_fall_back() {
        let result = abstract_categories(&["some_random_indicator", "another_unknown"]);
        assert_eq!(result, vec![Category::UnknownThreat]);
    }

    #[test]
    fn test_blank_indicators_are_ignored() {
        assert!(abstract_categories::<&str>(&[]).is_empty());
        assert!(abstract_categories(&["", "--"]).is_empty());
    }

    #[test]
    fn test_recognized_indicators_never_pass_through() {
        for (key, _) in KEYWORD_TABLE {
            let category = categorize_indicator(key).unwrap();
            assert_ne!(category.as_str(), *key);
            assert!(Category::ALL.contains(&category));
            assert_eq!(categorize_indicator(&key.to_uppercase()), Some(category));
        }
    }

    #[test]
    fn test_derive_verdict_thresholds() {
        assert_eq!(derive_verdict(&[Category::BotnetC2], 0.8), Verdict::High);
        assert_eq!(derive_verdict(&[Category::ExploitKit], 0.5), Verdict::Medium);
        assert_eq!(derive_verdict(&[Category::PhishingRisk], 0.7), Verdict::Medium);
        assert_eq!(derive_verdict(&[Category::NewlyObserved], 0.35), Verdict::Low);
        assert_eq!(derive_verdict(&[], 0.9), Verdict::Unknown);
        assert_eq!(derive_verdict(&[Category::SpamSource], 0.1), Verdict::Unknown);
    }

    #[test]
    fn test_reasons_are_compliant() {
        let reasons = generate_reasons(&Category::ALL);
        assert_eq!(reasons.len(), Category::ALL.len());
        assert_no_disallowed_fields(&reasons, "reason dictionary");

        let reasons = generate_reasons(&[Category::SpamSource, Category::BotnetC2]);
        assert!(reasons.iter().any(|r| r.contains("spam")));
        assert!(reasons.iter().any(|r| r.contains("botnet")));
    }

    #[test]
    fn test_confidence_is_capped() {
        assert_eq!(compute_confidence(0, 0), 0.0);
        assert_eq!(compute_confidence(2, 2), 0.8);
        assert_eq!(compute_confidence(10, 10), MAX_CONFIDENCE);
    }

    #[test]
    fn test_evidence_is_bucketed() {
        let now = Utc::now();
        let observation = RawObservation {
            indicators: vec!["SBL-12345".to_string()],
            listed: true,
            country_code: Some("us".to_string()),
            has_network_owner: true,
            first_seen: Some(now - Duration::days(14)),
            last_seen: Some(now - Duration::days(2)),
        };

        let evidence = sanitize_evidence(&observation, now);
        let lookup = |key: &str| {
            evidence
                .iter()
                .find(|e| e.key == key)
                .map(|e| e.value.clone())
        };

        assert_eq!(lookup("threat_detected").as_deref(), Some("true"));
        assert_eq!(lookup("country_code").as_deref(), Some("US"));
        assert_eq!(lookup("has_network_info").as_deref(), Some("true"));
        assert_eq!(lookup("first_observed").as_deref(), Some("recent"));
        assert_eq!(lookup("last_activity").as_deref(), Some("active"));
        assert_no_disallowed_fields(&evidence, "sanitize_evidence output");
    }

    #[test]
    fn test_evidence_drops_malformed_country() {
        let observation = RawObservation {
            country_code: Some("SBL".to_string()),
            ..Default::default()
        };
        let evidence = sanitize_evidence(&observation, Utc::now());
        assert!(evidence.iter().all(|e| e.key != "country_code"));
    }

    #[test]
    fn test_botnet_observation_is_high() {
        let observation = RawObservation {
            indicators: vec!["botnet".to_string(), "c2".to_string()],
            listed: true,
            ..Default::default()
        };

        let outcome = abstract_observation(&observation, Utc::now());
        assert!(outcome.categories.contains(&Category::BotnetC2));
        assert!(outcome.confidence >= 0.7);
        assert_eq!(outcome.verdict, Verdict::High);
    }

    #[test]
    fn test_unlisted_observation_is_clean() {
        let outcome = abstract_observation(&RawObservation::default(), Utc::now());
        assert_eq!(outcome, AbstractedOutcome::clean());
    }

    #[test]
    fn test_listed_without_indicators_is_unclassified() {
        let observation = RawObservation {
            listed: true,
            ..Default::default()
        };
        let outcome = abstract_observation(&observation, Utc::now());
        assert_eq!(outcome.categories, vec![Category::UnknownThreat]);
    }

    #[test]
    fn test_passive_activity_levels() {
        let quiet = abstract_passive_activity(0);
        assert!(quiet.categories.is_empty());
        assert_eq!(quiet.evidence[0].value, "low");

        let busy = abstract_passive_activity(80);
        assert_eq!(busy.verdict, Verdict::Medium);
        assert_eq!(busy.categories, vec![Category::NewlyObserved]);
        assert_eq!(busy.confidence, 0.8);
        assert_eq!(busy.evidence[0].value, "high");
    }

    #[test]
    fn test_into_signal_carries_target() {
        let target = Target {
            target_type: TargetType::Ip,
            value: "8.8.8.8".to_string(),
        };
        let signal = AbstractedOutcome::clean().into_signal("threat_reputation", &target, Utc::now());
        assert_eq!(signal.input_value, "8.8.8.8");
        assert!(!signal.cache_hit);
        assert_no_disallowed_fields(&signal, "clean signal");
    }
}
