//! HTTP clients for external intelligence providers

pub mod breach_lookup;
pub mod ip_abuse;
pub mod leak_search;
pub mod reputation;
pub mod traits;

pub use breach_lookup::BreachLookupAdapter;
pub use ip_abuse::IpAbuseAdapter;
pub use leak_search::LeakSearchAdapter;
pub use reputation::{ReputationClient, TokenManager};
pub use traits::ProviderAdapter;
