//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod log_notifier;
pub mod rate_limiter;
pub mod scheduled_tasks;
pub mod store;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ServerDeps, TwilioAdapter};
pub use log_notifier::LogNotifier;
pub use rate_limiter::{create_rate_limiter, KeyedRateLimiter, NoopRateLimiter};
pub use scheduled_tasks::{run_sweep, start_scheduler, DEFAULT_SWEEP_SCHEDULE};
pub use store::{connect_store, InMemoryChallengeStore, PostgresChallengeStore};
pub use test_dependencies::TestDependencies;
pub use traits::*;
