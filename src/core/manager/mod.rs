//! Per-service component managers
//!
//! Each manager owns the strategy objects of every service behind an
//! atomically swapped table. Reconfiguration builds a complete new table and
//! swaps it in, so in-flight requests keep the table they loaded and a failed
//! update leaves the previous one untouched.

mod cleanup;
mod load_balancer;
mod rate_limiter;


pub use cleanup::RateLimiterCleanup;
pub use load_balancer::LoadBalancerManager;
pub use rate_limiter::{RateLimiterManager, RateLimiterStatus};
