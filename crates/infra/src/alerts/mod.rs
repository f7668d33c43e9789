//! Threshold alerts: scanning, single-flight locking, delivery and scheduling.

pub mod engine;
pub mod lock;
pub mod notifier;
pub mod scheduler;

pub use engine::{AlertEngine, AlertScan, ScanOutcome};
pub use lock::{InMemoryTenantLock, PostgresTenantLock, TenantLock, TenantLockGuard};
pub use notifier::{InMemoryNotifier, Notification, Notifier, NotifyError, TracingNotifier};
pub use scheduler::{AlertScheduler, AlertSchedulerHandle};
