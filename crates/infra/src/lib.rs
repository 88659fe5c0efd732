//! Infrastructure layer: storage, configuration and the application services
//! built on top of them.

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod profiles;
pub mod seed;
pub mod store;

pub use accounts::{AccountError, AccountService, Registration, RoleSelector, Session};
pub use catalog::CourseCatalog;
pub use config::{AppConfig, ConfigError, Environment};
pub use ledger::{EnrollmentLedger, LedgerError};
pub use profiles::{ProfileError, ProfileService, Promotion};
pub use seed::seed_roles;
pub use store::{AccountRoles, PostgresStore, RoleRecord, StoreError, StoreResult, Stores};
