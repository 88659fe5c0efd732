//! Service wiring shared by all handlers.

use std::sync::Arc;

use learnhub_auth::{PasswordHasher, TokenService};
use learnhub_infra::{AccountService, AppConfig, CourseCatalog, EnrollmentLedger, ProfileService, Stores};

pub struct AppServices {
    pub accounts: AccountService,
    pub profiles: ProfileService,
    pub catalog: CourseCatalog,
    pub ledger: EnrollmentLedger,
}

impl AppServices {
    pub fn new(stores: &Stores, tokens: Arc<TokenService>, config: &AppConfig) -> Self {
        Self {
            accounts: AccountService::new(
                stores,
                PasswordHasher::new(config.bcrypt_cost),
                tokens,
                config.allow_admin_signup,
            ),
            profiles: ProfileService::new(stores),
            catalog: CourseCatalog::new(stores),
            ledger: EnrollmentLedger::new(stores, config.capacity),
        }
    }
}
