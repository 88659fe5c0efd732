//! Registration, login and administrative role changes.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use learnhub_auth::{
    Account, AccountDraft, DisplayClaims, IssuedToken, PasswordError, PasswordHasher, Role, RoleSet, TokenError,
    TokenService, normalize_email, validate_registration,
};
use learnhub_core::{AccountId, DomainError, RoleId, StudentId};
use learnhub_learning::NewStudent;

use crate::store::{AccountStore, RoleRecord, RoleStore, StoreError, Stores, StudentStore};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(DomainError),

    #[error("email is already in use")]
    EmailInUse,

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("role '{0}' cannot be selected at registration")]
    RoleNotSelectable(Role),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account {0} not found")]
    NotFound(AccountId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("blocking task failed: {0}")]
    Blocking(String),
}

/// How a registrant picks their initial role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSelector {
    Id(RoleId),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<RoleSelector>,
}

/// An account together with a freshly issued session token.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub token: IssuedToken,
}

/// Failure of the best-effort student profile step after registration.
#[derive(Debug, Error)]
enum ProvisionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    roles: Arc<dyn RoleStore>,
    students: Arc<dyn StudentStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    allow_admin_signup: bool,
}

impl AccountService {
    pub fn new(stores: &Stores, hasher: PasswordHasher, tokens: Arc<TokenService>, allow_admin_signup: bool) -> Self {
        Self {
            accounts: stores.accounts.clone(),
            roles: stores.roles.clone(),
            students: stores.students.clone(),
            hasher,
            tokens,
            allow_admin_signup,
        }
    }

    #[instrument(skip(self, registration), fields(email = %registration.email), err)]
    pub async fn register(&self, registration: Registration) -> Result<Session, AccountError> {
        validate_registration(&registration.username, &registration.email, &registration.password)
            .map_err(AccountError::Validation)?;

        let email = normalize_email(&registration.email);
        if self.accounts.exists_by_email(&email).await? {
            warn!("registration rejected: email in use");
            return Err(AccountError::EmailInUse);
        }

        let role = self.resolve_role(registration.role.as_ref()).await?;
        let password_hash = self.hash(registration.password).await?;

        let draft = AccountDraft::new(&registration.username, &email, password_hash, RoleSet::single(role.name));
        let account = self.accounts.save(draft).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => AccountError::EmailInUse,
            other => AccountError::Store(other),
        })?;
        info!(account_id = %account.id, role = %role.name, "account registered");

        if account.roles.contains(Role::User) {
            self.provision_student(&account).await;
        }

        let token = self.issue(&account)?;
        Ok(Session { account, token })
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AccountError> {
        let Some(account) = self.accounts.find_by_email(&normalize_email(email)).await? else {
            warn!("login rejected: unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        if !self.verify(password.to_string(), &account).await? {
            warn!(account_id = %account.id, "login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.issue(&account)?;
        info!(account_id = %account.id, "login succeeded");
        Ok(Session { account, token })
    }

    /// Replace the role set of an account (administrative action).
    #[instrument(skip(self), err)]
    pub async fn assign_roles(&self, account_id: AccountId, roles: RoleSet) -> Result<Account, AccountError> {
        if roles.is_empty() {
            return Err(AccountError::Validation(DomainError::validation(
                "an account must hold at least one role",
            )));
        }
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AccountError::NotFound(account_id))?;

        let mut draft = AccountDraft::from(account);
        draft.roles = roles;
        let updated = self.accounts.save(draft).await?;
        info!(account_id = %updated.id, roles = ?updated.roles.names(), "roles replaced");
        Ok(updated)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, AccountError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AccountError::NotFound(account_id))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AccountError> {
        Ok(self.accounts.list().await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleRecord>, AccountError> {
        Ok(self.roles.list().await?)
    }

    async fn resolve_role(&self, selector: Option<&RoleSelector>) -> Result<RoleRecord, AccountError> {
        let record = match selector {
            None => self
                .roles
                .find_by_name(Role::User)
                .await?
                .ok_or_else(|| AccountError::RoleNotFound(Role::User.to_string()))?,
            Some(RoleSelector::Id(id)) => self
                .roles
                .find_by_id(*id)
                .await?
                .ok_or_else(|| AccountError::RoleNotFound(id.to_string()))?,
            Some(RoleSelector::Name(name)) => {
                let role: Role = name.parse().map_err(|_| AccountError::RoleNotFound(name.clone()))?;
                self.roles
                    .find_by_name(role)
                    .await?
                    .ok_or_else(|| AccountError::RoleNotFound(name.clone()))?
            }
        };

        if record.name == Role::Admin && !self.allow_admin_signup {
            warn!("registration rejected: ADMIN is not self-selectable");
            return Err(AccountError::RoleNotSelectable(Role::Admin));
        }
        Ok(record)
    }

    async fn hash(&self, password: String) -> Result<learnhub_auth::PasswordHash, AccountError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Blocking(e.to_string()))?
            .map_err(AccountError::from)
    }

    async fn verify(&self, password: String, account: &Account) -> Result<bool, AccountError> {
        let hasher = self.hasher;
        let hash = account.password_hash.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AccountError::Blocking(e.to_string()))?
            .map_err(AccountError::from)
    }

    fn issue(&self, account: &Account) -> Result<IssuedToken, AccountError> {
        Ok(self
            .tokens
            .issue(account.id, DisplayClaims::new(&account.email, &account.username))?)
    }

    /// Best effort: the account is already committed, so failures are only logged.
    async fn provision_student(&self, account: &Account) {
        match self.try_provision_student(account).await {
            Ok(Provisioned::Created(id)) => info!(account_id = %account.id, student_id = %id, "student profile created"),
            Ok(Provisioned::Linked(id)) => {
                info!(account_id = %account.id, student_id = %id, "existing student profile linked to account")
            }
            Ok(Provisioned::OwnedElsewhere(id)) => warn!(
                account_id = %account.id,
                student_id = %id,
                "student profile with this email belongs to another account"
            ),
            Err(e) => warn!(
                account_id = %account.id,
                error = %e,
                "student profile provisioning failed; registration kept"
            ),
        }
    }

    /// A profile created ahead of time (e.g. by an admin) under the same
    /// email and without an account is claimed by the new account.
    async fn try_provision_student(&self, account: &Account) -> Result<Provisioned, ProvisionError> {
        if let Some(existing) = self.students.find_by_email(&account.email).await? {
            if existing.account_id.is_some() {
                return Ok(Provisioned::OwnedElsewhere(existing.id));
            }
            return match self.students.link_account(existing.id, account.id).await? {
                Some(linked) => Ok(Provisioned::Linked(linked.id)),
                None => Ok(Provisioned::OwnedElsewhere(existing.id)),
            };
        }
        let student = NewStudent::new(&account.username, &account.email, Some(account.id));
        student.validate()?;
        let created = self.students.insert(student).await?;
        Ok(Provisioned::Created(created.id))
    }
}

enum Provisioned {
    Created(StudentId),
    Linked(StudentId),
    OwnedElsewhere(StudentId),
}
