//! Startup role seeding.

use tracing::{info, instrument};

use learnhub_auth::Role;

use crate::store::{RoleRecord, RoleStore, StoreResult};

/// Find-or-create one row per [`Role`]. Idempotent, and safe to run from
/// several replicas at once because the store enforces UNIQUE(name).
#[instrument(skip(roles), err)]
pub async fn seed_roles(roles: &dyn RoleStore) -> StoreResult<Vec<RoleRecord>> {
    let mut seeded = Vec::with_capacity(Role::ALL.len());
    for role in Role::ALL {
        seeded.push(roles.find_or_create(role).await?);
    }
    info!(count = seeded.len(), "roles seeded");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::store::Stores;

    #[tokio::test]
    async fn seeding_twice_concurrently_yields_three_rows() {
        let stores = Stores::in_memory();
        let (a, b) = tokio::join!(seed_roles(stores.roles.as_ref()), seed_roles(stores.roles.as_ref()));
        assert_eq!(a.unwrap(), b.unwrap());

        let rows = stores.roles.list().await.unwrap();
        assert_eq!(rows.len(), 3);
        let ids: HashSet<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
        let names: HashSet<_> = rows.iter().map(|r| r.name).collect();
        assert_eq!(names, Role::ALL.into_iter().collect());
    }

    #[tokio::test]
    async fn reseeding_keeps_existing_ids() {
        let stores = Stores::in_memory();
        let first = seed_roles(stores.roles.as_ref()).await.unwrap();
        let second = seed_roles(stores.roles.as_ref()).await.unwrap();
        assert_eq!(first, second);
    }
}
