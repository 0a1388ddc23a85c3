use crate::{error::*, models::*, resolver::IdentityResolver};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredAccount {
    principal: Principal,
    identifier: String,
    secret_hash: String,
}

/// In-memory identity store for development and tests.
///
/// Secrets are argon2-hashed like the real store's would be; nothing about
/// the hashing scheme leaks into the gateway, which only sees the
/// `IdentityResolver` contract.
pub struct InMemoryIdentityStore {
    accounts: Arc<RwLock<HashMap<Uuid, StoredAccount>>>,
    argon2: Argon2<'static>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            argon2: Argon2::default(),
        }
    }

    /// Register a principal with its login identifier and secret.
    pub async fn seed(&self, principal: Principal, identifier: &str, secret: &str) -> Result<()> {
        let secret_hash = self.hash_secret(secret)?;
        let account = StoredAccount {
            principal: principal.clone(),
            identifier: identifier.to_string(),
            secret_hash,
        };
        self.accounts.write().await.insert(principal.id, account);
        Ok(())
    }

    /// Overwrite a principal's stored status, e.g. to suspend an account.
    pub async fn set_status(&self, id: Uuid, status: PrincipalStatus) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(IdentityError::PrincipalNotFound)?;
        account.principal.status = status;
        Ok(())
    }

    /// Overwrite a principal's organization type.
    pub async fn set_organization_type(
        &self,
        id: Uuid,
        organization_type: Option<OrganizationType>,
    ) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(IdentityError::PrincipalNotFound)?;
        account.principal.organization_type = organization_type;
        Ok(())
    }

    fn hash_secret(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|_| IdentityError::HashingError)?
            .to_string();
        Ok(hash)
    }

    fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|_| IdentityError::HashingError)?;
        Ok(self
            .argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityStore {
    async fn lookup(&self, id: Uuid, principal_type: PrincipalType) -> Result<Option<Principal>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(&id)
            .filter(|a| a.principal.principal_type == principal_type)
            .map(|a| a.principal.clone()))
    }

    async fn verify_credentials(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Option<Principal>> {
        // Snapshot the hash under the read lock, verify outside it.
        let candidate = {
            let accounts = self.accounts.read().await;
            accounts
                .values()
                .find(|a| a.identifier == identifier)
                .map(|a| (a.principal.clone(), a.secret_hash.clone()))
        };

        match candidate {
            Some((principal, hash)) if self.verify_secret(secret, &hash)? => Ok(Some(principal)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_user() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            principal_type: PrincipalType::OrgUser,
            role: "company_admin".to_string(),
            organization_type: Some(OrganizationType::Manufacturer),
            permissions: vec!["orders.read".to_string()],
            status: PrincipalStatus::Active,
        }
    }

    #[tokio::test]
    async fn verify_credentials_accepts_correct_secret() {
        let store = InMemoryIdentityStore::new();
        let p = org_user();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        let found = store.verify_credentials("a@b.com", "validpass").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(p.id));
    }

    #[tokio::test]
    async fn verify_credentials_is_non_enumerating() {
        let store = InMemoryIdentityStore::new();
        store.seed(org_user(), "a@b.com", "validpass").await.unwrap();

        // Wrong secret and unknown identifier are indistinguishable.
        assert!(store.verify_credentials("a@b.com", "wrong").await.unwrap().is_none());
        assert!(store.verify_credentials("nobody@b.com", "validpass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_respects_type_namespace() {
        let store = InMemoryIdentityStore::new();
        let p = org_user();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        assert!(store.lookup(p.id, PrincipalType::OrgUser).await.unwrap().is_some());
        assert!(store.lookup(p.id, PrincipalType::Admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_updates_are_visible_on_next_lookup() {
        let store = InMemoryIdentityStore::new();
        let p = org_user();
        store.seed(p.clone(), "a@b.com", "validpass").await.unwrap();

        store.set_status(p.id, PrincipalStatus::Suspended).await.unwrap();
        let found = store.lookup(p.id, PrincipalType::OrgUser).await.unwrap().unwrap();
        assert!(!found.is_active());
    }
}
