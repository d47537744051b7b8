//! Catalog administration service.

use crate::models::{Card, CardId};
use crate::security::{AccessControl, Identity, Permission};
use crate::storage::{PersistenceMode, PersistenceSwitch, StorageEngine};
use crate::Result;
use std::sync::Arc;
use tracing::instrument;

/// CRUD and administrative operations over the active engine.
///
/// Every call checks the caller's permission first, then resolves the engine
/// through the switch, so a mode switch takes effect on the next call.
pub struct CatalogService {
    switch: Arc<PersistenceSwitch>,
    access: AccessControl,
}

impl CatalogService {
    /// Creates a catalog service with the default access rules.
    #[must_use]
    pub fn new(switch: Arc<PersistenceSwitch>) -> Self {
        Self::with_access(switch, AccessControl::new())
    }

    /// Creates a catalog service with custom access rules.
    #[must_use]
    pub const fn with_access(switch: Arc<PersistenceSwitch>, access: AccessControl) -> Self {
        Self { switch, access }
    }

    /// Returns every card in the active engine.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<Card>> {
        self.access.check(identity, Permission::Read)?;
        self.switch.current().get_all().await
    }

    /// Retrieves a card by id.
    pub async fn get(&self, identity: &Identity, id: &str) -> Result<Option<Card>> {
        self.access.check(identity, Permission::Read)?;
        self.switch.current().get_by_id(&CardId::new(id)).await
    }

    /// Adds a card after validating field limits.
    #[instrument(skip(self, identity, card), fields(operation = "add", subject = %identity.subject))]
    pub async fn add(&self, identity: &Identity, card: Card) -> Result<Card> {
        self.access.check(identity, Permission::Write)?;
        card.validate()?;
        self.switch.current().add(card).await
    }

    /// Replaces a card after validating field limits.
    #[instrument(skip(self, identity, card), fields(operation = "update", subject = %identity.subject))]
    pub async fn update(&self, identity: &Identity, card: Card) -> Result<Card> {
        self.access.check(identity, Permission::Write)?;
        card.validate()?;
        self.switch.current().update(card).await
    }

    /// Deletes a card.
    #[instrument(skip(self, identity), fields(operation = "delete", subject = %identity.subject))]
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<()> {
        self.access.check(identity, Permission::Write)?;
        self.switch.current().delete(&CardId::new(id)).await
    }

    /// Returns the number of cards in the active engine.
    pub async fn count(&self, identity: &Identity) -> Result<usize> {
        self.access.check(identity, Permission::Read)?;
        self.switch.current().count().await
    }

    /// Removes every card from the active engine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Forbidden`] without touching storage unless the
    /// identity holds the admin role.
    #[instrument(skip(self, identity), fields(operation = "clear", subject = %identity.subject))]
    pub async fn clear(&self, identity: &Identity) -> Result<()> {
        self.access.check(identity, Permission::Clear)?;
        let engine = self.switch.current();
        engine.clear().await?;
        tracing::info!(backend = %engine.mode(), "Catalog cleared");
        Ok(())
    }

    /// Activates a persistence mode by name and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Forbidden`] without the switch-mode permission,
    /// [`crate::Error::InvalidInput`] for an unknown mode name and
    /// [`crate::Error::StorageUnavailable`] if the relational engine is unavailable.
    #[instrument(skip(self, identity), fields(operation = "switch_mode", subject = %identity.subject))]
    pub fn switch_mode(&self, identity: &Identity, mode: &str) -> Result<PersistenceMode> {
        self.access.check(identity, Permission::SwitchMode)?;
        let mode: PersistenceMode = mode.parse()?;
        self.switch.switch_mode(mode)
    }

    /// Returns the active persistence mode.
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        self.switch.mode()
    }

    /// Returns the persistence switch.
    #[must_use]
    pub fn switch(&self) -> Arc<PersistenceSwitch> {
        Arc::clone(&self.switch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::security::Role;
    use crate::storage::{InMemoryEngine, RelationalEngine};

    fn memory_service() -> (CatalogService, Arc<InMemoryEngine>) {
        let memory = Arc::new(InMemoryEngine::new());
        let switch = Arc::new(PersistenceSwitch::memory_only(Arc::clone(&memory)));
        (CatalogService::new(switch), memory)
    }

    fn user() -> Identity {
        Identity::new("bob", Role::User)
    }

    #[tokio::test]
    async fn test_clear_requires_admin() {
        let (service, memory) = memory_service();
        service.add(&user(), Card::new("Black Lotus")).await.unwrap();

        let err = service.clear(&user()).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(memory.count().await.unwrap(), 1);

        let admin = Identity::new("root", Role::Admin);
        service.clear(&admin).await.unwrap();
        assert_eq!(memory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_permissions_checked_before_storage() {
        let memory = Arc::new(InMemoryEngine::new());
        let switch = Arc::new(PersistenceSwitch::memory_only(Arc::clone(&memory)));
        // Users may read but not write or switch modes
        let mut access = AccessControl::new();
        access.revoke_permission(Role::User, Permission::Write);
        access.revoke_permission(Role::User, Permission::SwitchMode);
        let service = CatalogService::with_access(switch, access);
        let reader = user();

        let err = service.add(&reader, Card::new("Shock")).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(matches!(service.delete(&reader, "x").await, Err(Error::Forbidden(_))));
        assert!(matches!(
            service.switch_mode(&reader, "relational"),
            Err(Error::Forbidden(_))
        ));
        assert_eq!(memory.count().await.unwrap(), 0);
        assert!(service.list(&reader).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_validates_limits() {
        let (service, _) = memory_service();
        let card = Card::new("Shock").with_mana_cost("{R}".repeat(40));
        assert!(matches!(service.add(&user(), card).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_switch_mode_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let relational = RelationalEngine::open(dir.path().join("cards.db")).unwrap();
        let switch = Arc::new(PersistenceSwitch::new(
            Arc::new(InMemoryEngine::new()),
            Arc::new(relational),
        ));
        let service = CatalogService::new(switch);
        let caller = user();

        service.add(&caller, Card::new("In Memory")).await.unwrap();
        assert_eq!(
            service.switch_mode(&caller, "relational").unwrap(),
            PersistenceMode::Relational
        );
        assert_eq!(service.count(&caller).await.unwrap(), 0);

        assert_eq!(service.switch_mode(&caller, "memory").unwrap(), PersistenceMode::Memory);
        assert_eq!(service.list(&caller).await.unwrap()[0].name, "In Memory");
    }

    #[tokio::test]
    async fn test_switch_mode_rejects_unknown_name() {
        let (service, _) = memory_service();
        assert!(matches!(
            service.switch_mode(&user(), "cloud"),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(service.mode(), PersistenceMode::Memory);
    }

    #[tokio::test]
    async fn test_switch_to_unavailable_relational() {
        let (service, _) = memory_service();
        let err = service.switch_mode(&user(), "relational").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(service.mode(), PersistenceMode::Memory);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let (service, _) = memory_service();
        let err = service.delete(&user(), "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "card 'nope' not found");
    }
}
