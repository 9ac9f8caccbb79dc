//! Supplier directory. Independent of stock: nothing here touches balances.

use tracing::{info, instrument};

use stockflow_core::RequestContext;
use stockflow_inventory::{Supplier, SupplierDetails, SupplierId};

use crate::config::RetryPolicy;
use crate::error::EngineError;
use crate::reconciliation::finish;
use crate::retry::with_retry;
use crate::store::{InventoryStore, StoreTx};

pub struct SupplierDirectory<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> SupplierDirectory<S>
where
    S: InventoryStore,
{
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// All suppliers, id ascending.
    pub async fn list(&self) -> Result<Vec<Supplier>, EngineError> {
        Ok(self.store.suppliers().await?)
    }

    #[instrument(skip(self, ctx, details), fields(actor = %ctx.actor()), err)]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        details: SupplierDetails,
    ) -> Result<Supplier, EngineError> {
        let supplier = Supplier::new(SupplierId::generate(), details)?;
        let supplier_ref = &supplier;
        with_retry(self.retry, "create_supplier", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = tx.put_supplier(supplier_ref).await.map_err(EngineError::from);
            finish(tx, outcome).await
        })
        .await?;
        info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self, ctx, details), fields(actor = %ctx.actor(), supplier_id = %id), err)]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: SupplierId,
        details: SupplierDetails,
    ) -> Result<Supplier, EngineError> {
        let details = &details;
        with_retry(self.retry, "update_supplier", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = update_in_tx(tx.as_mut(), id, details).await;
            finish(tx, outcome).await
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.actor(), supplier_id = %id), err)]
    pub async fn delete(&self, ctx: &RequestContext, id: SupplierId) -> Result<(), EngineError> {
        with_retry(self.retry, "delete_supplier", move || async move {
            let mut tx = self.store.begin().await?;
            let outcome = delete_in_tx(tx.as_mut(), id).await;
            finish(tx, outcome).await
        })
        .await?;
        info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }
}

async fn update_in_tx(
    tx: &mut dyn StoreTx,
    id: SupplierId,
    details: &SupplierDetails,
) -> Result<Supplier, EngineError> {
    let mut supplier = tx
        .lock_supplier(id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("supplier {id}")))?;
    supplier.update(details.clone())?;
    tx.put_supplier(&supplier).await?;
    Ok(supplier)
}

async fn delete_in_tx(tx: &mut dyn StoreTx, id: SupplierId) -> Result<(), EngineError> {
    if !tx.remove_supplier(id).await? {
        return Err(EngineError::not_found(format!("supplier {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::ActorId;

    use crate::store::InMemoryInventoryStore;

    fn details(name: &str) -> SupplierDetails {
        SupplierDetails {
            name: name.to_string(),
            phone: "0812".to_string(),
            note: String::new(),
        }
    }

    fn directory() -> SupplierDirectory<InMemoryInventoryStore> {
        SupplierDirectory::new(InMemoryInventoryStore::new(), RetryPolicy::default())
    }

    #[tokio::test]
    async fn create_update_delete_round() {
        let dir = directory();
        let ctx = RequestContext::new(ActorId::new());

        let created = dir.create(&ctx, details("CV Maju")).await.unwrap();
        let updated = dir.update(&ctx, created.id, details("CV Maju Jaya")).await.unwrap();
        assert_eq!(updated.name, "CV Maju Jaya");
        assert_eq!(dir.list().await.unwrap(), vec![updated]);

        dir.delete(&ctx, created.id).await.unwrap();
        assert!(dir.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_supplier_is_not_found() {
        let dir = directory();
        let ctx = RequestContext::new(ActorId::new());
        let id = SupplierId::generate();

        assert!(matches!(
            dir.update(&ctx, id, details("x")).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(dir.delete(&ctx, id).await, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn blank_name_is_invalid_input() {
        let dir = directory();
        let ctx = RequestContext::new(ActorId::new());
        assert!(matches!(
            dir.create(&ctx, details("   ")).await,
            Err(EngineError::InvalidInput(_))
        ));
    }
}
