//! Postgres-backed balance-and-ledger store.
//!
//! ## Locking
//!
//! `lock_items` issues `SELECT ... WHERE id = ANY($1) ORDER BY id FOR UPDATE`,
//! so every transaction acquires item row locks in ascending id order. Balance
//! writes are compare-and-set on `version` on top of the row lock.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (serialization failure) | `40001` | `Concurrency` | Transaction aborted to keep serializability |
//! | Database (deadlock detected) | `40P01` | `Concurrency` | Lock cycle broken by the server |
//! | Database (unique violation) | `23505` | `Constraint` | Duplicate id |
//! | Database (foreign key violation) | `23503` | `Constraint` | Movement references a missing item, or item still referenced |
//! | Database (check constraint violation) | `23514` | `Constraint` | Negative balance or non-positive quantity reached the table |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Io / Tls / other | N/A | `Backend` | Connection failures |

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockflow_core::{ActorId, EntityId, ExpectedVersion};
use stockflow_inventory::{
    InboundMovement, Item, ItemId, Movement, MovementId, MovementKind, OutboundMovement, Quantity,
    Supplier, SupplierId,
};

use super::r#trait::{InventoryStore, StoreError, StoreTx};

/// Tables and indexes; every statement is idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    balance BIGINT NOT NULL CHECK (balance >= 0),
    version BIGINT NOT NULL CHECK (version >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS inbound_movements (
    id UUID PRIMARY KEY,
    item_id UUID NOT NULL REFERENCES items (id) ON DELETE RESTRICT,
    movement_date DATE NOT NULL,
    quantity BIGINT NOT NULL CHECK (quantity > 0),
    note TEXT NOT NULL DEFAULT '',
    recorded_by UUID NOT NULL
);

CREATE TABLE IF NOT EXISTS outbound_movements (
    id UUID PRIMARY KEY,
    item_id UUID NOT NULL REFERENCES items (id) ON DELETE RESTRICT,
    movement_date DATE NOT NULL,
    recipient TEXT NOT NULL,
    quantity BIGINT NOT NULL CHECK (quantity > 0),
    recorded_by UUID NOT NULL
);

CREATE INDEX IF NOT EXISTS inbound_movements_item_idx ON inbound_movements (item_id);
CREATE INDEX IF NOT EXISTS outbound_movements_item_idx ON outbound_movements (item_id);

CREATE TABLE IF NOT EXISTS suppliers (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT NOT NULL DEFAULT '',
    note TEXT NOT NULL DEFAULT ''
);
"#;

const ITEM_COLUMNS: &str = "id, name, description, balance, version";
const INBOUND_SELECT: &str =
    "SELECT 'inbound' AS kind, id, item_id, movement_date, quantity, note AS detail, recorded_by FROM inbound_movements";
const OUTBOUND_SELECT: &str =
    "SELECT 'outbound' AS kind, id, item_id, movement_date, quantity, recipient AS detail, recorded_by FROM outbound_movements";

/// Postgres-backed inventory store.
///
/// `Send + Sync`; all work goes through the SQLx connection pool. Each
/// [`StoreTx`] it hands out owns one pooled connection inside a database
/// transaction until committed or rolled back (dropping it rolls back).
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_movements(
        &self,
        operation: &'static str,
        sql: String,
        item_id: Option<ItemId>,
    ) -> Result<Vec<Movement>, StoreError> {
        let mut query = sqlx::query(&sql);
        if let Some(item_id) = item_id {
            query = query.bind(uuid_of(item_id.0));
        }
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(movement_from_row).collect()
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(uuid_of(id.0))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(uuids_of(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("items_by_ids", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        let row = sqlx::query(&format!(
            "{INBOUND_SELECT} WHERE id = $1 UNION ALL {OUTBOUND_SELECT} WHERE id = $1"
        ))
        .bind(uuid_of(id.0))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement", e))?;
        row.as_ref().map(movement_from_row).transpose()
    }

    #[instrument(skip(self), fields(kind = %kind), err)]
    async fn movements(&self, kind: MovementKind) -> Result<Vec<Movement>, StoreError> {
        let select = match kind {
            MovementKind::Inbound => INBOUND_SELECT,
            MovementKind::Outbound => OUTBOUND_SELECT,
        };
        self.fetch_movements("movements", format!("{select} ORDER BY id DESC"), None)
            .await
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn movements_for_item(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        self.fetch_movements(
            "movements_for_item",
            format!(
                "{INBOUND_SELECT} WHERE item_id = $1 UNION ALL {OUTBOUND_SELECT} WHERE item_id = $1 ORDER BY id DESC"
            ),
            Some(item_id),
        )
        .await
    }

    #[instrument(skip(self), err)]
    async fn suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let rows = sqlx::query("SELECT id, name, phone, note FROM suppliers ORDER BY id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("suppliers", e))?;
        rows.iter().map(supplier_from_row).collect()
    }
}

/// One database transaction.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn lock_items(&mut self, ids: &[ItemId]) -> Result<BTreeMap<ItemId, Item>, StoreError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        ))
        .bind(uuids_of(ids))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_items", e))?;

        let mut items = BTreeMap::new();
        for row in &rows {
            let item = item_from_row(row)?;
            items.insert(item.id_typed(), item);
        }
        Ok(items)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id_typed()), err)]
    async fn insert_item(&mut self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, description, balance, version)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(uuid_of(item.id_typed().0))
        .bind(item.name())
        .bind(item.description())
        .bind(item.balance())
        .bind(version_to_db(item.version())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, item),
        fields(item_id = %item.id_typed(), balance = item.balance(), expected = ?expected),
        err
    )]
    async fn write_item(&mut self, item: &Item, expected: ExpectedVersion) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = $2, description = $3, balance = $4, version = $5, updated_at = NOW()
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(uuid_of(item.id_typed().0))
        .bind(item.name())
        .bind(item.description())
        .bind(item.balance())
        .bind(version_to_db(item.version())?)
        .bind(version_to_db(expected.version())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Concurrency(format!(
                "item {}: expected {expected:?}, row changed or no longer exists",
                item.id_typed()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&mut self, id: ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(uuid_of(id.0))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn count_movements_for_item(&mut self, id: ItemId) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM inbound_movements WHERE item_id = $1)
              + (SELECT COUNT(*) FROM outbound_movements WHERE item_id = $1) AS total
            "#,
        )
        .bind(uuid_of(id.0))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_movements_for_item", e))?;
        let total: i64 = row.try_get("total").map_err(corrupt)?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn lock_movement(&mut self, id: MovementId) -> Result<Option<Movement>, StoreError> {
        // FOR UPDATE is not allowed on a UNION; probe each ledger in turn.
        for select in [INBOUND_SELECT, OUTBOUND_SELECT] {
            let row = sqlx::query(&format!("{select} WHERE id = $1 FOR UPDATE"))
                .bind(uuid_of(id.0))
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("lock_movement", e))?;
            if let Some(row) = row {
                return movement_from_row(&row).map(Some);
            }
        }
        Ok(None)
    }

    #[instrument(
        skip(self, movement),
        fields(movement_id = %movement.id_typed(), kind = %movement.kind()),
        err
    )]
    async fn put_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        let query = match movement {
            Movement::Inbound(m) => sqlx::query(
                r#"
                INSERT INTO inbound_movements (id, item_id, movement_date, quantity, note, recorded_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    item_id = EXCLUDED.item_id,
                    movement_date = EXCLUDED.movement_date,
                    quantity = EXCLUDED.quantity,
                    note = EXCLUDED.note,
                    recorded_by = EXCLUDED.recorded_by
                "#,
            )
            .bind(uuid_of(m.id.0))
            .bind(uuid_of(m.item_id.0))
            .bind(m.date)
            .bind(m.quantity.get())
            .bind(&m.note)
            .bind(*m.recorded_by.as_uuid()),
            Movement::Outbound(m) => sqlx::query(
                r#"
                INSERT INTO outbound_movements (id, item_id, movement_date, recipient, quantity, recorded_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    item_id = EXCLUDED.item_id,
                    movement_date = EXCLUDED.movement_date,
                    recipient = EXCLUDED.recipient,
                    quantity = EXCLUDED.quantity,
                    recorded_by = EXCLUDED.recorded_by
                "#,
            )
            .bind(uuid_of(m.id.0))
            .bind(uuid_of(m.item_id.0))
            .bind(m.date)
            .bind(&m.recipient)
            .bind(m.quantity.get())
            .bind(*m.recorded_by.as_uuid()),
        };
        query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("put_movement", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn remove_movement(&mut self, id: MovementId) -> Result<bool, StoreError> {
        for table in ["inbound_movements", "outbound_movements"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
                .bind(uuid_of(id.0))
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("remove_movement", e))?;
            if result.rows_affected() > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn lock_supplier(&mut self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query("SELECT id, name, phone, note FROM suppliers WHERE id = $1 FOR UPDATE")
            .bind(uuid_of(id.0))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_supplier", e))?;
        row.as_ref().map(supplier_from_row).transpose()
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn put_supplier(&mut self, supplier: &Supplier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, note)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                note = EXCLUDED.note
            "#,
        )
        .bind(uuid_of(supplier.id.0))
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.note)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("put_supplier", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn remove_supplier(&mut self, id: SupplierId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(uuid_of(id.0))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("remove_supplier", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn uuid_of(id: EntityId) -> Uuid {
    *id.as_uuid()
}

fn uuids_of(ids: &[ItemId]) -> Vec<Uuid> {
    ids.iter().map(|id| uuid_of(id.0)).collect()
}

fn version_to_db(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} out of range")))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let name: String = row.try_get("name").map_err(corrupt)?;
    let description: String = row.try_get("description").map_err(corrupt)?;
    let balance: i64 = row.try_get("balance").map_err(corrupt)?;
    let version: i64 = row.try_get("version").map_err(corrupt)?;
    let version = u64::try_from(version)
        .map_err(|_| StoreError::Corrupt(format!("item {id} has negative version {version}")))?;
    Ok(Item::restore(
        ItemId::new(EntityId::from_uuid(id)),
        name,
        description,
        balance,
        version,
    ))
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    let kind: String = row.try_get("kind").map_err(corrupt)?;
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let item_id: Uuid = row.try_get("item_id").map_err(corrupt)?;
    let date: NaiveDate = row.try_get("movement_date").map_err(corrupt)?;
    let quantity: i64 = row.try_get("quantity").map_err(corrupt)?;
    let detail: String = row.try_get("detail").map_err(corrupt)?;
    let recorded_by: Uuid = row.try_get("recorded_by").map_err(corrupt)?;

    let id = MovementId::new(EntityId::from_uuid(id));
    let item_id = ItemId::new(EntityId::from_uuid(item_id));
    let quantity = Quantity::new(quantity).map_err(|e| StoreError::Corrupt(format!("movement {id}: {e}")))?;
    let recorded_by = ActorId::from_uuid(recorded_by);

    let kind: MovementKind = kind
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("movement {id}: {e}")))?;
    Ok(match kind {
        MovementKind::Inbound => Movement::Inbound(InboundMovement {
            id,
            item_id,
            date,
            quantity,
            note: detail,
            recorded_by,
        }),
        MovementKind::Outbound => Movement::Outbound(OutboundMovement {
            id,
            item_id,
            date,
            recipient: detail,
            quantity,
            recorded_by,
        }),
    })
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, StoreError> {
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let name: String = row.try_get("name").map_err(corrupt)?;
    let phone: String = row.try_get("phone").map_err(corrupt)?;
    let note: String = row.try_get("note").map_err(corrupt)?;
    Ok(Supplier {
        id: SupplierId::new(EntityId::from_uuid(id)),
        name,
        phone,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_guards_balance_and_quantity() {
        assert!(SCHEMA.contains("CHECK (balance >= 0)"));
        assert_eq!(SCHEMA.matches("CHECK (quantity > 0)").count(), 2);
        assert_eq!(SCHEMA.matches("ON DELETE RESTRICT").count(), 2);
    }

    #[test]
    fn version_conversion_rejects_overflow() {
        assert_eq!(version_to_db(7).unwrap(), 7);
        assert!(matches!(version_to_db(u64::MAX), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn pool_closed_maps_to_backend() {
        assert!(matches!(
            map_sqlx_error("items", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
    }
}
