//! `PostgreSQL` implementation of [`RemoteCartStore`].
//!
//! # Schema
//!
//! Two tables (see `migrations/0001_cart_tables.sql`):
//!
//! - `carts` - one row per owner, `owner_id` UNIQUE. The uniqueness
//!   constraint is what makes `create_cart` safe under concurrent
//!   callers: `INSERT .. ON CONFLICT (owner_id)` is an atomic
//!   find-or-create, so two racing pushes can never mint two carts for
//!   one identity.
//! - `cart_lines` - keyed by `(cart_id, product_id)`, carrying the
//!   denormalized display snapshot alongside the quantity.
//!
//! All line writes are batched: one `UNNEST` upsert and one `= ANY`
//! delete per push, regardless of cart size.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::Row;
use sqlx::postgres::{PgPoolOptions, PgRow};
use tracing::instrument;
use uuid::Uuid;

use ramen_bae_core::{CurrencyCode, Price, ProductId, RemoteCartId, RemoteLine, UserId};

use super::RemoteCartStore;
use crate::error::RemoteStoreError;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Remote cart store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_remote_line(row: &PgRow) -> Result<RemoteLine, RemoteStoreError> {
    let product_id: String = row.try_get("product_id")?;
    let name: String = row.try_get("name")?;
    let amount: Decimal = row.try_get("unit_price")?;
    let currency: String = row.try_get("currency_code")?;
    let quantity: i32 = row.try_get("quantity")?;
    let image_url: String = row.try_get("image_url")?;
    let slug: String = row.try_get("slug")?;

    let currency_code = CurrencyCode::from_code(&currency).ok_or_else(|| {
        RemoteStoreError::DataCorruption(format!("unknown currency code: {currency}"))
    })?;
    let quantity = u32::try_from(quantity).map_err(|_| {
        RemoteStoreError::DataCorruption(format!("negative quantity in cart line: {quantity}"))
    })?;

    Ok(RemoteLine {
        product_id: ProductId::new(product_id),
        name,
        unit_price: Price::new(amount, currency_code),
        quantity,
        image_url,
        slug,
    })
}

#[async_trait]
impl RemoteCartStore for PgCartStore {
    #[instrument(skip(self), fields(owner = %owner))]
    async fn find_cart(&self, owner: UserId) -> Result<Option<RemoteCartId>, RemoteStoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE owner_id = $1")
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(RemoteCartId::new))
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn create_cart(&self, owner: UserId) -> Result<RemoteCartId, RemoteStoreError> {
        // Atomic find-or-create keyed on the owner uniqueness constraint
        let id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO carts (owner_id)
            VALUES ($1)
            ON CONFLICT (owner_id) DO UPDATE SET updated_at = now()
            RETURNING id
            ",
        )
        .bind(owner.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(RemoteCartId::new(id))
    }

    #[instrument(skip(self), fields(cart = %cart))]
    async fn touch_cart(&self, cart: RemoteCartId) -> Result<(), RemoteStoreError> {
        sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
            .bind(cart.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(cart = %cart))]
    async fn read_lines(&self, cart: RemoteCartId) -> Result<Vec<RemoteLine>, RemoteStoreError> {
        let rows = sqlx::query(
            r"
            SELECT product_id, name, unit_price, currency_code, quantity, image_url, slug
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY product_id
            ",
        )
        .bind(cart.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_remote_line).collect()
    }

    #[instrument(skip(self, lines), fields(cart = %cart, count = lines.len()))]
    async fn upsert_lines(
        &self,
        cart: RemoteCartId,
        lines: &[RemoteLine],
    ) -> Result<(), RemoteStoreError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut product_ids = Vec::with_capacity(lines.len());
        let mut names = Vec::with_capacity(lines.len());
        let mut prices = Vec::with_capacity(lines.len());
        let mut currencies = Vec::with_capacity(lines.len());
        let mut quantities = Vec::with_capacity(lines.len());
        let mut image_urls = Vec::with_capacity(lines.len());
        let mut slugs = Vec::with_capacity(lines.len());
        for line in lines {
            product_ids.push(line.product_id.as_str().to_owned());
            names.push(line.name.clone());
            prices.push(line.unit_price.amount);
            currencies.push(line.unit_price.currency_code.as_str().to_owned());
            quantities.push(i32::try_from(line.quantity).unwrap_or(i32::MAX));
            image_urls.push(line.image_url.clone());
            slugs.push(line.slug.clone());
        }

        sqlx::query(
            r"
            INSERT INTO cart_lines
                (cart_id, product_id, name, unit_price, currency_code, quantity, image_url, slug)
            SELECT $1, u.product_id, u.name, u.unit_price, u.currency_code, u.quantity,
                   u.image_url, u.slug
            FROM UNNEST(
                $2::text[], $3::text[], $4::numeric[], $5::text[], $6::int4[],
                $7::text[], $8::text[]
            ) AS u(product_id, name, unit_price, currency_code, quantity, image_url, slug)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price = EXCLUDED.unit_price,
                currency_code = EXCLUDED.currency_code,
                quantity = EXCLUDED.quantity,
                image_url = EXCLUDED.image_url,
                slug = EXCLUDED.slug
            ",
        )
        .bind(cart.as_uuid())
        .bind(&product_ids)
        .bind(&names)
        .bind(&prices)
        .bind(&currencies)
        .bind(&quantities)
        .bind(&image_urls)
        .bind(&slugs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, products), fields(cart = %cart, count = products.len()))]
    async fn delete_lines(
        &self,
        cart: RemoteCartId,
        products: &[ProductId],
    ) -> Result<(), RemoteStoreError> {
        if products.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = products
            .iter()
            .map(|p| p.as_str().to_owned())
            .collect();

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND product_id = ANY($2)")
            .bind(cart.as_uuid())
            .bind(&ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
