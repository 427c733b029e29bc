//! # Catalog Repository
//!
//! Minimal product and variant access. Catalogue editing belongs to the
//! product workflows; the pool engine needs to create fixtures, look variants
//! up, and (through the archive reconciler only) delete them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use barcode_core::validation::{validate_sku, validate_uuid};
use barcode_core::{Product, ValidationError, Variant};

use crate::error::{DbError, DbResult};

/// Fields for a new variant.
#[derive(Debug, Clone, Default)]
pub struct NewVariant {
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
}

impl NewVariant {
    pub fn new(sku: impl Into<String>) -> Self {
        NewVariant {
            sku: sku.into(),
            ..Default::default()
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }
}

/// Repository for products and variants.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Creates a product.
    pub async fn create_product(&self, name: &str) -> DbResult<Product> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO products (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&product.id)
            .bind(&product.name)
            .bind(product.created_at)
            .execute(&self.pool)
            .await?;

        debug!(id = %product.id, name = %product.name, "Created product");
        Ok(product)
    }

    /// Creates a variant under `product_id`.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the SKU is taken
    /// - `ForeignKeyViolation` if the product does not exist
    pub async fn create_variant(&self, product_id: &str, new: NewVariant) -> DbResult<Variant> {
        validate_sku(&new.sku)?;

        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            sku: new.sku.trim().to_string(),
            color: new.color,
            size: new.size,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, sku, color, size, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.color)
        .bind(&variant.size)
        .bind(variant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, variant.sku.clone()),
            other => other,
        })?;

        debug!(id = %variant.id, sku = %variant.sku, "Created variant");
        Ok(variant)
    }

    /// Gets a variant by id.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            "SELECT id, product_id, sku, color, size, created_at FROM product_variants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(variant)
    }

    /// Gets a variant by SKU.
    pub async fn variant_by_sku(&self, sku: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            "SELECT id, product_id, sku, color, size, created_at FROM product_variants WHERE sku = ?1",
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(variant)
    }

    /// Returns true if the variant exists.
    pub async fn variant_exists(&self, id: &str) -> DbResult<bool> {
        if validate_uuid("variant_id", id).is_err() {
            return Ok(false);
        }
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM product_variants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
