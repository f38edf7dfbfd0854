//! Database repository for product and user operations.

use chrono::{SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use super::Database;
use crate::errors::AppError;
use crate::models::{Product, ProductId, User};
use crate::query::ProductQuery;

const PRODUCT_COLUMNS: &str = "id, name, brand, category, sku, stock, price, discount_price, \
     color, size, material, tags, features, warranty, shipping_info, description, \
     image_url, image_public_id, created_at, updated_at";

/// Database repository for all data operations.
pub struct Repository {
    db: Database,
}

/// Current time as RFC 3339 UTC with fixed microsecond precision, so that
/// text comparison of stored timestamps matches chronological order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Repository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect now instead of on the first request.
    pub async fn warm_up(&self) -> Result<(), AppError> {
        self.db.pool().await.map(|_| ())
    }

    // ==================== PRODUCT OPERATIONS ====================

    /// One page of matching products plus the total number of matches.
    pub async fn list_products(
        &self,
        query: &ProductQuery,
    ) -> Result<(Vec<Product>, i64), AppError> {
        let pool = self.db.pool().await?;
        let (where_clause, binds) = query.where_clause();
        let pattern = query.like_pattern().unwrap_or_default();

        let page_sql = format!(
            "SELECT {} FROM products {} ORDER BY {} LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS,
            where_clause,
            query.sort.order_by()
        );
        let mut page_query = sqlx::query(&page_sql);
        for _ in 0..binds {
            page_query = page_query.bind(pattern.clone());
        }
        let rows = page_query
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM products {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for _ in 0..binds {
            count_query = count_query.bind(pattern.clone());
        }
        let total = count_query.fetch_one(pool).await?;

        let products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((products, total))
    }

    /// Get a product by ID.
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, AppError> {
        let pool = self.db.pool().await?;
        let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    /// Insert a fully composed product document.
    pub async fn insert_product(&self, product: &Product) -> Result<(), AppError> {
        let pool = self.db.pool().await?;
        let tags_json = serde_json::to_string(&product.tags)?;
        let features_json = serde_json::to_string(&product.features)?;

        sqlx::query(
            "INSERT INTO products (id, name, brand, category, sku, stock, price, discount_price, \
             color, size, material, tags, features, warranty, shipping_info, description, \
             image_url, image_public_id, search_text, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.sku)
        .bind(product.stock)
        .bind(product.price)
        .bind(product.discount_price)
        .bind(&product.color)
        .bind(&product.size)
        .bind(&product.material)
        .bind(&tags_json)
        .bind(&features_json)
        .bind(&product.warranty)
        .bind(&product.shipping_info)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.image_public_id)
        .bind(product.search_text())
        .bind(&product.created_at)
        .bind(&product.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    // ==================== USER OPERATIONS ====================

    /// Create a user. The email must already be normalized.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let pool = self.db.pool().await?;
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: timestamp_now(),
        };

        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look a user up by normalized email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let pool = self.db.pool().await?;
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

// ==================== ROW MAPPING ====================

fn product_from_row(row: &SqliteRow) -> Result<Product, AppError> {
    let raw_id: String = row.get("id");
    let id: ProductId = raw_id
        .parse()
        .map_err(|_| AppError::Internal(format!("Stored product has malformed id {:?}", raw_id)))?;
    let tags: String = row.get("tags");
    let features: String = row.get("features");

    Ok(Product {
        id,
        name: row.get("name"),
        brand: row.get("brand"),
        category: row.get("category"),
        sku: row.get("sku"),
        stock: row.get("stock"),
        price: row.get("price"),
        discount_price: row.get("discount_price"),
        color: row.get("color"),
        size: row.get("size"),
        material: row.get("material"),
        tags: parse_json_array(&tags),
        features: parse_json_array(&features),
        warranty: row.get("warranty"),
        shipping_info: row.get("shipping_info"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        image_public_id: row.get("image_public_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
