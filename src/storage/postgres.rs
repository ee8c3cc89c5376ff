//! PostgreSQL repositories.

use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Coupon, CouponKind, Order, Product, Profile, Role, SavedAddress};
use crate::domain::aggregates::coupon::normalize_code;
use crate::domain::value_objects::{Money, ShippingAddress, Size, Sku};
use super::{AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository, ProfileRepository, StorageError};

/// One pool shared by every repository.
#[derive(Clone, Debug)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn to_i32(value: u32) -> Result<i32, StorageError> {
    i32::try_from(value).map_err(|e| StorageError::Corrupt(format!("{value} out of range: {e}")))
}

fn to_u32(value: i32) -> Result<u32, StorageError> {
    u32::try_from(value).map_err(|e| StorageError::Corrupt(format!("{value} out of range: {e}")))
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    price: Decimal,
    original_price: Option<Decimal>,
    currency: String,
    tags: Vec<String>,
    images: Vec<String>,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct SizeRow { product_id: Uuid, size: String, stock: i32 }

impl ProductRow {
    fn into_product(self, sizes: Vec<SizeRow>) -> Result<Product, StorageError> {
        let code = Sku::new(self.code).map_err(|e| StorageError::Corrupt(format!("product {}: {e}", self.id)))?;
        let mut product = Product::create(self.id, code, self.name, Money::new(self.price, &self.currency)).with_active(self.active);
        if let Some(original) = self.original_price {
            product = product.with_original_price(Money::new(original, &self.currency));
        }
        for tag in self.tags { product = product.with_tag(tag); }
        for image in self.images { product = product.with_image(image); }
        for row in sizes { product = product.with_size(row.size, to_u32(row.stock)?); }
        Ok(product)
    }
}

const PRODUCT_COLUMNS: &str = "id, code, name, price, original_price, currency, tags, images, active";

#[async_trait]
impl ProductRepository for PgStore {
    async fn list(&self) -> Result<Vec<Product>, StorageError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"))
            .fetch_all(&self.pool).await?;
        let sizes = sqlx::query_as::<_, SizeRow>("SELECT product_id, size, stock FROM product_sizes ORDER BY size")
            .fetch_all(&self.pool).await?;
        let mut by_product: HashMap<Uuid, Vec<SizeRow>> = HashMap::new();
        for size in sizes { by_product.entry(size.product_id).or_default().push(size); }
        rows.into_iter()
            .map(|row| { let sizes = by_product.remove(&row.id).unwrap_or_default(); row.into_product(sizes) })
            .collect()
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StorageError> {
        let Some(row) = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id).fetch_optional(&self.pool).await? else { return Ok(None) };
        let sizes = sqlx::query_as::<_, SizeRow>("SELECT product_id, size, stock FROM product_sizes WHERE product_id = $1 ORDER BY size")
            .bind(id).fetch_all(&self.pool).await?;
        row.into_product(sizes).map(Some)
    }

    async fn decrement_stock(&self, id: Uuid, size: &Size, quantity: u32) -> Result<Option<u32>, StorageError> {
        let remaining: Option<(i32,)> = sqlx::query_as(
            "UPDATE product_sizes SET stock = stock - $3 WHERE product_id = $1 AND size = $2 AND stock >= $3 RETURNING stock",
        )
            .bind(id).bind(size.as_str()).bind(to_i32(quantity)?)
            .fetch_optional(&self.pool).await?;
        remaining.map(|(stock,)| to_u32(stock)).transpose()
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<Cart>, StorageError> {
        let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT data FROM carts WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(cart),)| cart))
    }

    async fn save(&self, cart: &Cart) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO carts (user_id, data, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (user_id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()")
            .bind(cart.user_id()).bind(Json(cart))
            .execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    code: String,
    kind: String,
    value: Decimal,
    max_discount: Option<Decimal>,
    active: bool,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
    max_uses: Option<i32>,
    current_uses: i32,
    min_order_amount: Decimal,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StorageError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "flat" => CouponKind::Flat { amount: row.value },
            "percentage" => CouponKind::Percentage { percent: row.value, max_discount: row.max_discount },
            other => return Err(StorageError::Corrupt(format!("coupon {}: unknown kind {other}", row.code))),
        };
        Ok(Coupon {
            code: row.code, kind, active: row.active, valid_from: row.valid_from, valid_to: row.valid_to,
            max_uses: row.max_uses.map(to_u32).transpose()?, current_uses: to_u32(row.current_uses)?,
            min_order_amount: row.min_order_amount,
        })
    }
}

#[async_trait]
impl CouponRepository for PgStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, StorageError> {
        sqlx::query_as::<_, CouponRow>("SELECT code, kind, value, max_discount, active, valid_from, valid_to, max_uses, current_uses, min_order_amount FROM coupons WHERE UPPER(code) = $1")
            .bind(normalize_code(code)).fetch_optional(&self.pool).await?
            .map(Coupon::try_from).transpose()
    }

    async fn record_use(&self, code: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE coupons SET current_uses = current_uses + 1 WHERE UPPER(code) = $1 AND (max_uses IS NULL OR current_uses < max_uses)")
            .bind(normalize_code(code)).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO orders (id, order_number, user_id, status, payment_status, total, data, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())")
            .bind(order.id()).bind(order.order_number()).bind(order.user_id())
            .bind(order.status().as_str()).bind(order.payment_status().as_str())
            .bind(order.total().amount()).bind(Json(order)).bind(order.created_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE orders SET status = $2, payment_status = $3, total = $4, data = $5, updated_at = NOW() WHERE id = $1")
            .bind(order.id()).bind(order.status().as_str()).bind(order.payment_status().as_str())
            .bind(order.total().amount()).bind(Json(order))
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Corrupt(format!("order {} does not exist", order.id())));
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, StorageError> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT data FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StorageError> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as("SELECT data FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }

    async fn list_recent(&self, limit: u32, offset: u32) -> Result<Vec<Order>, StorageError> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as("SELECT data FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(i64::from(limit)).bind(i64::from(offset)).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow { user_id: Uuid, email: String, full_name: Option<String>, reward_points: i32, role: String }

#[async_trait]
impl ProfileRepository for PgStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StorageError> {
        let Some(row) = sqlx::query_as::<_, ProfileRow>("SELECT user_id, email, full_name, reward_points, role FROM profiles WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await? else { return Ok(None) };
        Ok(Some(Profile {
            user_id: row.user_id, email: row.email, full_name: row.full_name,
            reward_points: to_u32(row.reward_points)?, role: Role::parse(&row.role),
        }))
    }

    async fn deduct_points(&self, user_id: Uuid, points: u32) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE profiles SET reward_points = reward_points - $2 WHERE user_id = $1 AND reward_points >= $2")
            .bind(user_id).bind(to_i32(points)?).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    contact: String,
    street: String,
    city: String,
    state: String,
    zip: String,
    country: String,
}

impl From<AddressRow> for SavedAddress {
    fn from(row: AddressRow) -> Self {
        SavedAddress {
            id: row.id, user_id: row.user_id,
            address: ShippingAddress {
                name: row.name, contact: row.contact, street: row.street, city: row.city,
                state: row.state, zip: row.zip, country: row.country,
            },
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, name, contact, street, city, state, zip, country";

#[async_trait]
impl AddressRepository for PgStore {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SavedAddress>, StorageError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at DESC"))
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SavedAddress::from).collect())
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<SavedAddress>, StorageError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2"))
            .bind(id).bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(SavedAddress::from))
    }

    async fn insert(&self, user_id: Uuid, address: ShippingAddress) -> Result<SavedAddress, StorageError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "INSERT INTO addresses (id, user_id, name, contact, street, city, state, zip, country, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW()) RETURNING {ADDRESS_COLUMNS}"
        ))
            .bind(Uuid::now_v7()).bind(user_id).bind(&address.name).bind(&address.contact).bind(&address.street)
            .bind(&address.city).bind(&address.state).bind(&address.zip).bind(&address.country)
            .fetch_one(&self.pool).await?;
        Ok(row.into())
    }
}
