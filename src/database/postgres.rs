use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgPool, Postgres, QueryBuilder, Row,
};

use super::{DirectoryStore, StoreError, StoreResult};
use crate::models::{
    Admin, AdminStats, Business, BusinessFilter, Category, CategoryWithCount, City, CityWithCount,
    NewAdmin, NewBusiness, NewCategory, NewCity, NewReview, Paginated, Pagination, Review,
    ReviewFilter, DEFAULT_CATEGORIES, DEFAULT_CITIES,
};

/// Business columns plus the rating aggregate, selected from `{source} b`.
fn business_select(source: &str) -> String {
    format!(
        r#"
        SELECT
            b.id,
            b.email,
            b.password_hash,
            b.business_name,
            b.owner_name,
            b.phone,
            b.whatsapp,
            b.address,
            b.description,
            b.image_url,
            b.is_active,
            b.city_id,
            b.category_id,
            b.created_at,
            b.updated_at,
            COALESCE(r.rating, 0)::FLOAT8 AS rating,
            COALESCE(r.review_count, 0) AS review_count
        FROM {source} b
        LEFT JOIN LATERAL (
            SELECT AVG(rv.rating)::FLOAT8 AS rating, COUNT(*) AS review_count
            FROM reviews rv
            WHERE rv.business_id = b.id
        ) r ON TRUE
        "#
    )
}

const CATEGORY_COLUMNS: &str = "id, name, description, icon, is_active, created_at";
const CITY_COLUMNS: &str = "id, name, state, is_active, created_at";
const REVIEW_COLUMNS: &str =
    "id, customer_name, customer_phone, rating, comment, is_approved, created_at, business_id";
const ADMIN_COLUMNS: &str = "id, email, password_hash, name, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = match pool_options().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                pool_options().connect(database_url).await?
            }
            Err(err) => return Err(err.into()),
        };

        // Run embedded migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    // Already targeting the maintenance database
    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Maps constraint violations of a write to domain errors.
///
/// `23505` is a unique clash. `23503` is a foreign key violation: a missing
/// parent on insert/update, a still-referenced row on delete.
fn map_write_error(err: sqlx::Error, conflict: &str, foreign_key: &str, deleting: bool) -> StoreError {
    let code = match &err {
        sqlx::Error::Database(db_err) => db_err.code().map(Cow::into_owned),
        _ => None,
    };
    match code.as_deref() {
        Some("23505") => StoreError::Conflict(conflict.to_string()),
        Some("23503") if deleting => StoreError::Conflict(foreign_key.to_string()),
        Some("23503") => StoreError::InvalidReference(foreign_key.to_string()),
        _ => StoreError::Sqlx(err),
    }
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_business_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BusinessFilter) {
    builder.push(" WHERE TRUE");
    if filter.active_only {
        builder.push(" AND b.is_active");
    }
    if let Some(active) = filter.is_active {
        builder.push(" AND b.is_active = ").push_bind(active);
    }
    if let Some(city_id) = filter.city_id {
        builder.push(" AND b.city_id = ").push_bind(city_id);
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND b.category_id = ").push_bind(category_id);
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        builder
            .push(" AND (b.business_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl DirectoryStore for PgStore {
    // ========================================================================
    // BUSINESSES
    // ========================================================================

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let query = format!(
            r#"
            WITH b AS (
                INSERT INTO businesses (
                    email, password_hash, business_name, owner_name, phone, whatsapp,
                    address, description, image_url, is_active, city_id, category_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
            )
            {}
            "#,
            business_select("b")
        );

        sqlx::query_as::<_, Business>(&query)
            .bind(&business.email)
            .bind(&business.password_hash)
            .bind(&business.business_name)
            .bind(&business.owner_name)
            .bind(&business.phone)
            .bind(&business.whatsapp)
            .bind(&business.address)
            .bind(&business.description)
            .bind(&business.image_url)
            .bind(business.is_active)
            .bind(business.city_id)
            .bind(business.category_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| {
                map_write_error(err, "Email already registered", "Unknown city or category", false)
            })
    }

    async fn get_business(&self, business_id: i64) -> StoreResult<Option<Business>> {
        let query = format!("{} WHERE b.id = $1", business_select("businesses"));
        let record = sqlx::query_as::<_, Business>(&query)
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_business_by_email(&self, email: &str) -> StoreResult<Option<Business>> {
        let query = format!("{} WHERE b.email = $1", business_select("businesses"));
        let record = sqlx::query_as::<_, Business>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_businesses(
        &self,
        filter: &BusinessFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Business>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM businesses b");
        push_business_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(business_select("businesses"));
        push_business_filters(&mut builder, filter);
        builder
            .push(" ORDER BY b.created_at DESC, b.id DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let items = builder
            .build_query_as::<Business>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(items, total, pagination))
    }

    async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let query = format!(
            r#"
            WITH b AS (
                UPDATE businesses
                SET email = $2,
                    password_hash = $3,
                    business_name = $4,
                    owner_name = $5,
                    phone = $6,
                    whatsapp = $7,
                    address = $8,
                    description = $9,
                    image_url = $10,
                    is_active = $11,
                    city_id = $12,
                    category_id = $13,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {}
            "#,
            business_select("b")
        );

        sqlx::query_as::<_, Business>(&query)
            .bind(business.id)
            .bind(&business.email)
            .bind(&business.password_hash)
            .bind(&business.business_name)
            .bind(&business.owner_name)
            .bind(&business.phone)
            .bind(&business.whatsapp)
            .bind(&business.address)
            .bind(&business.description)
            .bind(&business.image_url)
            .bind(business.is_active)
            .bind(business.city_id)
            .bind(business.category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                map_write_error(err, "Email already registered", "Unknown city or category", false)
            })?
            .ok_or(StoreError::NotFound {
                resource: "Business",
                id: business.id,
            })
    }

    async fn delete_business(&self, business_id: i64) -> StoreResult<bool> {
        // Reviews go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(business_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<CategoryWithCount>> {
        let records = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT
                c.id,
                c.name,
                c.description,
                c.icon,
                c.is_active,
                c.created_at,
                COUNT(b.id) FILTER (WHERE b.is_active) AS business_count
            FROM categories c
            LEFT JOIN businesses b ON b.category_id = c.id
            WHERE $1 OR c.is_active
            GROUP BY c.id
            ORDER BY c.name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_category(&self, category_id: i64) -> StoreResult<Option<Category>> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let record = sqlx::query_as::<_, Category>(&query)
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        let query = format!(
            "INSERT INTO categories (name, description, icon, is_active) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.icon)
            .bind(category.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "Category already exists", "", false))
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let query = format!(
            "UPDATE categories SET name = $2, description = $3, icon = $4, is_active = $5 \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&query)
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(&category.icon)
            .bind(category.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "Category already exists", "", false))?
            .ok_or(StoreError::NotFound {
                resource: "Category",
                id: category.id,
            })
    }

    async fn delete_category(&self, category_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                map_write_error(err, "", "Category still has registered businesses", true)
            })?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // CITIES
    // ========================================================================

    async fn list_cities(&self, include_inactive: bool) -> StoreResult<Vec<CityWithCount>> {
        let records = sqlx::query_as::<_, CityWithCount>(
            r#"
            SELECT
                c.id,
                c.name,
                c.state,
                c.is_active,
                c.created_at,
                COUNT(b.id) FILTER (WHERE b.is_active) AS business_count
            FROM cities c
            LEFT JOIN businesses b ON b.city_id = c.id
            WHERE $1 OR c.is_active
            GROUP BY c.id
            ORDER BY c.name ASC, c.state ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn get_city(&self, city_id: i64) -> StoreResult<Option<City>> {
        let query = format!("SELECT {CITY_COLUMNS} FROM cities WHERE id = $1");
        let record = sqlx::query_as::<_, City>(&query)
            .bind(city_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn create_city(&self, city: NewCity) -> StoreResult<City> {
        let query = format!(
            "INSERT INTO cities (name, state, is_active) VALUES ($1, $2, $3) RETURNING {CITY_COLUMNS}"
        );
        sqlx::query_as::<_, City>(&query)
            .bind(&city.name)
            .bind(&city.state)
            .bind(city.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "City already exists", "", false))
    }

    async fn update_city(&self, city: City) -> StoreResult<City> {
        let query = format!(
            "UPDATE cities SET name = $2, state = $3, is_active = $4 \
             WHERE id = $1 RETURNING {CITY_COLUMNS}"
        );
        sqlx::query_as::<_, City>(&query)
            .bind(city.id)
            .bind(&city.name)
            .bind(&city.state)
            .bind(city.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "City already exists", "", false))?
            .ok_or(StoreError::NotFound {
                resource: "City",
                id: city.id,
            })
    }

    async fn delete_city(&self, city_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM cities WHERE id = $1")
            .bind(city_id)
            .execute(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "", "City still has registered businesses", true))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    async fn create_review(&self, review: NewReview) -> StoreResult<Review> {
        let query = format!(
            "INSERT INTO reviews (business_id, customer_name, customer_phone, rating, comment, is_approved) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(review.business_id)
            .bind(&review.customer_name)
            .bind(&review.customer_phone)
            .bind(review.rating)
            .bind(&review.comment)
            .bind(review.is_approved)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_write_error(err, "", "Business not found", false))
    }

    async fn get_review(&self, review_id: i64) -> StoreResult<Option<Review>> {
        let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
        let record = sqlx::query_as::<_, Review>(&query)
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_reviews_for_business(
        &self,
        business_id: i64,
        approved_only: bool,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Review>> {
        let query = format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews
            WHERE business_id = $1 AND (NOT $2 OR is_approved)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        );
        let records = sqlx::query_as::<_, Review>(&query)
            .bind(business_id)
            .bind(approved_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Review>> {
        const WHERE: &str = "WHERE ($1::BIGINT IS NULL OR business_id = $1) \
                             AND ($2::BOOLEAN IS NULL OR is_approved = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM reviews {WHERE}"))
            .bind(filter.business_id)
            .bind(filter.is_approved)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Review>(&query)
            .bind(filter.business_id)
            .bind(filter.is_approved)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(items, total, pagination))
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        let query = format!(
            "UPDATE reviews SET customer_name = $2, customer_phone = $3, rating = $4, \
             comment = $5, is_approved = $6 WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(review.id)
            .bind(&review.customer_name)
            .bind(&review.customer_phone)
            .bind(review.rating)
            .bind(&review.comment)
            .bind(review.is_approved)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                resource: "Review",
                id: review.id,
            })
    }

    async fn delete_review(&self, review_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // ADMINISTRATORS
    // ========================================================================

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = $1");
        let record = sqlx::query_as::<_, Admin>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn get_admin(&self, admin_id: i64) -> StoreResult<Option<Admin>> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1");
        let record = sqlx::query_as::<_, Admin>(&query)
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn ensure_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        sqlx::query(
            "INSERT INTO admins (email, password_hash, name) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(&admin.name)
        .execute(&self.pool)
        .await?;

        self.find_admin_by_email(&admin.email)
            .await?
            .ok_or(StoreError::Sqlx(sqlx::Error::RowNotFound))
    }

    async fn admin_stats(&self) -> StoreResult<AdminStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM businesses) AS total_users,
                (SELECT COUNT(*) FROM businesses WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM reviews) AS total_reviews,
                (SELECT COUNT(*) FROM reviews WHERE is_approved) AS approved_reviews,
                (SELECT COUNT(*) FROM cities) AS total_cities,
                (SELECT COUNT(*) FROM categories) AS total_categories
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_users: i64 = row.try_get("total_users")?;
        let active_users: i64 = row.try_get("active_users")?;
        let total_reviews: i64 = row.try_get("total_reviews")?;
        let approved_reviews: i64 = row.try_get("approved_reviews")?;

        Ok(AdminStats {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            total_reviews,
            pending_reviews: total_reviews - approved_reviews,
            approved_reviews,
            total_cities: row.try_get("total_cities")?,
            total_categories: row.try_get("total_categories")?,
        })
    }

    async fn seed_defaults(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let categories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&mut *tx)
            .await?;
        if categories == 0 {
            for (name, icon) in DEFAULT_CATEGORIES {
                sqlx::query("INSERT INTO categories (name, icon) VALUES ($1, $2)")
                    .bind(*name)
                    .bind(*icon)
                    .execute(&mut *tx)
                    .await?;
            }
            log::info!("Seeded {} default categories", DEFAULT_CATEGORIES.len());
        }

        let cities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
            .fetch_one(&mut *tx)
            .await?;
        if cities == 0 {
            for (name, state) in DEFAULT_CITIES {
                sqlx::query("INSERT INTO cities (name, state) VALUES ($1, $2)")
                    .bind(*name)
                    .bind(*state)
                    .execute(&mut *tx)
                    .await?;
            }
            log::info!("Seeded {} default cities", DEFAULT_CITIES.len());
        }

        tx.commit().await?;
        Ok(())
    }
}
