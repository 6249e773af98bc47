mod memory;
mod postgres;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Admin, AdminStats, Business, BusinessFilter, Category, CategoryWithCount, City, CityWithCount,
    NewAdmin, NewBusiness, NewCategory, NewCity, NewReview, Paginated, Pagination, Review,
    ReviewFilter,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Unique key clash, or a row that is still referenced elsewhere
    #[error("{0}")]
    Conflict(String),

    /// Foreign key pointing at a row that does not exist
    #[error("{0}")]
    InvalidReference(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the HTTP handlers.
///
/// Updates take the full entity after the caller applied its changes, the
/// same read-modify-write cycle for every table. `delete_*` returns `false`
/// when nothing matched.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    // Businesses
    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business>;
    async fn get_business(&self, business_id: i64) -> StoreResult<Option<Business>>;
    async fn find_business_by_email(&self, email: &str) -> StoreResult<Option<Business>>;
    async fn list_businesses(
        &self,
        filter: &BusinessFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Business>>;
    async fn update_business(&self, business: Business) -> StoreResult<Business>;
    async fn delete_business(&self, business_id: i64) -> StoreResult<bool>;

    // Categories
    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<CategoryWithCount>>;
    async fn get_category(&self, category_id: i64) -> StoreResult<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> StoreResult<Category>;
    async fn update_category(&self, category: Category) -> StoreResult<Category>;
    async fn delete_category(&self, category_id: i64) -> StoreResult<bool>;

    // Cities
    async fn list_cities(&self, include_inactive: bool) -> StoreResult<Vec<CityWithCount>>;
    async fn get_city(&self, city_id: i64) -> StoreResult<Option<City>>;
    async fn create_city(&self, city: NewCity) -> StoreResult<City>;
    async fn update_city(&self, city: City) -> StoreResult<City>;
    async fn delete_city(&self, city_id: i64) -> StoreResult<bool>;

    // Reviews
    async fn create_review(&self, review: NewReview) -> StoreResult<Review>;
    async fn get_review(&self, review_id: i64) -> StoreResult<Option<Review>>;
    async fn list_reviews_for_business(
        &self,
        business_id: i64,
        approved_only: bool,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Review>>;
    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Review>>;
    async fn update_review(&self, review: Review) -> StoreResult<Review>;
    async fn delete_review(&self, review_id: i64) -> StoreResult<bool>;

    // Administrators
    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>>;
    async fn get_admin(&self, admin_id: i64) -> StoreResult<Option<Admin>>;
    /// Inserts the admin unless one with the same email exists; returns the stored row.
    async fn ensure_admin(&self, admin: NewAdmin) -> StoreResult<Admin>;

    async fn admin_stats(&self) -> StoreResult<AdminStats>;

    /// Inserts the default categories and cities into empty tables.
    async fn seed_defaults(&self) -> StoreResult<()>;
}
