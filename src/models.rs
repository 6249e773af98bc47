use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Default items per page
const DEFAULT_PER_PAGE: u32 = 20;

/// Categories inserted on first start when the table is empty: (name, icon)
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Restaurantes", "🍽️"),
    ("Farmácias", "💊"),
    ("Supermercados", "🛒"),
    ("Autopeças", "🚗"),
    ("Beleza", "💄"),
    ("Roupas", "👕"),
    ("Eletrônicos", "📱"),
    ("Serviços", "🔧"),
];

/// Cities inserted on first start when the table is empty: (name, state)
pub const DEFAULT_CITIES: &[(&str, &str)] = &[
    ("São Paulo", "SP"),
    ("Rio de Janeiro", "RJ"),
    ("Belo Horizonte", "MG"),
    ("Salvador", "BA"),
    ("Brasília", "DF"),
    ("Fortaleza", "CE"),
    ("Recife", "PE"),
    ("Porto Alegre", "RS"),
    ("Curitiba", "PR"),
    ("Ubatuba", "SP"),
];

// ============================================================================
// BUSINESSES
// ============================================================================

/// Registered establishment. Doubles as the login account of its owner.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub business_name: String,
    pub owner_name: String,
    pub phone: String,
    pub whatsapp: String,
    pub address: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub city_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Mean of all review ratings, 0 when there are none
    pub rating: f64,
    pub review_count: i64,
}

/// Helper struct used when inserting a new business
#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub email: String,
    pub password_hash: String,
    pub business_name: String,
    pub owner_name: String,
    pub phone: String,
    pub whatsapp: String,
    pub address: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub city_id: i64,
    pub category_id: i64,
}

/// Business with its city, category and latest approved reviews
#[derive(Debug, Clone, Serialize)]
pub struct BusinessDetail {
    #[serde(flatten)]
    pub business: Business,
    pub city: Option<City>,
    pub category: Option<Category>,
    pub reviews: Vec<PublicReview>,
}

/// Filters accepted by the business listing
#[derive(Debug, Clone, Default)]
pub struct BusinessFilter {
    pub active_only: bool,
    pub is_active: Option<bool>,
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
    pub search: Option<String>,
}

impl BusinessFilter {
    /// Search term with surrounding whitespace removed; blank terms are ignored.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, business: &Business) -> bool {
        if self.active_only && !business.is_active {
            return false;
        }
        if matches!(self.is_active, Some(active) if active != business.is_active) {
            return false;
        }
        if matches!(self.city_id, Some(city_id) if city_id != business.city_id) {
            return false;
        }
        if matches!(self.category_id, Some(category_id) if category_id != business.category_id)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                business.business_name.to_lowercase().contains(&term)
                    || business
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

// ============================================================================
// CATEGORIES & CITIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
}

/// Category row annotated with the number of active businesses in it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub category: Category,
    pub business_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    /// Two-letter state code (UF)
    pub state: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCity {
    pub name: String,
    pub state: String,
    pub is_active: bool,
}

/// City row annotated with the number of active businesses in it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CityWithCount {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub city: City,
    pub business_count: i64,
}

// ============================================================================
// REVIEWS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub business_id: i64,
}

/// Review as shown on public pages, without the customer's phone
#[derive(Debug, Clone, Serialize)]
pub struct PublicReview {
    pub id: i64,
    pub customer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub business_id: i64,
}

impl From<Review> for PublicReview {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            customer_name: review.customer_name,
            rating: review.rating,
            comment: review.comment,
            is_approved: review.is_approved,
            created_at: review.created_at,
            business_id: review.business_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub business_id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_approved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub business_id: Option<i64>,
    pub is_approved: Option<bool>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        self.business_id.map_or(true, |id| id == review.business_id)
            && self.is_approved.map_or(true, |flag| flag == review.is_approved)
    }
}

/// Arithmetic mean of the given ratings, 0 for an empty set.
pub fn average_rating<I>(ratings: I) -> f64
where
    I: IntoIterator<Item = i32>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), r| (sum + r as i64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

// ============================================================================
// ADMINISTRATORS & STATS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Admin {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// Totals shown on the admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub inactive_users: i64,
    pub total_reviews: i64,
    pub pending_reviews: i64,
    pub approved_reviews: i64,
    pub total_cities: i64,
    pub total_categories: i64,
}

/// Review figures shown to a business owner
#[derive(Debug, Clone, Serialize)]
pub struct BusinessStats {
    pub rating: f64,
    pub review_count: i64,
    pub approved_reviews: i64,
    pub pending_reviews: i64,
}

impl BusinessStats {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        let approved = reviews.iter().filter(|r| r.is_approved).count() as i64;
        Self {
            rating: average_rating(reviews.iter().map(|r| r.rating)),
            review_count: reviews.len() as i64,
            approved_reviews: approved,
            pending_reviews: reviews.len() as i64 - approved,
        }
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Page request, 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Page is clamped to at least 1, per page to 1..=100.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// One page of results plus totals for the whole filtered set
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub current_page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let per_page = pagination.per_page as i64;
        Self {
            items,
            total,
            pages: (total + per_page - 1) / per_page,
            current_page: pagination.page,
            per_page: pagination.per_page,
        }
    }

    /// Slices an already filtered and ordered collection.
    pub fn from_vec(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .collect();
        Self::new(items, total, pagination)
    }
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Lower-cased, trimmed email used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Upper-cased UF code, or an error message when it is not two ASCII letters.
pub fn normalize_state(state: &str) -> Result<String, String> {
    let state = state.trim();
    if state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(state.to_ascii_uppercase())
    } else {
        Err(format!("State must be a two-letter code, got '{state}'"))
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads a blank string as an absent field, before validation sees it.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(blank_to_none(Option::<String>::deserialize(deserializer)?))
}

/// Payload sent by business owners to create their account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email, length(max = 120))]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 2, max = 100))]
    pub business_name: String,
    #[validate(length(min = 2, max = 100))]
    pub owner_name: String,
    #[validate(length(min = 8, max = 20))]
    pub phone: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(min = 8, max = 20))]
    pub whatsapp: Option<String>,
    #[validate(length(min = 5, max = 300))]
    pub address: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub image_url: Option<String>,
    pub city_id: i64,
    pub category_id: i64,
    /// Only honoured on the admin create endpoint
    pub is_active: Option<bool>,
}

impl RegisterRequest {
    /// WhatsApp defaults to the phone number when not given.
    pub fn into_new_business(self, password_hash: String) -> NewBusiness {
        let whatsapp = blank_to_none(self.whatsapp).unwrap_or_else(|| self.phone.clone());
        NewBusiness {
            email: normalize_email(&self.email),
            password_hash,
            business_name: self.business_name.trim().to_string(),
            owner_name: self.owner_name.trim().to_string(),
            phone: self.phone,
            whatsapp,
            address: self.address,
            description: blank_to_none(self.description),
            image_url: blank_to_none(self.image_url),
            is_active: self.is_active.unwrap_or(true),
            city_id: self.city_id,
            category_id: self.category_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse<T> {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: T,
}

/// Partial update of a business. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(email, length(max = 120))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub business_name: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub owner_name: Option<String>,
    #[validate(length(min = 8, max = 20))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(min = 8, max = 20))]
    pub whatsapp: Option<String>,
    #[validate(length(min = 5, max = 300))]
    pub address: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub image_url: Option<String>,
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl UpdateBusinessRequest {
    /// Copies profile fields onto `existing`. Email, password and the active
    /// flag are account-level and handled by the caller.
    pub fn apply_to_existing(&self, existing: &mut Business) {
        if let Some(name) = &self.business_name {
            existing.business_name = name.trim().to_string();
        }
        if let Some(owner) = &self.owner_name {
            existing.owner_name = owner.trim().to_string();
        }
        if let Some(phone) = &self.phone {
            existing.phone = phone.clone();
        }
        if let Some(whatsapp) = &self.whatsapp {
            existing.whatsapp = whatsapp.clone();
        }
        if let Some(address) = &self.address {
            existing.address = address.clone();
        }
        if let Some(description) = &self.description {
            existing.description = blank_to_none(Some(description.clone()));
        }
        if let Some(image_url) = &self.image_url {
            existing.image_url = blank_to_none(Some(image_url.clone()));
        }
        if let Some(city_id) = self.city_id {
            existing.city_id = city_id;
        }
        if let Some(category_id) = self.category_id {
            existing.category_id = category_id;
        }
        existing.updated_at = Utc::now();
    }
}

/// Public listing query string
#[derive(Debug, Default, Deserialize)]
pub struct BusinessListQuery {
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl BusinessListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PER_PAGE))
    }
}

/// Review submitted by a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub business_id: i64,
    #[validate(length(min = 2, max = 100))]
    pub customer_name: String,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    /// Only honoured on the admin create endpoint
    pub is_approved: Option<bool>,
}

impl CreateReviewRequest {
    pub fn into_new_review(self, allow_approval: bool) -> NewReview {
        NewReview {
            business_id: self.business_id,
            customer_name: self.customer_name.trim().to_string(),
            customer_phone: blank_to_none(self.customer_phone),
            rating: self.rating,
            comment: blank_to_none(self.comment),
            is_approved: allow_approval && self.is_approved.unwrap_or(false),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 2, max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    pub is_approved: Option<bool>,
}

impl UpdateReviewRequest {
    pub fn apply_to_existing(&self, existing: &mut Review) {
        if let Some(name) = &self.customer_name {
            existing.customer_name = name.trim().to_string();
        }
        if let Some(phone) = &self.customer_phone {
            existing.customer_phone = blank_to_none(Some(phone.clone()));
        }
        if let Some(rating) = self.rating {
            existing.rating = rating;
        }
        if let Some(comment) = &self.comment {
            existing.comment = blank_to_none(Some(comment.clone()));
        }
        if let Some(approved) = self.is_approved {
            existing.is_approved = approved;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub business_id: Option<i64>,
    pub is_approved: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ReviewListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PER_PAGE))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

impl CategoryRequest {
    pub fn into_new_category(self) -> NewCategory {
        NewCategory {
            name: self.name.trim().to_string(),
            description: blank_to_none(self.description),
            icon: blank_to_none(self.icon),
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCategoryRequest {
    pub fn apply_to_existing(&self, existing: &mut Category) {
        if let Some(name) = &self.name {
            existing.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            existing.description = blank_to_none(Some(description.clone()));
        }
        if let Some(icon) = &self.icon {
            existing.icon = blank_to_none(Some(icon.clone()));
        }
        if let Some(active) = self.is_active {
            existing.is_active = active;
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CityRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub state: String,
    pub is_active: Option<bool>,
}

impl CityRequest {
    pub fn into_new_city(self) -> Result<NewCity, String> {
        Ok(NewCity {
            state: normalize_state(&self.state)?,
            name: self.name.trim().to_string(),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCityRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    pub state: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCityRequest {
    pub fn apply_to_existing(&self, existing: &mut City) -> Result<(), String> {
        if let Some(state) = &self.state {
            existing.state = normalize_state(state)?;
        }
        if let Some(name) = &self.name {
            existing.name = name.trim().to_string();
        }
        if let Some(active) = self.is_active {
            existing.is_active = active;
        }
        Ok(())
    }
}
