use actix_web::{get, post, put, web, HttpResponse};
use serde::Serialize;
use validator::Validate;

use super::{ensure_references, invalid_credentials};
use crate::auth::{hash_password, verify_login, AuthConfig, BusinessIdentity, Role};
use crate::database::DirectoryStore;
use crate::error::ApiError;
use crate::models::{
    normalize_email, ApiResponse, Business, BusinessStats, LoginRequest, LoginResponse,
    RegisterRequest, Review, UpdateBusinessRequest,
};

const DASHBOARD_RECENT_REVIEWS: usize = 5;

#[derive(Debug, Serialize)]
struct Dashboard {
    business: Business,
    stats: BusinessStats,
    recent_reviews: Vec<Review>,
}

// ============================================================================
// REGISTRATION & LOGIN
// ============================================================================

#[post("/register")]
pub async fn register(
    store: web::Data<dyn DirectoryStore>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let email = normalize_email(&body.email);
    if store.find_business_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    ensure_references(store.get_ref(), body.city_id, body.category_id).await?;

    let password_hash = hash_password(&body.password)?;
    let mut new_business = body.into_new_business(password_hash);
    // Self-registered accounts always start active
    new_business.is_active = true;

    let business = store.create_business(new_business).await?;
    log::info!("Registered business {} <{}>", business.id, business.email);
    Ok(HttpResponse::Created().json(ApiResponse::success(business)))
}

#[post("/login")]
pub async fn login(
    store: web::Data<dyn DirectoryStore>,
    auth: web::Data<AuthConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let business = store
        .find_business_by_email(&normalize_email(&body.email))
        .await?;
    let verified = verify_login(
        &body.password,
        business.as_ref().map(|b| b.password_hash.as_str()),
    );
    let business = match business {
        Some(business) if verified => business,
        _ => return Err(invalid_credentials()),
    };
    if !business.is_active {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    let access_token = auth.issue_token(business.id, &business.email, Role::Business)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: auth.ttl_seconds(),
        user: business,
    })))
}

// ============================================================================
// OWN ACCOUNT
// ============================================================================

#[get("/profile")]
pub async fn get_profile(identity: BusinessIdentity) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(identity.business)))
}

#[put("/profile")]
pub async fn update_profile(
    store: web::Data<dyn DirectoryStore>,
    identity: BusinessIdentity,
    payload: web::Json<UpdateBusinessRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let BusinessIdentity { business } = identity;
    let (business_id, email) = (business.id, business.email.clone());
    let updated = apply_business_update(store.get_ref(), business, &body, false).await?;
    log::info!("Business {} <{}> updated its profile", business_id, email);
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

#[get("/dashboard")]
pub async fn dashboard(
    store: web::Data<dyn DirectoryStore>,
    identity: BusinessIdentity,
) -> Result<HttpResponse, ApiError> {
    let business = identity.business;
    let mut reviews = store
        .list_reviews_for_business(business.id, false, None)
        .await?;
    let stats = BusinessStats::from_reviews(&reviews);
    reviews.truncate(DASHBOARD_RECENT_REVIEWS);

    Ok(HttpResponse::Ok().json(ApiResponse::success(Dashboard {
        business,
        stats,
        recent_reviews: reviews,
    })))
}

/// Applies a partial update shared by the owner and admin endpoints.
/// Only admins may toggle `is_active`.
pub(super) async fn apply_business_update(
    store: &dyn DirectoryStore,
    mut business: Business,
    body: &UpdateBusinessRequest,
    allow_activation: bool,
) -> Result<Business, ApiError> {
    if let Some(email) = &body.email {
        let email = normalize_email(email);
        if email != business.email {
            if store.find_business_by_email(&email).await?.is_some() {
                return Err(ApiError::Conflict("Email already registered".into()));
            }
            business.email = email;
        }
    }
    if let Some(password) = &body.password {
        business.password_hash = hash_password(password)?;
    }
    if allow_activation {
        if let Some(active) = body.is_active {
            business.is_active = active;
        }
    }

    body.apply_to_existing(&mut business);
    if body.city_id.is_some() || body.category_id.is_some() {
        ensure_references(store, business.city_id, business.category_id).await?;
    }

    Ok(store.update_business(business).await?)
}
