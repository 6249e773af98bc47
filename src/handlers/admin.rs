//! Administration panel: account moderation, lookup tables and review
//! approval. Every route except `login` requires an [`AdminIdentity`].

use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use validator::Validate;

use super::account::apply_business_update;
use super::{ensure_references, invalid_credentials};
use crate::auth::{hash_password, verify_login, AdminIdentity, AuthConfig, Role};
use crate::database::DirectoryStore;
use crate::error::ApiError;
use crate::models::{
    normalize_email, ApiResponse, BusinessFilter, BusinessListQuery, CategoryRequest, CityRequest,
    CreateReviewRequest, LoginRequest, LoginResponse, RegisterRequest, ReviewFilter,
    ReviewListQuery, UpdateBusinessRequest, UpdateCategoryRequest, UpdateCityRequest,
    UpdateReviewRequest,
};

fn deleted(resource: &str, id: i64) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "id": id,
        "message": format!("{resource} deleted")
    })))
}

#[post("/login")]
pub async fn login(
    store: web::Data<dyn DirectoryStore>,
    auth: web::Data<AuthConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let admin = store.find_admin_by_email(&normalize_email(&body.email)).await?;
    let verified = verify_login(
        &body.password,
        admin.as_ref().map(|a| a.password_hash.as_str()),
    );
    let admin = match admin {
        Some(admin) if verified => admin,
        _ => return Err(invalid_credentials()),
    };

    let access_token = auth.issue_token(admin.id, &admin.email, Role::Admin)?;
    log::info!("Administrator {} logged in", admin.email);
    Ok(HttpResponse::Ok().json(ApiResponse::success(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: auth.ttl_seconds(),
        user: admin,
    })))
}

#[get("/dashboard")]
pub async fn dashboard(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
) -> Result<HttpResponse, ApiError> {
    let stats = store.admin_stats().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

// ============================================================================
// USERS (BUSINESS ACCOUNTS)
// ============================================================================

#[get("/users")]
pub async fn list_users(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    query: web::Query<BusinessListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let filter = BusinessFilter {
        active_only: false,
        is_active: query.is_active,
        city_id: query.city_id,
        category_id: query.category_id,
        search: query.search.clone(),
    };

    let page = store.list_businesses(&filter, query.pagination()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

#[post("/users")]
pub async fn create_user(
    store: web::Data<dyn DirectoryStore>,
    admin: AdminIdentity,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    if store
        .find_business_by_email(&normalize_email(&body.email))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Email already registered".into()));
    }
    ensure_references(store.get_ref(), body.city_id, body.category_id).await?;

    let password_hash = hash_password(&body.password)?;
    let business = store
        .create_business(body.into_new_business(password_hash))
        .await?;
    log::info!(
        "Administrator {} created business {}",
        admin.admin.email,
        business.id
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(business)))
}

#[get("/users/{business_id}")]
pub async fn get_user(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    business_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let business = store
        .get_business(business_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Business"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(business)))
}

#[put("/users/{business_id}")]
pub async fn update_user(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    business_id: web::Path<i64>,
    payload: web::Json<UpdateBusinessRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let existing = store
        .get_business(business_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Business"))?;
    let updated = apply_business_update(store.get_ref(), existing, &body, true).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(updated)))
}

#[delete("/users/{business_id}")]
pub async fn delete_user(
    store: web::Data<dyn DirectoryStore>,
    admin: AdminIdentity,
    business_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let business_id = business_id.into_inner();
    if !store.delete_business(business_id).await? {
        return Err(ApiError::not_found("Business"));
    }
    log::info!(
        "Administrator {} deleted business {}",
        admin.admin.email,
        business_id
    );
    Ok(deleted("Business", business_id))
}

// ============================================================================
// CATEGORIES
// ============================================================================

#[get("/categories")]
pub async fn list_categories(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
) -> Result<HttpResponse, ApiError> {
    let categories = store.list_categories(true).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(categories)))
}

#[post("/categories")]
pub async fn create_category(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    payload: web::Json<CategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let category = store.create_category(body.into_new_category()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(category)))
}

#[put("/categories/{category_id}")]
pub async fn update_category(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    category_id: web::Path<i64>,
    payload: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let mut category = store
        .get_category(category_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    body.apply_to_existing(&mut category);

    let category = store.update_category(category).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(category)))
}

#[delete("/categories/{category_id}")]
pub async fn delete_category(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    category_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let category_id = category_id.into_inner();
    if !store.delete_category(category_id).await? {
        return Err(ApiError::not_found("Category"));
    }
    Ok(deleted("Category", category_id))
}

// ============================================================================
// CITIES
// ============================================================================

#[get("/cities")]
pub async fn list_cities(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
) -> Result<HttpResponse, ApiError> {
    let cities = store.list_cities(true).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(cities)))
}

#[post("/cities")]
pub async fn create_city(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    payload: web::Json<CityRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let new_city = body.into_new_city().map_err(ApiError::Validation)?;
    let city = store.create_city(new_city).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(city)))
}

#[put("/cities/{city_id}")]
pub async fn update_city(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    city_id: web::Path<i64>,
    payload: web::Json<UpdateCityRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let mut city = store
        .get_city(city_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("City"))?;
    body.apply_to_existing(&mut city)
        .map_err(ApiError::Validation)?;

    let city = store.update_city(city).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(city)))
}

#[delete("/cities/{city_id}")]
pub async fn delete_city(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    city_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let city_id = city_id.into_inner();
    if !store.delete_city(city_id).await? {
        return Err(ApiError::not_found("City"));
    }
    Ok(deleted("City", city_id))
}

// ============================================================================
// REVIEWS
// ============================================================================

#[get("/reviews")]
pub async fn list_reviews(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    query: web::Query<ReviewListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let filter = ReviewFilter {
        business_id: query.business_id,
        is_approved: query.is_approved,
    };

    let page = store.list_reviews(&filter, query.pagination()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

#[post("/reviews")]
pub async fn create_review(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    payload: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    if store.get_business(body.business_id).await?.is_none() {
        return Err(ApiError::not_found("Business"));
    }
    let review = store.create_review(body.into_new_review(true)).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(review)))
}

#[put("/reviews/{review_id}")]
pub async fn update_review(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    review_id: web::Path<i64>,
    payload: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    let mut review = store
        .get_review(review_id.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Review"))?;
    body.apply_to_existing(&mut review);

    let review = store.update_review(review).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(review)))
}

#[delete("/reviews/{review_id}")]
pub async fn delete_review(
    store: web::Data<dyn DirectoryStore>,
    _admin: AdminIdentity,
    review_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let review_id = review_id.into_inner();
    if !store.delete_review(review_id).await? {
        return Err(ApiError::not_found("Review"));
    }
    Ok(deleted("Review", review_id))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    use crate::handlers::test_support::{
        admin_login, app, bearer, registration, seeded_store, token_of,
    };

    #[actix_web::test]
    async fn admin_routes_need_admin_token() {
        let app = test::init_service(app(seeded_store().await)).await;

        let req = test::TestRequest::get().uri("/api/admin/dashboard").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 1, 1))
            .to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(json!({ "email": "a@x.com", "password": "segredo123" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let business_token = token_of(&body);

        let req = test::TestRequest::get()
            .uri("/api/admin/users")
            .insert_header(bearer(&business_token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        // and the admin token does not open owner routes
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let req = test::TestRequest::get()
            .uri("/api/profile")
            .insert_header(bearer(&token_of(&body)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn admin_login_rejects_wrong_password() {
        let app = test::init_service(app(seeded_store().await)).await;
        let req = test::TestRequest::post()
            .uri("/api/admin/login")
            .set_json(json!({ "email": "admin@pecanozap.com", "password": "errada" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn dashboard_reports_totals() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let mut hidden = registration("b@x.com", "Negócio B", 1, 1);
        hidden["is_active"] = json!(false);
        for payload in [registration("a@x.com", "Negócio A", 1, 1), hidden] {
            let req = test::TestRequest::post()
                .uri("/api/admin/users")
                .insert_header(bearer(&token))
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/api/admin/dashboard")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total_users"], 2);
        assert_eq!(body["data"]["active_users"], 1);
        assert_eq!(body["data"]["inactive_users"], 1);
        assert_eq!(body["data"]["total_categories"], 8);
        assert_eq!(body["data"]["total_cities"], 10);

        let req = test::TestRequest::get()
            .uri("/api/admin/users?is_active=false")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["items"][0]["email"], "b@x.com");
    }

    #[actix_web::test]
    async fn update_user_toggles_activation() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 1, 1))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/api/admin/users/{id}"))
            .insert_header(bearer(&token))
            .set_json(json!({ "is_active": false, "category_id": 3 }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_active"], false);
        assert_eq!(body["data"]["category_id"], 3);

        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(json!({ "email": "a@x.com", "password": "segredo123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&format!("/api/admin/users/{id}"))
            .insert_header(bearer(&token))
            .set_json(json!({ "city_id": 999 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn deleting_user_removes_reviews() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 1, 1))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/reviews")
            .set_json(json!({ "business_id": id, "customer_name": "Ana", "rating": 4 }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/admin/users/{id}"))
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/admin/reviews?business_id={id}"))
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"], 0);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/admin/users/{id}"))
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn category_lifecycle() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/admin/categories")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Pet Shops", "icon": "🐶" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/admin/categories")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Pet Shops" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri(&format!("/api/admin/categories/{id}"))
            .insert_header(bearer(&token))
            .set_json(json!({ "is_active": false }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_active"], false);

        // hidden from the public listing, kept in the admin one
        let req = test::TestRequest::get().uri("/api/categories").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 8);
        let req = test::TestRequest::get()
            .uri("/api/admin/categories")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 9);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/admin/categories/{id}"))
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn referenced_lookups_cannot_be_deleted() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 2, 2))
            .to_request();
        test::call_service(&app, req).await;

        for uri in ["/api/admin/categories/2", "/api/admin/cities/2"] {
            let req = test::TestRequest::delete()
                .uri(uri)
                .insert_header(bearer(&token))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }

        let req = test::TestRequest::delete()
            .uri("/api/admin/cities/404")
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn city_state_must_be_a_uf_code() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/admin/cities")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Caraguatatuba", "state": "SÃO" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/admin/cities")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Caraguatatuba", "state": "sp" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["state"], "SP");

        let req = test::TestRequest::post()
            .uri("/api/admin/cities")
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Caraguatatuba", "state": "SP" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn approving_review_publishes_it() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 1, 1))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let business_id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/reviews")
            .set_json(json!({ "business_id": business_id, "customer_name": "Ana", "rating": 4 }))
            .to_request();
        let review: Value = test::call_and_read_body_json(&app, req).await;
        let review_id = review["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri("/api/admin/reviews?is_approved=false")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total"], 1);

        let req = test::TestRequest::put()
            .uri(&format!("/api/admin/reviews/{review_id}"))
            .insert_header(bearer(&token))
            .set_json(json!({ "is_approved": true }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["is_approved"], true);

        let req = test::TestRequest::get()
            .uri(&format!("/api/reviews/{business_id}"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::put()
            .uri(&format!("/api/admin/reviews/{review_id}"))
            .insert_header(bearer(&token))
            .set_json(json!({ "rating": 9 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/admin/reviews/{review_id}"))
            .insert_header(bearer(&token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn admin_created_review_may_be_pre_approved() {
        let app = test::init_service(app(seeded_store().await)).await;
        let body: Value = test::call_and_read_body_json(&app, admin_login().to_request()).await;
        let token = token_of(&body);

        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(registration("a@x.com", "Negócio A", 1, 1))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let business_id = created["data"]["id"].as_i64().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/admin/reviews")
            .insert_header(bearer(&token))
            .set_json(json!({
                "business_id": business_id,
                "customer_name": "Ana",
                "rating": 5,
                "is_approved": true
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["is_approved"], true);
    }
}
