use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::database::DirectoryStore;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, Business, BusinessDetail, BusinessFilter, BusinessListQuery, CreateReviewRequest,
    PublicReview, Review,
};

/// Approved reviews embedded in the business detail
const DETAIL_REVIEW_LIMIT: i64 = 10;

fn public_reviews(reviews: Vec<Review>) -> Vec<PublicReview> {
    reviews.into_iter().map(PublicReview::from).collect()
}

async fn load_active_business(
    store: &dyn DirectoryStore,
    business_id: i64,
) -> Result<Business, ApiError> {
    match store.get_business(business_id).await? {
        Some(business) if business.is_active => Ok(business),
        _ => Err(ApiError::not_found("Business")),
    }
}

// ============================================================================
// LOOKUPS
// ============================================================================

#[get("/categories")]
pub async fn list_categories(
    store: web::Data<dyn DirectoryStore>,
) -> Result<HttpResponse, ApiError> {
    let categories = store.list_categories(false).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(categories)))
}

#[get("/cities")]
pub async fn list_cities(store: web::Data<dyn DirectoryStore>) -> Result<HttpResponse, ApiError> {
    let cities = store.list_cities(false).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(cities)))
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[get("/businesses")]
pub async fn list_businesses(
    store: web::Data<dyn DirectoryStore>,
    query: web::Query<BusinessListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let filter = BusinessFilter {
        active_only: true,
        is_active: None,
        city_id: query.city_id,
        category_id: query.category_id,
        search: query.search.clone(),
    };

    let page = store.list_businesses(&filter, query.pagination()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(page)))
}

#[get("/businesses/{business_id}")]
pub async fn get_business(
    store: web::Data<dyn DirectoryStore>,
    business_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let business = load_active_business(store.get_ref(), business_id.into_inner()).await?;

    let city = store.get_city(business.city_id).await?;
    let category = store.get_category(business.category_id).await?;
    let reviews = store
        .list_reviews_for_business(business.id, true, Some(DETAIL_REVIEW_LIMIT))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BusinessDetail {
        business,
        city,
        category,
        reviews: public_reviews(reviews),
    })))
}

// ============================================================================
// REVIEWS
// ============================================================================

#[post("/reviews")]
pub async fn create_review(
    store: web::Data<dyn DirectoryStore>,
    payload: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = payload.into_inner();
    body.validate()?;

    load_active_business(store.get_ref(), body.business_id).await?;

    // Customer reviews wait for moderation
    let review = store.create_review(body.into_new_review(false)).await?;
    log::info!(
        "Review {} submitted for business {}",
        review.id,
        review.business_id
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(PublicReview::from(review))))
}

#[get("/reviews/{business_id}")]
pub async fn list_business_reviews(
    store: web::Data<dyn DirectoryStore>,
    business_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let business = load_active_business(store.get_ref(), business_id.into_inner()).await?;
    let reviews = store
        .list_reviews_for_business(business.id, true, None)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(public_reviews(reviews))))
}
