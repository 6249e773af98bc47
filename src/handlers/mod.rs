mod account;
mod admin;
mod directory;

use actix_web::{get, web, HttpResponse, Responder};

use crate::database::DirectoryStore;
use crate::error::ApiError;

/// Registers every route plus the extractor configs that answer malformed
/// bodies, query strings and paths in the `ApiResponse` format.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(health_check)
        .service(
            web::scope("/api")
                // Accounts
                .service(account::register)
                .service(account::login)
                .service(account::get_profile)
                .service(account::update_profile)
                .service(account::dashboard)
                // Directory
                .service(directory::list_categories)
                .service(directory::list_cities)
                .service(directory::list_businesses)
                .service(directory::get_business)
                .service(directory::create_review)
                .service(directory::list_business_reviews)
                // Administration
                .service(
                    web::scope("/admin")
                        .service(admin::login)
                        .service(admin::dashboard)
                        .service(admin::list_users)
                        .service(admin::create_user)
                        .service(admin::get_user)
                        .service(admin::update_user)
                        .service(admin::delete_user)
                        .service(admin::list_categories)
                        .service(admin::create_category)
                        .service(admin::update_category)
                        .service(admin::delete_category)
                        .service(admin::list_cities)
                        .service(admin::create_city)
                        .service(admin::update_city)
                        .service(admin::delete_city)
                        .service(admin::list_reviews)
                        .service(admin::create_review)
                        .service(admin::update_review)
                        .service(admin::delete_review),
                ),
        );
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::Validation(format!("Invalid JSON body: {err}")).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid query string: {err}")).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| ApiError::Validation(format!("Invalid path: {err}")).into())
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "message": "Peça no Zap API funcionando!",
        "service": "pecanozap-directory-service",
        "timestamp": chrono::Utc::now()
    }))
}

/// Same answer for an unknown email and a wrong password.
fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".into())
}

/// City and category must both exist before a business can point at them.
async fn ensure_references(
    store: &dyn DirectoryStore,
    city_id: i64,
    category_id: i64,
) -> Result<(), ApiError> {
    if store.get_city(city_id).await?.is_none() {
        return Err(ApiError::Validation(format!("City {city_id} does not exist")));
    }
    if store.get_category(category_id).await?.is_none() {
        return Err(ApiError::Validation(format!(
            "Category {category_id} does not exist"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared setup for the handler test modules.

    use std::sync::Arc;

    use actix_web::{
        body::MessageBody,
        dev::{ServiceFactory, ServiceRequest, ServiceResponse},
        test, web, App, Error,
    };
    use serde_json::{json, Value};

    use crate::auth::{hash_password, AuthConfig};
    use crate::database::{DirectoryStore, MemoryStore};
    use crate::models::NewAdmin;

    pub const ADMIN_EMAIL: &str = "admin@pecanozap.com";
    pub const ADMIN_PASSWORD: &str = "admin123";

    pub async fn seeded_store() -> Arc<dyn DirectoryStore> {
        let store = MemoryStore::new();
        store.seed_defaults().await.unwrap();
        store
            .ensure_admin(NewAdmin {
                email: ADMIN_EMAIL.into(),
                password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
                name: "Administrador".into(),
            })
            .await
            .unwrap();
        Arc::new(store)
    }

    pub fn app(
        store: Arc<dyn DirectoryStore>,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(AuthConfig::new("test-secret", 24)))
            .configure(super::configure)
    }

    pub fn registration(email: &str, name: &str, city_id: i64, category_id: i64) -> Value {
        json!({
            "email": email,
            "password": "segredo123",
            "business_name": name,
            "owner_name": "Maria Souza",
            "phone": "12999887766",
            "address": "Rua Guarani, 663 - Itaguá",
            "description": format!("{name} em Ubatuba"),
            "city_id": city_id,
            "category_id": category_id
        })
    }

    pub fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {token}"))
    }

    /// Token string from a login response body.
    pub fn token_of(body: &Value) -> String {
        body["data"]["access_token"]
            .as_str()
            .expect("login response carries a token")
            .to_string()
    }

    pub fn admin_login() -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/admin/login")
            .set_json(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }))
    }
}
