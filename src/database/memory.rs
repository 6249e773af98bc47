use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DirectoryStore, StoreError, StoreResult};
use crate::models::{
    average_rating, Admin, AdminStats, Business, BusinessFilter, Category, CategoryWithCount, City,
    CityWithCount, NewAdmin, NewBusiness, NewCategory, NewCity, NewReview, Paginated, Pagination,
    Review, ReviewFilter, DEFAULT_CATEGORIES, DEFAULT_CITIES,
};

#[derive(Default)]
struct State {
    businesses: BTreeMap<i64, Business>,
    categories: BTreeMap<i64, Category>,
    cities: BTreeMap<i64, City>,
    reviews: BTreeMap<i64, Review>,
    admins: BTreeMap<i64, Admin>,
    business_seq: i64,
    category_seq: i64,
    city_seq: i64,
    review_seq: i64,
    admin_seq: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

impl State {
    /// Copy of the business with its review aggregate filled in.
    fn with_rating(&self, business: &Business) -> Business {
        let ratings: Vec<i32> = self
            .reviews
            .values()
            .filter(|r| r.business_id == business.id)
            .map(|r| r.rating)
            .collect();
        Business {
            review_count: ratings.len() as i64,
            rating: average_rating(ratings),
            ..business.clone()
        }
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.businesses
            .values()
            .any(|b| b.email == email && Some(b.id) != except)
    }

    fn check_references(&self, city_id: i64, category_id: i64) -> StoreResult<()> {
        if self.cities.contains_key(&city_id) && self.categories.contains_key(&category_id) {
            Ok(())
        } else {
            Err(StoreError::InvalidReference(
                "Unknown city or category".to_string(),
            ))
        }
    }

    fn active_businesses_where(&self, pred: impl Fn(&Business) -> bool) -> i64 {
        self.businesses
            .values()
            .filter(|b| b.is_active && pred(b))
            .count() as i64
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let mut state = self.state.write().await;
        if state.email_taken(&business.email, None) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }
        state.check_references(business.city_id, business.category_id)?;

        let now = Utc::now();
        let record = Business {
            id: next_id(&mut state.business_seq),
            email: business.email,
            password_hash: business.password_hash,
            business_name: business.business_name,
            owner_name: business.owner_name,
            phone: business.phone,
            whatsapp: business.whatsapp,
            address: business.address,
            description: business.description,
            image_url: business.image_url,
            is_active: business.is_active,
            city_id: business.city_id,
            category_id: business.category_id,
            created_at: now,
            updated_at: now,
            rating: 0.0,
            review_count: 0,
        };
        state.businesses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_business(&self, business_id: i64) -> StoreResult<Option<Business>> {
        let state = self.state.read().await;
        Ok(state
            .businesses
            .get(&business_id)
            .map(|b| state.with_rating(b)))
    }

    async fn find_business_by_email(&self, email: &str) -> StoreResult<Option<Business>> {
        let state = self.state.read().await;
        Ok(state
            .businesses
            .values()
            .find(|b| b.email == email)
            .map(|b| state.with_rating(b)))
    }

    async fn list_businesses(
        &self,
        filter: &BusinessFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Business>> {
        let state = self.state.read().await;
        let mut matching: Vec<&Business> = state
            .businesses
            .values()
            .filter(|b| filter.matches(b))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let all = matching.into_iter().map(|b| state.with_rating(b)).collect();
        Ok(Paginated::from_vec(all, pagination))
    }

    async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let mut state = self.state.write().await;
        if !state.businesses.contains_key(&business.id) {
            return Err(StoreError::NotFound {
                resource: "Business",
                id: business.id,
            });
        }
        if state.email_taken(&business.email, Some(business.id)) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }
        state.check_references(business.city_id, business.category_id)?;

        let record = Business {
            updated_at: Utc::now(),
            ..business
        };
        let record = state.with_rating(&record);
        state.businesses.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_business(&self, business_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if state.businesses.remove(&business_id).is_none() {
            return Ok(false);
        }
        state.reviews.retain(|_, r| r.business_id != business_id);
        Ok(true)
    }

    async fn list_categories(&self, include_inactive: bool) -> StoreResult<Vec<CategoryWithCount>> {
        let state = self.state.read().await;
        let mut records: Vec<CategoryWithCount> = state
            .categories
            .values()
            .filter(|c| include_inactive || c.is_active)
            .map(|c| CategoryWithCount {
                business_count: state.active_businesses_where(|b| b.category_id == c.id),
                category: c.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(records)
    }

    async fn get_category(&self, category_id: i64) -> StoreResult<Option<Category>> {
        Ok(self.state.read().await.categories.get(&category_id).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Conflict("Category already exists".to_string()));
        }
        let record = Category {
            id: next_id(&mut state.category_seq),
            name: category.name,
            description: category.description,
            icon: category.icon,
            is_active: category.is_active,
            created_at: Utc::now(),
        };
        state.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&category.id) {
            return Err(StoreError::NotFound {
                resource: "Category",
                id: category.id,
            });
        }
        if state
            .categories
            .values()
            .any(|c| c.name == category.name && c.id != category.id)
        {
            return Err(StoreError::Conflict("Category already exists".to_string()));
        }
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete_category(&self, category_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&category_id) {
            return Ok(false);
        }
        if state.businesses.values().any(|b| b.category_id == category_id) {
            return Err(StoreError::Conflict(
                "Category still has registered businesses".to_string(),
            ));
        }
        state.categories.remove(&category_id);
        Ok(true)
    }

    async fn list_cities(&self, include_inactive: bool) -> StoreResult<Vec<CityWithCount>> {
        let state = self.state.read().await;
        let mut records: Vec<CityWithCount> = state
            .cities
            .values()
            .filter(|c| include_inactive || c.is_active)
            .map(|c| CityWithCount {
                business_count: state.active_businesses_where(|b| b.city_id == c.id),
                city: c.clone(),
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.city.name, &a.city.state).cmp(&(&b.city.name, &b.city.state))
        });
        Ok(records)
    }

    async fn get_city(&self, city_id: i64) -> StoreResult<Option<City>> {
        Ok(self.state.read().await.cities.get(&city_id).cloned())
    }

    async fn create_city(&self, city: NewCity) -> StoreResult<City> {
        let mut state = self.state.write().await;
        if state
            .cities
            .values()
            .any(|c| c.name == city.name && c.state == city.state)
        {
            return Err(StoreError::Conflict("City already exists".to_string()));
        }
        let record = City {
            id: next_id(&mut state.city_seq),
            name: city.name,
            state: city.state,
            is_active: city.is_active,
            created_at: Utc::now(),
        };
        state.cities.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_city(&self, city: City) -> StoreResult<City> {
        let mut state = self.state.write().await;
        if !state.cities.contains_key(&city.id) {
            return Err(StoreError::NotFound {
                resource: "City",
                id: city.id,
            });
        }
        if state
            .cities
            .values()
            .any(|c| c.name == city.name && c.state == city.state && c.id != city.id)
        {
            return Err(StoreError::Conflict("City already exists".to_string()));
        }
        state.cities.insert(city.id, city.clone());
        Ok(city)
    }

    async fn delete_city(&self, city_id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        if !state.cities.contains_key(&city_id) {
            return Ok(false);
        }
        if state.businesses.values().any(|b| b.city_id == city_id) {
            return Err(StoreError::Conflict(
                "City still has registered businesses".to_string(),
            ));
        }
        state.cities.remove(&city_id);
        Ok(true)
    }

    async fn create_review(&self, review: NewReview) -> StoreResult<Review> {
        let mut state = self.state.write().await;
        if !state.businesses.contains_key(&review.business_id) {
            return Err(StoreError::InvalidReference("Business not found".to_string()));
        }
        let record = Review {
            id: next_id(&mut state.review_seq),
            customer_name: review.customer_name,
            customer_phone: review.customer_phone,
            rating: review.rating,
            comment: review.comment,
            is_approved: review.is_approved,
            created_at: Utc::now(),
            business_id: review.business_id,
        };
        state.reviews.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_review(&self, review_id: i64) -> StoreResult<Option<Review>> {
        Ok(self.state.read().await.reviews.get(&review_id).cloned())
    }

    async fn list_reviews_for_business(
        &self,
        business_id: i64,
        approved_only: bool,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Review>> {
        let state = self.state.read().await;
        let mut records: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.business_id == business_id && (!approved_only || r.is_approved))
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        if let Some(limit) = limit {
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }

    async fn list_reviews(
        &self,
        filter: &ReviewFilter,
        pagination: Pagination,
    ) -> StoreResult<Paginated<Review>> {
        let state = self.state.read().await;
        let mut records: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(Paginated::from_vec(records, pagination))
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        let mut state = self.state.write().await;
        match state.reviews.get_mut(&review.id) {
            Some(slot) => {
                *slot = review.clone();
                Ok(review)
            }
            None => Err(StoreError::NotFound {
                resource: "Review",
                id: review.id,
            }),
        }
    }

    async fn delete_review(&self, review_id: i64) -> StoreResult<bool> {
        Ok(self.state.write().await.reviews.remove(&review_id).is_some())
    }

    async fn find_admin_by_email(&self, email: &str) -> StoreResult<Option<Admin>> {
        let state = self.state.read().await;
        Ok(state.admins.values().find(|a| a.email == email).cloned())
    }

    async fn get_admin(&self, admin_id: i64) -> StoreResult<Option<Admin>> {
        Ok(self.state.read().await.admins.get(&admin_id).cloned())
    }

    async fn ensure_admin(&self, admin: NewAdmin) -> StoreResult<Admin> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.admins.values().find(|a| a.email == admin.email) {
            return Ok(existing.clone());
        }
        let record = Admin {
            id: next_id(&mut state.admin_seq),
            email: admin.email,
            password_hash: admin.password_hash,
            name: admin.name,
            created_at: Utc::now(),
        };
        state.admins.insert(record.id, record.clone());
        Ok(record)
    }

    async fn admin_stats(&self) -> StoreResult<AdminStats> {
        let state = self.state.read().await;
        let total_users = state.businesses.len() as i64;
        let active_users = state.active_businesses_where(|_| true);
        let total_reviews = state.reviews.len() as i64;
        let approved_reviews = state.reviews.values().filter(|r| r.is_approved).count() as i64;

        Ok(AdminStats {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            total_reviews,
            pending_reviews: total_reviews - approved_reviews,
            approved_reviews,
            total_cities: state.cities.len() as i64,
            total_categories: state.categories.len() as i64,
        })
    }

    async fn seed_defaults(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        if state.categories.is_empty() {
            for (name, icon) in DEFAULT_CATEGORIES {
                let id = next_id(&mut state.category_seq);
                state.categories.insert(
                    id,
                    Category {
                        id,
                        name: name.to_string(),
                        description: None,
                        icon: Some(icon.to_string()),
                        is_active: true,
                        created_at: now,
                    },
                );
            }
        }

        if state.cities.is_empty() {
            for (name, uf) in DEFAULT_CITIES {
                let id = next_id(&mut state.city_seq);
                state.cities.insert(
                    id,
                    City {
                        id,
                        name: name.to_string(),
                        state: uf.to_string(),
                        is_active: true,
                        created_at: now,
                    },
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_business(email: &str, name: &str, city_id: i64, category_id: i64) -> NewBusiness {
        NewBusiness {
            email: email.into(),
            password_hash: "hash".into(),
            business_name: name.into(),
            owner_name: "Owner".into(),
            phone: "12999887766".into(),
            whatsapp: "12999887766".into(),
            address: "Rua Guarani, 663".into(),
            description: None,
            image_url: None,
            is_active: true,
            city_id,
            category_id,
        }
    }

    fn new_review(business_id: i64, rating: i32, approved: bool) -> NewReview {
        NewReview {
            business_id,
            customer_name: "Ana".into(),
            customer_phone: None,
            rating,
            comment: None,
            is_approved: approved,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed_defaults().await.unwrap();
        store
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = seeded().await;
        store.seed_defaults().await.unwrap();

        assert_eq!(store.list_categories(true).await.unwrap().len(), DEFAULT_CATEGORIES.len());
        assert_eq!(store.list_cities(true).await.unwrap().len(), DEFAULT_CITIES.len());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = seeded().await;
        store
            .create_business(new_business("a@x.com", "A", 1, 1))
            .await
            .unwrap();
        let err = store
            .create_business(new_business("a@x.com", "B", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_city_is_rejected() {
        let store = seeded().await;
        let err = store
            .create_business(new_business("a@x.com", "A", 999, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn rating_counts_every_review() {
        let store = seeded().await;
        let business = store
            .create_business(new_business("a@x.com", "A", 1, 1))
            .await
            .unwrap();
        assert_eq!(business.rating, 0.0);

        store.create_review(new_review(business.id, 5, true)).await.unwrap();
        store.create_review(new_review(business.id, 4, false)).await.unwrap();

        let business = store.get_business(business.id).await.unwrap().unwrap();
        assert_eq!(business.rating, 4.5);
        assert_eq!(business.review_count, 2);
    }

    #[tokio::test]
    async fn approved_reviews_come_newest_first() {
        let store = seeded().await;
        let business = store
            .create_business(new_business("a@x.com", "A", 1, 1))
            .await
            .unwrap();
        let first = store.create_review(new_review(business.id, 3, true)).await.unwrap();
        store.create_review(new_review(business.id, 1, false)).await.unwrap();
        let third = store.create_review(new_review(business.id, 5, true)).await.unwrap();

        let reviews = store
            .list_reviews_for_business(business.id, true, None)
            .await
            .unwrap();
        let ids: Vec<i64> = reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);

        let latest = store
            .list_reviews_for_business(business.id, true, Some(1))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
    }

    #[tokio::test]
    async fn deleting_business_removes_its_reviews() {
        let store = seeded().await;
        let business = store
            .create_business(new_business("a@x.com", "A", 1, 1))
            .await
            .unwrap();
        let review = store.create_review(new_review(business.id, 4, true)).await.unwrap();

        assert!(store.delete_business(business.id).await.unwrap());
        assert!(store.get_review(review.id).await.unwrap().is_none());
        assert!(!store.delete_business(business.id).await.unwrap());
    }

    #[tokio::test]
    async fn referenced_category_cannot_be_deleted() {
        let store = seeded().await;
        store
            .create_business(new_business("a@x.com", "A", 2, 3))
            .await
            .unwrap();

        let err = store.delete_category(3).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let err = store.delete_city(2).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert!(store.delete_category(4).await.unwrap());
        assert!(!store.delete_category(4).await.unwrap());
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let store = seeded().await;
        for i in 0..5 {
            store
                .create_business(new_business(&format!("c{i}@x.com"), &format!("C{i}"), 1, 1))
                .await
                .unwrap();
        }
        let mut other = new_business("other@x.com", "Other", 2, 1);
        other.is_active = false;
        store.create_business(other).await.unwrap();

        let filter = BusinessFilter {
            active_only: true,
            city_id: Some(1),
            ..Default::default()
        };
        let page = store
            .list_businesses(&filter, Pagination::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|b| b.city_id == 1 && b.is_active));

        // newest first
        let first = store
            .list_businesses(&filter, Pagination::new(1, 1))
            .await
            .unwrap();
        assert_eq!(first.items[0].business_name, "C4");
    }

    #[tokio::test]
    async fn counts_only_active_businesses() {
        let store = seeded().await;
        store
            .create_business(new_business("a@x.com", "A", 1, 1))
            .await
            .unwrap();
        let mut hidden = new_business("b@x.com", "B", 1, 1);
        hidden.is_active = false;
        store.create_business(hidden).await.unwrap();

        let categories = store.list_categories(false).await.unwrap();
        let count = categories
            .iter()
            .find(|c| c.category.id == 1)
            .map(|c| c.business_count);
        assert_eq!(count, Some(1));

        let stats = store.admin_stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.inactive_users, 1);
    }

    #[tokio::test]
    async fn ensure_admin_keeps_existing_row() {
        let store = MemoryStore::new();
        let admin = NewAdmin {
            email: "admin@x.com".into(),
            password_hash: "first".into(),
            name: "Admin".into(),
        };
        let first = store.ensure_admin(admin.clone()).await.unwrap();
        let second = store
            .ensure_admin(NewAdmin {
                password_hash: "second".into(),
                ..admin
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.password_hash, "first");
    }
}
