use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, ledgerdb::{insert_customer_in, StoreError}};
use crate::models::customermodel::{Customer, CustomerDraft, CustomerSource};

#[derive(Debug, Clone, Default)]
pub struct CustomerChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
}

#[async_trait]
pub trait CustomerExt {
    async fn get_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, sqlx::Error>;

    async fn get_customer_by_user(&self, user_id: Uuid) -> Result<Option<Customer>, sqlx::Error>;

    async fn get_customers(
        &self,
        business_id: Uuid,
        search: Option<&str>,
        source: Option<CustomerSource>,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Customer>, i64), sqlx::Error>;

    async fn save_customer(&self, draft: &CustomerDraft) -> Result<Customer, StoreError>;

    async fn update_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
        changes: CustomerChanges,
    ) -> Result<Option<Customer>, StoreError>;

    async fn deactivate_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, sqlx::Error>;
}

#[async_trait]
impl CustomerExt for DBClient {
    async fn get_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"SELECT * FROM customers WHERE id = $1 AND business_id = $2"#,
        )
        .bind(customer_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_customer_by_user(&self, user_id: Uuid) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE user_id = $1 AND active = TRUE
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_customers(
        &self,
        business_id: Uuid,
        search: Option<&str>,
        source: Option<CustomerSource>,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<Customer>, i64), sqlx::Error> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE business_id = $1
              AND active = TRUE
              AND ($2::text IS NULL
                   OR name ILIKE '%' || $2 || '%'
                   OR email ILIKE '%' || $2 || '%'
                   OR phone ILIKE '%' || $2 || '%')
              AND ($3::customer_source IS NULL OR source = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(business_id)
        .bind(search)
        .bind(source)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM customers
            WHERE business_id = $1
              AND active = TRUE
              AND ($2::text IS NULL
                   OR name ILIKE '%' || $2 || '%'
                   OR email ILIKE '%' || $2 || '%'
                   OR phone ILIKE '%' || $2 || '%')
              AND ($3::customer_source IS NULL OR source = $3)
            "#,
        )
        .bind(business_id)
        .bind(search)
        .bind(source)
        .fetch_one(&self.pool)
        .await?;

        Ok((customers, total))
    }

    async fn save_customer(&self, draft: &CustomerDraft) -> Result<Customer, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_customer_in(&mut *conn, draft).await
    }

    async fn update_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
        changes: CustomerChanges,
    ) -> Result<Option<Customer>, StoreError> {
        let email = changes.email.clone();
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                tags = COALESCE($6, tags),
                notes = COALESCE($7, notes),
                email_notifications = COALESCE($8, email_notifications),
                sms_notifications = COALESCE($9, sms_notifications),
                updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(customer_id)
        .bind(business_id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.phone)
        .bind(changes.tags)
        .bind(changes.notes)
        .bind(changes.email_notifications)
        .bind(changes.sms_notifications)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .map_or(false, |db_err| db_err.is_unique_violation());
            if duplicate {
                StoreError::DuplicateCustomerEmail(email.unwrap_or_default())
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn deactivate_customer(
        &self,
        business_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Customer>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND business_id = $2
            RETURNING *
            "#,
        )
        .bind(customer_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await
    }
}
