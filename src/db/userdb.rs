use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, ledgerdb::{insert_customer_in, StoreError}};
use crate::models::{
    businessmodel::Business,
    customermodel::{Customer, CustomerDraft},
    usermodel::{User, UserRole},
};

#[derive(Debug, Clone)]
pub struct NewBusinessProfile {
    pub business_name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BusinessChanges {
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub default_reward_amount: Option<f64>,
    pub default_referral_expiration_days: Option<i32>,
}

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Creates the login and its business in one transaction.
    async fn save_business_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        profile: NewBusinessProfile,
    ) -> Result<(User, Business), sqlx::Error>;

    /// Creates a customer login. An existing customer row of the business with
    /// the same email is claimed instead of creating a second one.
    async fn save_customer_user(
        &self,
        email: &str,
        password_hash: &str,
        customer: CustomerDraft,
    ) -> Result<(User, Customer), StoreError>;
}

#[async_trait]
pub trait BusinessExt {
    async fn get_business_by_user(&self, user_id: Uuid) -> Result<Option<Business>, sqlx::Error>;

    async fn update_business(
        &self,
        business_id: Uuid,
        changes: BusinessChanges,
    ) -> Result<Business, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE LOWER(email) = LOWER($1)"#)
                .bind(email.trim())
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn save_business_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        profile: NewBusinessProfile,
    ) -> Result<(User, Business), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(UserRole::Business)
        .fetch_one(&mut *tx)
        .await?;

        let business = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                user_id, business_name, description, industry, website, contact_email, contact_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(&profile.business_name)
        .bind(&profile.description)
        .bind(&profile.industry)
        .bind(&profile.website)
        .bind(&user.email)
        .bind(&profile.contact_phone)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, business))
    }

    async fn save_customer_user(
        &self,
        email: &str,
        password_hash: &str,
        customer: CustomerDraft,
    ) -> Result<(User, Customer), StoreError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&customer.name)
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .bind(UserRole::Customer)
        .fetch_one(&mut *tx)
        .await?;

        let claimed = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET user_id = $3, updated_at = NOW()
            WHERE business_id = $1 AND LOWER(email) = LOWER($2) AND user_id IS NULL
            RETURNING *
            "#,
        )
        .bind(customer.business_id)
        .bind(email.trim())
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?;

        let customer = match claimed {
            Some(existing) => existing,
            None => {
                let draft = CustomerDraft {
                    user_id: Some(user.id),
                    ..customer
                };
                insert_customer_in(&mut *tx, &draft).await?
            }
        };

        tx.commit().await?;
        Ok((user, customer))
    }
}

#[async_trait]
impl BusinessExt for DBClient {
    async fn get_business_by_user(&self, user_id: Uuid) -> Result<Option<Business>, sqlx::Error> {
        sqlx::query_as::<_, Business>(r#"SELECT * FROM businesses WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_business(
        &self,
        business_id: Uuid,
        changes: BusinessChanges,
    ) -> Result<Business, sqlx::Error> {
        sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses SET
                business_name = COALESCE($2, business_name),
                description = COALESCE($3, description),
                industry = COALESCE($4, industry),
                website = COALESCE($5, website),
                contact_email = COALESCE($6, contact_email),
                contact_phone = COALESCE($7, contact_phone),
                email_notifications = COALESCE($8, email_notifications),
                sms_notifications = COALESCE($9, sms_notifications),
                default_reward_amount = COALESCE($10, default_reward_amount),
                default_referral_expiration_days = COALESCE($11, default_referral_expiration_days),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(changes.business_name)
        .bind(changes.description)
        .bind(changes.industry)
        .bind(changes.website)
        .bind(changes.contact_email)
        .bind(changes.contact_phone)
        .bind(changes.email_notifications)
        .bind(changes.sms_notifications)
        .bind(changes.default_reward_amount)
        .bind(changes.default_referral_expiration_days)
        .fetch_one(&self.pool)
        .await
    }
}
