//! # Contact Repository
//!
//! Buyer delivery contacts. A buyer keeps at most one contact; the rule is
//! checked inside the creating transaction rather than by an index, so
//! older data with several contacts stays readable.

use market_core::{Contact, ContactInput, ContactPatch, CoreError};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;

const CONTACT_COLUMNS: &str =
    "id, user_id, city, street, house, structure, building, apartment, phone";

/// Repository for buyer contacts.
#[derive(Debug, Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    /// Creates a new ContactRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ContactRepository { pool }
    }

    /// Lists the contacts of a user.
    pub async fn list(&self, user_id: i64) -> DbResult<Vec<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = ?1 ORDER BY id");
        let contacts = sqlx::query_as::<_, Contact>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(contacts)
    }

    /// Gets a contact of a user.
    pub async fn get(&self, user_id: i64, id: i64) -> DbResult<Option<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1 AND user_id = ?2");
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    /// Whether the user has any contact on file.
    pub async fn exists_for(&self, user_id: i64) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Creates the user's contact.
    ///
    /// Input must be validated by the caller.
    ///
    /// ## Errors
    /// - `Uniqueness` when the user already has a contact
    pub async fn create(&self, user_id: i64, input: &ContactInput) -> DbResult<Contact> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(CoreError::duplicate("contact", user_id).into());
        }

        let id = sqlx::query(
            r#"
            INSERT INTO contacts (
                user_id, city, street, house, structure, building, apartment, phone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(user_id)
        .bind(input.city.trim())
        .bind(input.street.trim())
        .bind(&input.house)
        .bind(&input.structure)
        .bind(&input.building)
        .bind(&input.apartment)
        .bind(input.phone.trim())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        info!(user_id, contact_id = id, "Contact created");

        Ok(Contact {
            id,
            user_id,
            city: input.city.trim().to_string(),
            street: input.street.trim().to_string(),
            house: input.house.clone(),
            structure: input.structure.clone(),
            building: input.building.clone(),
            apartment: input.apartment.clone(),
            phone: input.phone.trim().to_string(),
        })
    }

    /// Applies a partial update to one of the user's contacts.
    ///
    /// ## Errors
    /// - `NotFound` when the contact is missing or belongs to someone else
    pub async fn update(&self, user_id: i64, id: i64, patch: &ContactPatch) -> DbResult<Contact> {
        let current = self
            .get(user_id, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Contact", id))?;

        let merged = Contact {
            city: patch.city.clone().unwrap_or(current.city),
            street: patch.street.clone().unwrap_or(current.street),
            house: patch.house.clone().or(current.house),
            structure: patch.structure.clone().or(current.structure),
            building: patch.building.clone().or(current.building),
            apartment: patch.apartment.clone().or(current.apartment),
            phone: patch.phone.clone().unwrap_or(current.phone),
            ..current
        };

        sqlx::query(
            r#"
            UPDATE contacts SET
                city = ?1, street = ?2, house = ?3, structure = ?4,
                building = ?5, apartment = ?6, phone = ?7
            WHERE id = ?8 AND user_id = ?9
            "#,
        )
        .bind(&merged.city)
        .bind(&merged.street)
        .bind(&merged.house)
        .bind(&merged.structure)
        .bind(&merged.building)
        .bind(&merged.apartment)
        .bind(&merged.phone)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        debug!(user_id, contact_id = id, "Contact updated");
        Ok(merged)
    }

    /// Deletes contacts of the user by id; returns the number removed.
    pub async fn delete(&self, user_id: i64, ids: &[i64]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM contacts WHERE user_id = ");
        query.push_bind(user_id).push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query.build().execute(&self.pool).await?;

        info!(user_id, deleted = result.rows_affected(), "Contacts deleted");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
