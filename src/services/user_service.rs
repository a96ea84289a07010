use std::sync::Arc;

use mongodb::bson::{doc, Document};
use tracing::{info, instrument};

use crate::database::models::{new_user_document, Role};
use crate::database::{Collection, DocumentStore, StoreError};

use super::{parse_object_id, ServiceError, ServiceResult};

pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Role of the user with this email, if the user exists
    pub async fn get_role(&self, email: &str) -> ServiceResult<Option<String>> {
        let user = self.store.find_one(Collection::Users, doc! { "email": email }).await?;
        Ok(user.and_then(|u| u.get_str("role").ok().map(str::to_string)))
    }

    /// Return the existing record for `email`, or create one with the default role.
    ///
    /// A concurrent registration that wins the insert race surfaces as a
    /// duplicate key on the unique email index; the winner's record is returned.
    #[instrument(skip(self, profile))]
    pub async fn upsert_user(&self, email: &str, profile: Document) -> ServiceResult<Document> {
        if let Some(existing) = self.find_by_email(email).await? {
            return Ok(existing);
        }

        let user = new_user_document(email, profile);
        match self.store.insert_one(Collection::Users, user.clone()).await {
            Ok(id) => {
                info!("Registered user {}", email);
                let mut saved = doc! { "_id": id };
                for (k, v) in user {
                    saved.insert(k, v);
                }
                Ok(saved)
            }
            Err(StoreError::DuplicateKey(_)) => self
                .find_by_email(email)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("User {} not found", email))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<Document>> {
        Ok(self.store.find_one(Collection::Users, doc! { "email": email }).await?)
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<Document>> {
        Ok(self.store.find_many(Collection::Users, doc! {}).await?)
    }

    /// Set a user's role with a single conditional write. An unknown id and an
    /// unchanged role both report NotFound.
    #[instrument(skip(self))]
    pub async fn update_role(&self, id: &str, role: Option<&str>) -> ServiceResult<()> {
        let role = role
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ServiceError::validation("Role is required"))?;
        let role: Role = role.parse().map_err(ServiceError::Validation)?;
        let oid = parse_object_id(id)?;

        let outcome = self
            .store
            .update_one(
                Collection::Users,
                doc! { "_id": oid },
                doc! { "$set": { "role": role.as_str() } },
                false,
            )
            .await?;

        if outcome.modified_count == 0 {
            return Err(ServiceError::not_found("User not found or role unchanged"));
        }
        info!("Updated role of user {} to {}", id, role);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> ServiceResult<()> {
        let oid = parse_object_id(id)?;
        let deleted = self.store.delete_one(Collection::Users, doc! { "_id": oid }).await?;
        if deleted == 0 {
            return Err(ServiceError::not_found("User not found"));
        }
        info!("Deleted user {}", id);
        Ok(())
    }
}
