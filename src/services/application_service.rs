use std::sync::Arc;

use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use tracing::{info, instrument, warn};

use crate::config::ApplicationUniqueness;
use crate::database::models::{ApplicationStatus, APPLICATION_REQUIRED_FIELDS};
use crate::database::{Collection, DocumentStore, StoreError};

use super::{parse_object_id, require_fields, ServiceError, ServiceResult};

const DUPLICATE_APPLICATION: &str = "You have already applied for this scholarship";

/// Aggregation joining a user's applications to their scholarships.
///
/// `scholarshipId` is stored as a string, so it is converted to an ObjectId
/// before the lookup; ids that do not convert simply fail to join. The unwind
/// keeps applications without a scholarship, and every projected field falls
/// back to an explicit null.
pub fn applied_view_pipeline(user_email: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "userEmail": user_email } },
        doc! {
            "$addFields": {
                "scholarshipObjectId": {
                    "$convert": {
                        "input": "$scholarshipId",
                        "to": "objectId",
                        "onError": null,
                        "onNull": null,
                    }
                }
            }
        },
        doc! {
            "$lookup": {
                "from": Collection::Scholarships.name(),
                "localField": "scholarshipObjectId",
                "foreignField": "_id",
                "as": "scholarshipDetails",
            }
        },
        doc! {
            "$unwind": {
                "path": "$scholarshipDetails",
                "preserveNullAndEmptyArrays": true,
            }
        },
        doc! {
            "$project": {
                "_id": 1,
                "universityName": { "$ifNull": ["$scholarshipDetails.universityName", null] },
                // the view exposes the scholarship's city under this name
                "universityAddress": { "$ifNull": ["$scholarshipDetails.universityCity", null] },
                "applicationFeedback": { "$ifNull": ["$applicationFeedback", null] },
                "subjectCategory": { "$ifNull": ["$scholarshipDetails.subjectCategory", null] },
                "degree": { "$ifNull": ["$scholarshipDetails.degree", null] },
                "applicationFees": { "$ifNull": ["$scholarshipDetails.applicationFees", null] },
                "serviceCharge": { "$ifNull": ["$scholarshipDetails.serviceCharge", null] },
                "status": { "$ifNull": ["$status", null] },
            }
        },
    ]
}

/// ObjectId-shaped scholarship ids are stored as lowercase hex so the
/// uniqueness check and the join see one spelling.
fn normalise_scholarship_id(fields: &mut Document) {
    let normalised = match fields.get("scholarshipId") {
        Some(Bson::String(raw)) => ObjectId::parse_str(raw.trim()).ok().map(|oid| oid.to_hex()),
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        _ => None,
    };
    if let Some(hex) = normalised {
        fields.insert("scholarshipId", hex);
    }
}

pub struct ApplicationService {
    store: Arc<dyn DocumentStore>,
    uniqueness: ApplicationUniqueness,
}

impl ApplicationService {
    pub fn new(store: Arc<dyn DocumentStore>, uniqueness: ApplicationUniqueness) -> Self {
        Self { store, uniqueness }
    }

    /// The user's applications joined with scholarship details.
    pub async fn applied_scholarships(&self, user_email: &str) -> ServiceResult<Vec<Document>> {
        let rows = self
            .store
            .aggregate(Collection::Applications, applied_view_pipeline(user_email))
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::not_found("No applied scholarships found"));
        }
        Ok(rows)
    }

    /// Record a new pending application and return its id.
    #[instrument(skip(self, fields))]
    pub async fn apply(&self, mut fields: Document) -> ServiceResult<Bson> {
        require_fields(&fields, &APPLICATION_REQUIRED_FIELDS)?;
        normalise_scholarship_id(&mut fields);
        fields.remove("_id");
        fields.insert("status", ApplicationStatus::Pending.as_str());
        fields.insert("appliedAt", DateTime::now());

        if self.uniqueness == ApplicationUniqueness::CheckThenInsert {
            let key = doc! {
                "scholarshipId": fields.get("scholarshipId").cloned().unwrap_or(Bson::Null),
                "userEmail": fields.get("userEmail").cloned().unwrap_or(Bson::Null),
            };
            if self.store.find_one(Collection::Applications, key).await?.is_some() {
                return Err(ServiceError::conflict(DUPLICATE_APPLICATION));
            }
        }

        match self.store.insert_one(Collection::Applications, fields).await {
            Ok(id) => {
                info!("Recorded application {}", id);
                Ok(id)
            }
            Err(StoreError::DuplicateKey(key)) => {
                warn!("Rejected duplicate application ({})", key);
                Err(ServiceError::conflict(DUPLICATE_APPLICATION))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> ServiceResult<()> {
        let oid = parse_object_id(id)?;
        let deleted = self
            .store
            .delete_one(Collection::Applications, doc! { "_id": oid })
            .await?;
        if deleted == 0 {
            return Err(ServiceError::not_found("Application not found"));
        }
        info!("Cancelled application {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{DatabaseManager, MemoryStore};

    struct Fixture {
        store: Arc<dyn DocumentStore>,
        applications: ApplicationService,
    }

    async fn fixture(uniqueness: ApplicationUniqueness) -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut consistency = AppConfig::development().consistency;
        consistency.application_uniqueness = uniqueness;
        DatabaseManager::ensure_indexes(store.as_ref(), &consistency).await.unwrap();
        Fixture {
            applications: ApplicationService::new(store.clone(), uniqueness),
            store,
        }
    }

    async fn scholarship(store: &Arc<dyn DocumentStore>) -> ObjectId {
        let id = store
            .insert_one(
                Collection::Scholarships,
                doc! {
                    "universityName": "X",
                    "universityCity": "Dhaka",
                    "subjectCategory": "Engineering",
                    "degree": "Masters",
                    "applicationFees": 49.99,
                    "serviceCharge": 10,
                },
            )
            .await
            .unwrap();
        id.as_object_id().unwrap()
    }

    fn application(scholarship_id: &str) -> Document {
        doc! { "scholarshipId": scholarship_id, "userEmail": "a@b.com", "userName": "A" }
    }

    #[test]
    fn pipeline_shape_is_fixed() {
        let pipeline = applied_view_pipeline("a@b.com");
        let stages: Vec<&str> = pipeline.iter().map(|s| s.keys().next().unwrap().as_str()).collect();
        assert_eq!(stages, ["$match", "$addFields", "$lookup", "$unwind", "$project"]);
        assert_eq!(pipeline[4].get_document("$project").unwrap().keys().count(), 9);
    }

    #[tokio::test]
    async fn view_joins_scholarship_details() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        let sid = scholarship(&f.store).await;
        let app_id = f.applications.apply(application(&sid.to_hex())).await.unwrap();

        let rows = f.applications.applied_scholarships("a@b.com").await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("_id"), Some(&app_id));
        assert_eq!(row.get_str("universityName").unwrap(), "X");
        assert_eq!(row.get_str("universityAddress").unwrap(), "Dhaka");
        assert_eq!(row.get_str("degree").unwrap(), "Masters");
        assert_eq!(row.get_str("status").unwrap(), "pending");
        assert_eq!(row.get("applicationFeedback"), Some(&Bson::Null));
        assert!(row.get("scholarshipDetails").is_none());
    }

    #[tokio::test]
    async fn view_keeps_applications_without_scholarship() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        let sid = scholarship(&f.store).await;
        f.applications.apply(application(&sid.to_hex())).await.unwrap();
        f.applications.apply(application("not-an-object-id")).await.unwrap();
        f.store
            .delete_one(Collection::Scholarships, doc! { "_id": sid })
            .await
            .unwrap();

        let rows = f.applications.applied_scholarships("a@b.com").await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.get("universityName"), Some(&Bson::Null));
            assert_eq!(row.get("serviceCharge"), Some(&Bson::Null));
            assert_eq!(row.get_str("status").unwrap(), "pending");
        }
    }

    #[tokio::test]
    async fn empty_view_is_not_found() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        assert!(matches!(
            f.applications.applied_scholarships("nobody@b.com").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        let result = f
            .applications
            .apply(doc! { "scholarshipId": "x", "userEmail": "", "userName": null })
            .await;
        match result {
            Err(ServiceError::Validation(msg)) => assert!(msg.contains("userEmail, userName")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_application_conflicts_in_both_modes() {
        for mode in [ApplicationUniqueness::Atomic, ApplicationUniqueness::CheckThenInsert] {
            let f = fixture(mode).await;
            let sid = scholarship(&f.store).await;
            f.applications.apply(application(&sid.to_hex())).await.unwrap();

            // same id, different case
            let again = f.applications.apply(application(&sid.to_hex().to_uppercase())).await;
            assert!(matches!(again, Err(ServiceError::Conflict(_))), "mode {:?}", mode);
        }
    }

    #[tokio::test]
    async fn client_status_is_overridden() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        let mut body = application("abc");
        body.insert("status", "completed");
        let id = f.applications.apply(body).await.unwrap();

        let stored = f
            .store
            .find_one(Collection::Applications, doc! { "_id": id })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_str("status").unwrap(), "pending");
        assert!(stored.get_datetime("appliedAt").is_ok());
    }

    #[tokio::test]
    async fn cancel_deletes_by_id() {
        let f = fixture(ApplicationUniqueness::Atomic).await;
        let id = f.applications.apply(application("abc")).await.unwrap();
        let id = id.as_object_id().unwrap().to_hex();

        f.applications.cancel(&id).await.unwrap();
        assert!(matches!(f.applications.cancel(&id).await, Err(ServiceError::NotFound(_))));
    }
}
