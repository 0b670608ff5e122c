//! MongoDB-backed employee store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{EmployeeStore, StoreError, StoreResult};
use crate::config::StorageConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Employee, EmployeePatch};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Owns the MongoDB client and the employee collection.
///
/// Cloning is cheap; clones share the driver's connection pool.
#[derive(Clone, Debug)]
pub struct MongoGateway {
    client: Client,
    employees: Collection<EmployeeDocument>,
}

/// Employee as stored in MongoDB; the UUID is kept as a string `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmployeeDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bank_card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remark: Option<String>,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

/// Stored as BSON dates so server-side sorting is chronological.
fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: bson::DateTime, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(at.timestamp_millis())
        .ok_or_else(|| StoreError::Malformed(format!("{} out of range: {}", field, at)))
}

impl From<&Employee> for EmployeeDocument {
    fn from(e: &Employee) -> Self {
        EmployeeDocument {
            id: e.id.to_string(),
            name: e.name.clone(),
            id_card: e.id_card.clone(),
            bank_card: e.bank_card.clone(),
            bank_name: e.bank_name.clone(),
            phone: e.phone.clone(),
            department: e.department.clone(),
            salary_id: e.salary_id.clone(),
            role: e.role.clone(),
            venue: e.venue.clone(),
            remark: e.remark.clone(),
            created_at: to_bson_datetime(e.created_at),
            updated_at: to_bson_datetime(e.updated_at),
        }
    }
}

impl TryFrom<EmployeeDocument> for Employee {
    type Error = StoreError;

    fn try_from(d: EmployeeDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&d.id)
            .map_err(|e| StoreError::Malformed(format!("_id '{}': {}", d.id, e)))?;
        Ok(Employee {
            id,
            name: d.name,
            id_card: d.id_card,
            bank_card: d.bank_card,
            bank_name: d.bank_name,
            phone: d.phone,
            department: d.department,
            salary_id: d.salary_id,
            role: d.role,
            venue: d.venue,
            remark: d.remark,
            created_at: from_bson_datetime(d.created_at, "created_at")?,
            updated_at: from_bson_datetime(d.updated_at, "updated_at")?,
        })
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> Self {
        if is_duplicate_key(&error) {
            return StoreError::DuplicateKey(error.to_string());
        }
        match error.kind.as_ref() {
            ErrorKind::BsonDeserialization(e) => StoreError::Malformed(e.to_string()),
            ErrorKind::BsonSerialization(e) => StoreError::Malformed(e.to_string()),
            _ => StoreError::Unavailable(error.to_string()),
        }
    }
}

fn id_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

impl MongoGateway {
    /// Connects, pings the server and ensures indexes exist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the URI is invalid or the server does
    /// not answer within the configured timeout. No retry is attempted.
    pub async fn connect(config: &StorageConfig) -> ServiceResult<Self> {
        let unavailable = |e: mongodb::error::Error| ServiceError::ServiceUnavailable {
            service: "document store",
            message: e.to_string(),
        };

        let mut options = ClientOptions::parse(&config.uri).await.map_err(unavailable)?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs));

        let client = Client::with_options(options).map_err(unavailable)?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;

        let gateway = MongoGateway {
            employees: database.collection(&config.collection),
            client,
        };
        gateway.ensure_indexes().await.map_err(unavailable)?;

        info!(
            database = %config.database,
            collection = %config.collection,
            "Connected to MongoDB"
        );
        Ok(gateway)
    }

    async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let by_name = IndexModel::builder().keys(doc! { "name": 1 }).build();
        let unique_id_card = IndexModel::builder()
            .keys(doc! { "id_card": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "id_card": { "$type": "string" } })
                    .build(),
            )
            .build();
        self.employees.create_index(by_name).await?;
        self.employees.create_index(unique_id_card).await?;
        Ok(())
    }

    /// Shuts the driver down, waiting for in-flight operations.
    pub async fn close(self) {
        info!("Closing MongoDB connection");
        self.client.shutdown().await;
    }
}

#[async_trait]
impl EmployeeStore for MongoGateway {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Employee>> {
        self.employees
            .find_one(id_filter(id))
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Employee>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<EmployeeDocument> = self
            .employees
            .find(doc! { "name": { "$in": names } })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?;
        documents.into_iter().map(Employee::try_from).collect()
    }

    async fn find_by_id_card(&self, id_card: &str) -> StoreResult<Option<Employee>> {
        self.employees
            .find_one(doc! { "id_card": id_card })
            .await?
            .map(Employee::try_from)
            .transpose()
    }

    async fn insert(&self, employee: &Employee) -> StoreResult<()> {
        self.employees
            .insert_one(EmployeeDocument::from(employee))
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &EmployeePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Employee>> {
        let mut set = bson::to_document(patch).map_err(|e| StoreError::Malformed(e.to_string()))?;
        set.insert("updated_at", to_bson_datetime(now));

        let updated = self
            .employees
            .find_one_and_update(id_filter(id), doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .inspect_err(|e| warn!(employee_id = %id, error = %e, "Employee update failed"))?;
        updated.map(Employee::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Option<Employee>> {
        self.employees
            .find_one_and_delete(id_filter(id))
            .await?
            .map(Employee::try_from)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEmployee;

    #[test]
    fn test_document_round_trip_preserves_employee() {
        let new = NewEmployee {
            name: "张三".to_string(),
            bank_card: Some("6222".to_string()),
            ..NewEmployee::default()
        };
        // BSON dates keep millisecond precision
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let employee = Employee::from_new(new, Uuid::new_v4(), at);
        let document = EmployeeDocument::from(&employee);
        assert_eq!(document.id, employee.id.to_string());

        let back = Employee::try_from(document).unwrap();
        assert_eq!(back, employee);
    }

    #[test]
    fn test_document_with_bad_id_is_malformed() {
        let document = EmployeeDocument {
            id: "not-a-uuid".to_string(),
            name: "张三".to_string(),
            id_card: None,
            bank_card: None,
            bank_name: None,
            phone: None,
            department: None,
            salary_id: None,
            role: None,
            venue: None,
            remark: None,
            created_at: to_bson_datetime(Utc::now()),
            updated_at: to_bson_datetime(Utc::now()),
        };
        assert!(matches!(
            Employee::try_from(document),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_document_serializes_id_as_underscore_id() {
        let new = NewEmployee {
            name: "李四".to_string(),
            ..NewEmployee::default()
        };
        let employee = Employee::from_new(new, Uuid::new_v4(), Utc::now());
        let document = bson::to_document(&EmployeeDocument::from(&employee)).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), employee.id.to_string());
        assert!(!document.contains_key("phone"));
    }

    #[test]
    fn test_patch_becomes_set_document_without_absent_fields() {
        let patch = EmployeePatch {
            venue: Some("Room 301".to_string()),
            ..EmployeePatch::default()
        };
        let set = bson::to_document(&patch).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_str("venue").unwrap(), "Room 301");
    }

    #[test]
    fn test_timestamps_are_stored_as_bson_dates() {
        let employee = Employee::from_new(
            NewEmployee {
                name: "王五".to_string(),
                ..NewEmployee::default()
            },
            Uuid::new_v4(),
            Utc::now(),
        );
        let document = bson::to_document(&EmployeeDocument::from(&employee)).unwrap();
        let stored = document.get_datetime("created_at").unwrap();
        assert_eq!(stored.timestamp_millis(), employee.created_at.timestamp_millis());

        let whole_second = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let half_past = DateTime::from_timestamp_millis(1_700_000_000_500).unwrap();
        assert!(to_bson_datetime(whole_second) < to_bson_datetime(half_past));
    }
}
