//! Process-local employee store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EmployeeStore, StoreError, StoreResult};
use crate::models::{Employee, EmployeePatch};

/// An [`EmployeeStore`] backed by a `HashMap`.
///
/// Enforces the same unique `id_card` rule as the MongoDB index. The store
/// can be switched into an unreachable state to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    employees: RwLock<HashMap<Uuid, Employee>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `Unavailable` (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

fn id_card_taken(
    employees: &HashMap<Uuid, Employee>,
    id_card: Option<&str>,
    except: Option<Uuid>,
) -> bool {
    let Some(id_card) = id_card else {
        return false;
    };
    employees
        .values()
        .any(|e| Some(e.id) != except && e.id_card.as_deref() == Some(id_card))
}

#[async_trait]
impl EmployeeStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Employee>> {
        self.check()?;
        Ok(self.employees.read().await.get(&id).cloned())
    }

    async fn find_by_names(&self, names: &[String]) -> StoreResult<Vec<Employee>> {
        self.check()?;
        let employees = self.employees.read().await;
        let mut found: Vec<Employee> = employees
            .values()
            .filter(|e| names.contains(&e.name))
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.created_at.timestamp_millis(), e.id));
        Ok(found)
    }

    async fn find_by_id_card(&self, id_card: &str) -> StoreResult<Option<Employee>> {
        self.check()?;
        let employees = self.employees.read().await;
        Ok(employees
            .values()
            .find(|e| e.id_card.as_deref() == Some(id_card))
            .cloned())
    }

    async fn insert(&self, employee: &Employee) -> StoreResult<()> {
        self.check()?;
        let mut employees = self.employees.write().await;
        if employees.contains_key(&employee.id) {
            return Err(StoreError::DuplicateKey(format!("_id {}", employee.id)));
        }
        if id_card_taken(&employees, employee.id_card.as_deref(), None) {
            return Err(StoreError::DuplicateKey("id_card already registered".to_string()));
        }
        employees.insert(employee.id, employee.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &EmployeePatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Employee>> {
        self.check()?;
        let mut employees = self.employees.write().await;
        if id_card_taken(&employees, patch.id_card.as_deref(), Some(id)) {
            return Err(StoreError::DuplicateKey("id_card already registered".to_string()));
        }
        Ok(employees.get_mut(&id).map(|employee| {
            employee.apply(patch, now);
            employee.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<Option<Employee>> {
        self.check()?;
        Ok(self.employees.write().await.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEmployee;

    fn employee(name: &str, id_card: Option<&str>) -> Employee {
        let new = NewEmployee {
            name: name.to_string(),
            id_card: id_card.map(str::to_string),
            ..NewEmployee::default()
        };
        Employee::from_new(new, Uuid::new_v4(), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStore::new();
        let alice = employee("张三", None);
        store.insert(&alice).await.unwrap();

        assert_eq!(store.find_by_id(alice.id).await.unwrap(), Some(alice.clone()));
        let by_name = store.find_by_names(&["张三".to_string()]).await.unwrap();
        assert_eq!(by_name, vec![alice]);
    }

    #[tokio::test]
    async fn test_find_by_names_orders_by_creation_time() {
        let store = InMemoryStore::new();
        let mut later = employee("李四", None);
        later.created_at = chrono::DateTime::from_timestamp_millis(1_700_000_000_500).unwrap();
        let mut earlier = employee("李四", None);
        earlier.created_at = chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        store.insert(&later).await.unwrap();
        store.insert(&earlier).await.unwrap();

        let found = store.find_by_names(&["李四".to_string()]).await.unwrap();
        let ids: Vec<Uuid> = found.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);
    }

    #[tokio::test]
    async fn test_duplicate_id_card_is_rejected() {
        let store = InMemoryStore::new();
        store.insert(&employee("张三", Some("110"))).await.unwrap();
        let err = store.insert(&employee("李四", Some("110"))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_to_taken_id_card_is_rejected() {
        let store = InMemoryStore::new();
        store.insert(&employee("张三", Some("110"))).await.unwrap();
        let other = employee("李四", Some("220"));
        store.insert(&other).await.unwrap();

        let patch = EmployeePatch {
            id_card: Some("110".to_string()),
            ..EmployeePatch::default()
        };
        let err = store.update(other.id, &patch, Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let store = InMemoryStore::new();
        let patch = EmployeePatch {
            remark: Some("x".to_string()),
            ..EmployeePatch::default()
        };
        assert!(store.update(Uuid::new_v4(), &patch, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_record() {
        let store = InMemoryStore::new();
        let alice = employee("张三", None);
        store.insert(&alice).await.unwrap();

        assert_eq!(store.delete(alice.id).await.unwrap(), Some(alice.clone()));
        assert!(store.find_by_id(alice.id).await.unwrap().is_none());
        assert!(store.delete(alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.find_by_id(Uuid::new_v4()).await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
