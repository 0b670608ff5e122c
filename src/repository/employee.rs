//! The employee repository.
//!
//! Validates inputs, generates ids and timestamps, and translates store
//! outcomes into [`ServiceError`]s.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Employee, EmployeePatch, NewEmployee, normalize_name};
use crate::storage::EmployeeStore;

/// CRUD operations over employee records.
#[derive(Clone)]
pub struct EmployeeRepository {
    store: Arc<dyn EmployeeStore>,
}

fn parse_id(raw: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::validation("employee_id", format!("'{}' is not a valid id", raw)))
}

fn not_found(id: impl ToString) -> ServiceError {
    ServiceError::NotFound {
        resource: "employee",
        id: id.to_string(),
    }
}

fn id_card_conflict(id_card: &str) -> ServiceError {
    ServiceError::Conflict {
        message: format!("id_card {} is already registered to another employee", id_card),
    }
}

impl EmployeeRepository {
    /// Wraps a store.
    pub fn new(store: Arc<dyn EmployeeStore>) -> Self {
        Self { store }
    }

    /// Name of the backing store.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Checks the store is reachable.
    pub async fn ping(&self) -> ServiceResult<()> {
        self.store.ping().await?;
        Ok(())
    }

    /// Fetches an employee by id.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed id, `NotFound` when absent.
    pub async fn get(&self, id: &str) -> ServiceResult<Employee> {
        let id = parse_id(id)?;
        self.store.find_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// Fetches every employee with the given name.
    ///
    /// The name is whitespace-normalized before lookup.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, `NotFound` when nobody matches.
    pub async fn get_by_name(&self, name: &str) -> ServiceResult<Vec<Employee>> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(ServiceError::validation("name", "name must not be empty"));
        }
        let employees = self.store.find_by_names(&[normalized.clone()]).await?;
        if employees.is_empty() {
            return Err(not_found(normalized));
        }
        Ok(employees)
    }

    /// Creates an employee.
    ///
    /// # Errors
    ///
    /// `Validation` when the name is blank, `Conflict` when the identity card
    /// number is already registered.
    pub async fn create(&self, new: NewEmployee) -> ServiceResult<Employee> {
        let new = new.validated()?;
        if let Some(id_card) = &new.id_card {
            if self.store.find_by_id_card(id_card).await?.is_some() {
                return Err(id_card_conflict(id_card));
            }
        }

        let employee = Employee::from_new(new, Uuid::new_v4(), Utc::now());
        self.store.insert(&employee).await?;
        info!(employee_id = %employee.id, name = %employee.name, "Employee created");
        Ok(employee)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed id or empty patch, `NotFound` when absent,
    /// `Conflict` when the new identity card number belongs to someone else.
    pub async fn update(&self, id: &str, patch: EmployeePatch) -> ServiceResult<Employee> {
        let id = parse_id(id)?;
        let patch = patch.validated()?;
        if let Some(id_card) = &patch.id_card {
            if let Some(holder) = self.store.find_by_id_card(id_card).await? {
                if holder.id != id {
                    return Err(id_card_conflict(id_card));
                }
            }
        }

        let employee = self
            .store
            .update(id, &patch, Utc::now())
            .await?
            .ok_or_else(|| not_found(id))?;
        info!(employee_id = %id, "Employee updated");
        Ok(employee)
    }

    /// Deletes an employee, returning the removed record.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed id, `NotFound` when absent.
    pub async fn delete(&self, id: &str) -> ServiceResult<Employee> {
        let id = parse_id(id)?;
        let employee = self.store.delete(id).await?.ok_or_else(|| not_found(id))?;
        info!(employee_id = %id, "Employee deleted");
        Ok(employee)
    }

    /// Looks up many names at once, grouping matches by normalized name.
    ///
    /// Names without a match are absent from the map.
    pub async fn find_by_names(&self, names: &[String]) -> ServiceResult<HashMap<String, Vec<Employee>>> {
        let mut wanted: Vec<String> = names.iter().map(|n| normalize_name(n)).collect();
        wanted.sort();
        wanted.dedup();
        wanted.retain(|n| !n.is_empty());

        let employees = self.store.find_by_names(&wanted).await?;
        debug!(names = wanted.len(), found = employees.len(), "Batch name lookup");

        let mut grouped: HashMap<String, Vec<Employee>> = HashMap::new();
        for employee in employees {
            grouped.entry(employee.name.clone()).or_default().push(employee);
        }
        Ok(grouped)
    }
}
