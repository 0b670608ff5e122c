//! Employee model and related types.
//!
//! This module defines the [`Employee`] record kept in the document store,
//! the [`NewEmployee`] creation payload and the [`EmployeePatch`] partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Removes all whitespace from a name.
///
/// Names on fee sheets are frequently typed with stray spaces ("张 三"), so
/// names are stored and compared in this normalized form.
///
/// # Examples
///
/// ```
/// use exam_data_manager::models::normalize_name;
///
/// assert_eq!(normalize_name(" 张 三 "), "张三");
/// assert_eq!(normalize_name("Li\tWei"), "LiWei");
/// ```
pub fn normalize_name(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Represents a person who takes part in exam administration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: Uuid,
    /// The employee's name, whitespace-stripped.
    pub name: String,
    /// National identity card number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card: Option<String>,
    /// Bank card (payee account) number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_card: Option<String>,
    /// Bank the payee account is held with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Department or branch campus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Payroll number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_id: Option<String>,
    /// Exam duty role (e.g. invigilator, exam affairs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Assigned exam venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Free-form remark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Builds a stored record from a validated creation payload.
    pub fn from_new(new: NewEmployee, id: Uuid, now: DateTime<Utc>) -> Self {
        Employee {
            id,
            name: new.name,
            id_card: new.id_card,
            bank_card: new.bank_card,
            bank_name: new.bank_name,
            phone: new.phone,
            department: new.department,
            salary_id: new.salary_id,
            role: new.role,
            venue: new.venue,
            remark: new.remark,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a patch in place and bumps `updated_at`.
    pub fn apply(&mut self, patch: &EmployeePatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        let fields = [
            (&mut self.id_card, &patch.id_card),
            (&mut self.bank_card, &patch.bank_card),
            (&mut self.bank_name, &patch.bank_name),
            (&mut self.phone, &patch.phone),
            (&mut self.department, &patch.department),
            (&mut self.salary_id, &patch.salary_id),
            (&mut self.role, &patch.role),
            (&mut self.venue, &patch.venue),
            (&mut self.remark, &patch.remark),
        ];
        for (target, value) in fields {
            if value.is_some() {
                *target = value.clone();
            }
        }
        self.updated_at = now;
    }
}

/// Payload for creating an employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEmployee {
    /// The employee's name (required).
    pub name: String,
    /// National identity card number.
    #[serde(default)]
    pub id_card: Option<String>,
    /// Bank card number.
    #[serde(default)]
    pub bank_card: Option<String>,
    /// Bank name.
    #[serde(default)]
    pub bank_name: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Department or branch campus.
    #[serde(default)]
    pub department: Option<String>,
    /// Payroll number.
    #[serde(default)]
    pub salary_id: Option<String>,
    /// Exam duty role.
    #[serde(default)]
    pub role: Option<String>,
    /// Assigned exam venue.
    #[serde(default)]
    pub venue: Option<String>,
    /// Free-form remark.
    #[serde(default)]
    pub remark: Option<String>,
}

impl NewEmployee {
    /// Normalizes the payload and checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when the name is blank.
    pub fn validated(self) -> ServiceResult<Self> {
        let name = normalize_name(&self.name);
        if name.is_empty() {
            return Err(ServiceError::validation("name", "employee name must not be empty"));
        }
        Ok(NewEmployee {
            name,
            id_card: clean(self.id_card),
            bank_card: clean(self.bank_card),
            bank_name: clean(self.bank_name),
            phone: clean(self.phone),
            department: clean(self.department),
            salary_id: clean(self.salary_id),
            role: clean(self.role),
            venue: clean(self.venue),
            remark: clean(self.remark),
        })
    }
}

/// Partial update for an employee. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeePatch {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New identity card number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_card: Option<String>,
    /// New bank card number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_card: Option<String>,
    /// New bank name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    /// New phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// New department.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// New payroll number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_id: Option<String>,
    /// New duty role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// New venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// New remark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl EmployeePatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &EmployeePatch::default()
    }

    /// Normalizes the patch and checks it is a meaningful update.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when the patch is empty or sets a
    /// blank name.
    pub fn validated(self) -> ServiceResult<Self> {
        let name = match self.name {
            Some(raw) => {
                let name = normalize_name(&raw);
                if name.is_empty() {
                    return Err(ServiceError::validation("name", "employee name must not be empty"));
                }
                Some(name)
            }
            None => None,
        };
        let patch = EmployeePatch {
            name,
            id_card: clean(self.id_card),
            bank_card: clean(self.bank_card),
            bank_name: clean(self.bank_name),
            phone: clean(self.phone),
            department: clean(self.department),
            salary_id: clean(self.salary_id),
            role: clean(self.role),
            venue: clean(self.venue),
            remark: clean(self.remark),
        };
        if patch.is_empty() {
            return Err(ServiceError::validation("body", "update must change at least one field"));
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_employee() -> Employee {
        let new = NewEmployee {
            name: "张三".to_string(),
            id_card: Some("110101199001011234".to_string()),
            phone: Some("13800138000".to_string()),
            ..NewEmployee::default()
        };
        Employee::from_new(new, Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_deserialize_new_employee_with_only_name() {
        let json = r#"{ "name": "李四" }"#;
        let new: NewEmployee = serde_json::from_str(json).unwrap();
        assert_eq!(new.name, "李四");
        assert!(new.id_card.is_none());
        assert!(new.venue.is_none());
    }

    #[test]
    fn test_new_employee_validation_strips_whitespace() {
        let new = NewEmployee {
            name: " 王 五 ".to_string(),
            bank_name: Some("  ".to_string()),
            venue: Some(" Building A ".to_string()),
            ..NewEmployee::default()
        };
        let validated = new.validated().unwrap();
        assert_eq!(validated.name, "王五");
        assert!(validated.bank_name.is_none());
        assert_eq!(validated.venue.as_deref(), Some("Building A"));
    }

    #[test]
    fn test_new_employee_without_name_is_rejected() {
        let new = NewEmployee {
            name: "   ".to_string(),
            ..NewEmployee::default()
        };
        let err = new.validated().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field, .. } if field == "name"));
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        let err = EmployeePatch::default().validated().unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field, .. } if field == "body"));
    }

    #[test]
    fn test_patch_with_only_blank_values_is_rejected() {
        let patch = EmployeePatch {
            remark: Some("   ".to_string()),
            ..EmployeePatch::default()
        };
        assert!(patch.validated().is_err());
    }

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut employee = create_test_employee();
        let before = employee.clone();
        let patch = EmployeePatch {
            venue: Some("Room 301".to_string()),
            ..EmployeePatch::default()
        };
        let later = before.updated_at + chrono::Duration::seconds(5);
        employee.apply(&patch, later);

        assert_eq!(employee.venue.as_deref(), Some("Room 301"));
        assert_eq!(employee.name, before.name);
        assert_eq!(employee.id_card, before.id_card);
        assert_eq!(employee.phone, before.phone);
        assert_eq!(employee.updated_at, later);
        assert_eq!(employee.created_at, before.created_at);
    }

    #[test]
    fn test_serialize_skips_absent_attributes() {
        let employee = create_test_employee();
        let json = serde_json::to_value(&employee).unwrap();
        assert_eq!(json["name"], "张三");
        assert!(json.get("venue").is_none());
        assert!(json.get("bank_card").is_none());
    }
}
