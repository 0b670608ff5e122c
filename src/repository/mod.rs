//! Employee CRUD on top of an [`EmployeeStore`](crate::storage::EmployeeStore).

mod employee;

pub use employee::EmployeeRepository;
