//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the company persistence contract.
//! - Isolate SQLite query details and driver error codes from the service.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to storage transport errors.

pub mod company_repo;
