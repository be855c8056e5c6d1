//! Company domain model.
//!
//! # Responsibility
//! - Define the company record, its field rules and typed partial updates.
//!
//! # Invariants
//! - Persistence never receives a company or patch that failed validation.

pub mod company;
pub mod patch;
