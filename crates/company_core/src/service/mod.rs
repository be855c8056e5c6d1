//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, repository calls and event publishing.
//! - Keep transport layers decoupled from storage and broker details.

pub mod company_service;
