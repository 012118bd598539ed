//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine planning and repository persistence into
//!   use-case level APIs.
//! - Keep presentation layers decoupled from storage details.

pub mod task_service;
