// ironlayer-store-sqlite/src/lib.rs
// ============================================================================
// Module: IronLayer SQLite Store Library
// Description: Public API surface for the SQLite-backed repository layer.
// Purpose: Expose the store, tenant-bound repositories, and dialect strategy.
// Dependencies: crate::{store, repos}
// ============================================================================

//! ## Overview
//! Durable tenant-scoped persistence for IronLayer over `SQLite`. A
//! [`SqliteStore`] owns the connection; a [`TenantRepository`] is bound to
//! one tenant at construction and implements every storage interface from
//! `ironlayer-core`. Row-level isolation is enforced in every query: a
//! repository can never return a row owned by a different tenant.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod repos;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use repos::TenantRepository;
pub use store::DialectUpsert;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
