// ironlayer-core/src/core/identifiers.rs
// ============================================================================
// Module: IronLayer Identifiers
// Description: Canonical opaque identifiers for IronLayer entities.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! IronLayer. Identifiers are opaque and serialize as strings. Validation is
//! handled at service boundaries rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier newtype.
macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_id! {
    /// Tenant identifier scoping every persisted row.
    TenantId
}

string_id! {
    /// Dotted model name, e.g. `staging.orders`.
    ModelName
}

string_id! {
    /// Content-addressed plan identifier (64-char lowercase hex).
    PlanId
}

string_id! {
    /// Content-addressed plan step identifier (64-char lowercase hex).
    StepId
}

string_id! {
    /// Run record identifier.
    RunId
}

string_id! {
    /// Token identifier claim used as the revocation key.
    Jti
}
