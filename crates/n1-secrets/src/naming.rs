//! Secret-store naming scheme.
//!
//! The primary name for a vault's master key is `n1_vault_<uuid>`, where
//! `<uuid>` is the vault's persisted UUID (see `n1-node::vault::Vault`). A
//! vault created before a UUID was assigned, or one whose metadata map is
//! unavailable, falls back to the absolute vault path as a legacy name.

use std::path::Path;

/// Build the primary secret-store name for a vault identified by UUID
pub fn primary_name(vault_uuid: &uuid::Uuid) -> String {
    format!("n1_vault_{vault_uuid}")
}

/// Build the legacy fallback name for a vault identified by its absolute
/// path
pub fn legacy_name(vault_path: &Path) -> String {
    vault_path.to_string_lossy().into_owned()
}
