//! Content hashing for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::TenantContext;
use crate::plan::ResolvedQueryPlan;

/// Compute SHA256 hash of a serializable value.
///
/// The value is serialized to JSON before hashing, ensuring deterministic
/// output (struct field order is declaration order; the plan contains no
/// maps). Returns a 64-character lowercase hexadecimal string.
///
/// # Errors
/// Returns an error if the value cannot be serialized to JSON.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// A cache key: the hash plus the canonical material it was computed from.
///
/// The canonical form is kept alongside the hash so lookups can detect
/// fingerprint collisions instead of returning another plan's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub canonical: String,
}

/// Key material: the canonical plan plus the tenant identity.
///
/// Tenant attributes are not part of the key directly; attribute-dependent
/// row-level-security predicates are already substituted into the plan.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    plan: &'a ResolvedQueryPlan,
    tenant_id: Option<&'a str>,
}

/// Fingerprint a canonical plan for a tenant.
pub fn fingerprint(
    plan: &ResolvedQueryPlan,
    tenant: &TenantContext,
) -> Result<Fingerprint, serde_json::Error> {
    let material = KeyMaterial {
        plan,
        tenant_id: tenant.tenant_id.as_deref(),
    };
    let canonical = serde_json::to_string(&material)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Ok(Fingerprint { hash, canonical })
}
