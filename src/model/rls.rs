//! Row-level-security rules and the per-request tenant context.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a dataset's mandatory tenant predicate is produced.
///
/// The mode set is closed and small, so it is a tagged variant dispatched
/// via a single match rather than a trait hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RlsMode {
    /// `column = <tenant id>`.
    Equals { column: String },

    /// A SQL condition template with `{tenant_id}` and `{attr.<name>}`
    /// placeholders substituted from the tenant context.
    Expression { template: String },
}

/// Dataset-scoped row-level-security rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlsRule {
    pub mode: RlsMode,
    /// If true, admin callers skip the predicate entirely.
    #[serde(default)]
    pub allow_admin_bypass: bool,
}

impl RlsRule {
    /// Rule filtering `column = <tenant id>`.
    pub fn equals(column: impl Into<String>) -> Self {
        Self {
            mode: RlsMode::Equals {
                column: column.into(),
            },
            allow_admin_bypass: false,
        }
    }

    /// Rule substituting a condition template.
    pub fn expression(template: impl Into<String>) -> Self {
        Self {
            mode: RlsMode::Expression {
                template: template.into(),
            },
            allow_admin_bypass: false,
        }
    }

    /// Allow admin callers to bypass this rule.
    pub fn with_admin_bypass(mut self) -> Self {
        self.allow_admin_bypass = true;
        self
    }
}

/// Opaque caller identity resolved by the authentication layer.
///
/// Attached to every request before it reaches the compiler; the compiler
/// never inspects it beyond the fields below.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TenantContext {
    pub tenant_id: Option<String>,
    pub is_admin: bool,
    pub attributes: HashMap<String, String>,
}

impl TenantContext {
    /// Context for a regular tenant.
    pub fn tenant(id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(id.into()),
            is_admin: false,
            attributes: HashMap::new(),
        }
    }

    /// Context for an admin caller.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(id.into()),
            is_admin: true,
            attributes: HashMap::new(),
        }
    }

    /// Context carrying no tenant identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
