//! Mandatory row-level-security predicate injection.
//!
//! Predicates produced here are appended after all user predicates and are
//! never visible to, nor removable by, the caller. A missing tenant identity
//! on a dataset that requires one is a hard failure: row-level security
//! always fails closed.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::{Dataset, RlsMode, TenantContext};
use crate::plan::{FilterOp, FilterValue, Predicate, PredicateOrigin};

/// Placeholders recognized in expression-mode templates.
static TEMPLATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(tenant_id|attr\.[A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Errors raised during predicate injection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RlsError {
    #[error(
        "dataset '{dataset}' requires a tenant identity for row-level security \
         (filter column '{column}')"
    )]
    MissingTenantContext { dataset: String, column: String },

    #[error(
        "row-level security on dataset '{dataset}' references tenant attribute \
         '{attribute}', which the caller context does not carry"
    )]
    MissingAttribute { dataset: String, attribute: String },
}

pub type RlsResult<T> = Result<T, RlsError>;

/// Produce the mandatory predicates for one dataset.
///
/// Returns an empty list when the dataset has no rule, or when the caller is
/// an admin and the rule allows admin bypass. Otherwise exactly one
/// predicate is produced.
pub fn inject_rls(dataset: &Dataset, tenant: &TenantContext) -> RlsResult<Vec<Predicate>> {
    let Some(rule) = &dataset.rls else {
        return Ok(Vec::new());
    };

    if tenant.is_admin && rule.allow_admin_bypass {
        return Ok(Vec::new());
    }

    let predicate = match &rule.mode {
        RlsMode::Equals { column } => {
            let tenant_id =
                tenant
                    .tenant_id
                    .as_deref()
                    .ok_or_else(|| RlsError::MissingTenantContext {
                        dataset: dataset.id.clone(),
                        column: column.clone(),
                    })?;
            Predicate::Compare {
                dataset: dataset.id.clone(),
                field: column.clone(),
                op: FilterOp::Eq,
                value: FilterValue::String(tenant_id.to_string()),
                origin: PredicateOrigin::RowLevelSecurity,
            }
        }
        RlsMode::Expression { template } => Predicate::Expression {
            dataset: dataset.id.clone(),
            sql: substitute_template(dataset, template, tenant)?,
            origin: PredicateOrigin::RowLevelSecurity,
        },
    };

    Ok(vec![predicate])
}

/// Substitute `{tenant_id}` and `{attr.<name>}` placeholders.
fn substitute_template(
    dataset: &Dataset,
    template: &str,
    tenant: &TenantContext,
) -> RlsResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last_end = 0;

    for capture in TEMPLATE_PATTERN.captures_iter(template) {
        let whole = capture.get(0).expect("capture 0 always present");
        let name = &capture[1];

        out.push_str(&template[last_end..whole.start()]);
        last_end = whole.end();

        if name == "tenant_id" {
            let tenant_id =
                tenant
                    .tenant_id
                    .as_deref()
                    .ok_or_else(|| RlsError::MissingTenantContext {
                        dataset: dataset.id.clone(),
                        column: "tenant_id".to_string(),
                    })?;
            out.push_str(tenant_id);
        } else {
            let attribute = name.trim_start_matches("attr.");
            let value =
                tenant
                    .attributes
                    .get(attribute)
                    .ok_or_else(|| RlsError::MissingAttribute {
                        dataset: dataset.id.clone(),
                        attribute: attribute.to_string(),
                    })?;
            out.push_str(value);
        }
    }

    out.push_str(&template[last_end..]);
    Ok(out)
}
