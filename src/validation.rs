//! Configuration validation.
//!
//! Two layers run before any device call:
//!
//! - [`validate`] checks a JSON configuration against a [`Schema`]
//!   (presence, types, allowed values, nested block counts).
//! - [`ExclusiveGroup`] enforces "at most one way to configure feature X"
//!   rules such as `existing_pool` versus `pool_members`.
//!
//! # Example
//!
//! ```
//! use bigip_provider::schema::{Schema, Attribute};
//! use bigip_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("tenant", Attribute::required_string())
//!     .with_attribute("slow_ramp_time", Attribute::optional_int64());
//!
//! let diagnostics = validate(&schema, &json!({"tenant": "t1", "slow_ramp_time": 300}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"tenant": "t1", "slow_ramp_time": "slow"}));
//! assert_eq!(diagnostics[0].attribute, Some("slow_ramp_time".to_string()));
//! ```

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Types must match, string values must be among `allowed_values` when set
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            diagnostics.push(if path.is_empty() {
                diag
            } else {
                diag.with_attribute(path)
            });
            return;
        }
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            validate_allowed_value(attr, v, path, diagnostics);
        }
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        }
    }
}

fn validate_allowed_value(
    attr: &Attribute,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.allowed_values.is_empty() {
        return;
    }
    if let Some(s) = value.as_str() {
        if !attr.allowed_values.iter().any(|allowed| allowed == s) {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                    .with_detail(format!(
                        "Expected one of [{}], got {:?}",
                        attr.allowed_values.join(", "),
                        s
                    ))
                    .with_attribute(path),
            );
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        }
        Some(Value::Array(arr)) => {
            let len = u32::try_from(arr.len()).unwrap_or(u32::MAX);

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.as_i64().is_some()
                || n.as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

// =========================================================================
// Exclusive groups
// =========================================================================

/// What an [`ExclusiveGroup`] resolves to when none of its options is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenEmpty {
    /// The feature is turned off, unless its flag is explicitly `true`.
    Disable,
    /// The feature runs in its automatic mode (e.g. SNAT automap).
    Automatic,
    /// One of the options must be given.
    Reject,
    /// Automatic mode when the flag is explicitly `true`, otherwise off.
    FollowFlag,
}

/// The outcome of resolving an [`ExclusiveGroup`] against a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupChoice {
    /// The feature is off.
    Disabled,
    /// The feature is on without any option (automatic mode).
    Automatic,
    /// The named option attribute is the one that was set.
    Selected(&'static str),
}

/// A violated exclusive-group rule, tied to the attribute at fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupViolation {
    /// Attribute the violation is reported against.
    pub attribute: &'static str,
    /// Human readable explanation.
    pub message: String,
}

impl GroupViolation {
    /// Convert into an error diagnostic pointing at the offending attribute.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error("Conflicting configuration")
            .with_detail(self.message.clone())
            .with_attribute(self.attribute)
    }
}

impl From<GroupViolation> for ProviderError {
    fn from(violation: GroupViolation) -> Self {
        ProviderError::Validation(violation.message)
    }
}

/// "At most one of these attributes may configure feature X", optionally
/// gated by an `enable_*` flag.
///
/// ```
/// use bigip_provider::validation::{ExclusiveGroup, GroupChoice, WhenEmpty};
/// use serde_json::json;
///
/// const POOL: ExclusiveGroup = ExclusiveGroup::new(
///     "pool",
///     Some("enable_pool"),
///     &["existing_pool", "pool_members"],
///     WhenEmpty::Disable,
/// );
///
/// let choice = POOL.resolve(&json!({"existing_pool": "/Common/web"})).unwrap();
/// assert_eq!(choice, GroupChoice::Selected("existing_pool"));
///
/// let err = POOL
///     .resolve(&json!({"enable_pool": false, "existing_pool": "/Common/web"}))
///     .unwrap_err();
/// assert_eq!(err.message, "existing_pool cannot be set when enable_pool is false");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusiveGroup {
    name: &'static str,
    flag: Option<&'static str>,
    options: &'static [&'static str],
    when_empty: WhenEmpty,
}

impl ExclusiveGroup {
    /// Declare a group.
    pub const fn new(
        name: &'static str,
        flag: Option<&'static str>,
        options: &'static [&'static str],
        when_empty: WhenEmpty,
    ) -> Self {
        Self {
            name,
            flag,
            options,
            when_empty,
        }
    }

    /// The feature name used in messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The option attributes of this group.
    pub fn options(&self) -> &'static [&'static str] {
        self.options
    }

    /// Decide which option of the group a configuration selects.
    pub fn resolve(&self, config: &Value) -> Result<GroupChoice, GroupViolation> {
        let flag_value = self
            .flag
            .and_then(|flag| config.get(flag))
            .and_then(Value::as_bool);
        let populated: Vec<&'static str> = self
            .options
            .iter()
            .copied()
            .filter(|option| is_populated(config.get(*option)))
            .collect();

        if flag_value == Some(false) {
            return match populated.first() {
                Some(field) => Err(GroupViolation {
                    attribute: *field,
                    message: format!(
                        "{} cannot be set when {} is false",
                        field,
                        self.flag.unwrap_or(self.name)
                    ),
                }),
                None => Ok(GroupChoice::Disabled),
            };
        }

        match populated.as_slice() {
            [] => match self.when_empty {
                WhenEmpty::Automatic => Ok(GroupChoice::Automatic),
                WhenEmpty::FollowFlag if flag_value == Some(true) => Ok(GroupChoice::Automatic),
                WhenEmpty::FollowFlag => Ok(GroupChoice::Disabled),
                WhenEmpty::Disable if flag_value != Some(true) => Ok(GroupChoice::Disabled),
                _ => Err(GroupViolation {
                    attribute: self
                        .flag
                        .or_else(|| self.options.first().copied())
                        .unwrap_or(self.name),
                    message: match self.flag.filter(|_| flag_value == Some(true)) {
                        Some(flag) => format!(
                            "{} is true but none of {} is set",
                            flag,
                            self.options.join(", ")
                        ),
                        None => format!(
                            "{} requires one of {}",
                            self.name,
                            self.options.join(", ")
                        ),
                    },
                }),
            },
            [single] => Ok(GroupChoice::Selected(*single)),
            [first, second, ..] => Err(GroupViolation {
                attribute: *second,
                message: format!(
                    "only one of {} may be set for {}, got both {} and {}",
                    self.options.join(", "),
                    self.name,
                    first,
                    second
                ),
            }),
        }
    }
}

/// Run every group against a configuration and collect diagnostics.
pub fn validate_groups(groups: &[ExclusiveGroup], config: &Value) -> Vec<Diagnostic> {
    groups
        .iter()
        .filter_map(|group| group.resolve(config).err())
        .map(|violation| violation.to_diagnostic())
        .collect()
}

/// True when an attribute carries a meaningful value.
fn is_populated(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}
