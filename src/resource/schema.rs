//! Schema descriptors
//!
//! Each resource and data source declares its attributes here. The
//! schema validates a configuration before any remote call and computes
//! which attributes changed between two configurations.

use crate::error::{ProviderError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Compiled `Validator::Pattern` expressions, keyed by source
static PATTERNS: LazyLock<Mutex<HashMap<&'static str, Regex>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &'static str) -> std::result::Result<Regex, String> {
    let mut cache = PATTERNS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern).map_err(|e| e.to_string())?;
    cache.insert(pattern, re.clone());
    Ok(re)
}

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Bool,
    Number,
    List,
    /// Unordered collection; element order is ignored when diffing
    Set,
    Map,
}

/// How an attribute is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Set by the remote system only
    Computed,
    /// Optional in configuration, filled in from the remote system when absent
    OptionalComputed,
}

/// Constraint applied to string values (and to each string inside a list)
#[derive(Debug, Clone)]
pub enum Validator {
    LengthBetween(usize, usize),
    OneOf(&'static [&'static str]),
    Pattern {
        pattern: &'static str,
        message: &'static str,
    },
    NotEmpty,
    JsonDocument,
}

impl Validator {
    pub fn check(&self, value: &str) -> std::result::Result<(), String> {
        match self {
            Validator::LengthBetween(min, max) => {
                let len = value.chars().count();
                if len < *min || len > *max {
                    return Err(format!(
                        "expected length to be in the range ({} - {}), got {}",
                        min, max, len
                    ));
                }
            }
            Validator::OneOf(allowed) => {
                if !allowed.contains(&value) {
                    return Err(format!("expected to be one of {:?}, got {}", allowed, value));
                }
            }
            Validator::Pattern { pattern, message } => {
                let re = compiled(pattern)?;
                if !re.is_match(value) {
                    return Err(message.to_string());
                }
            }
            Validator::NotEmpty => {
                if value.is_empty() {
                    return Err("must not be empty".to_string());
                }
            }
            Validator::JsonDocument => {
                serde_json::from_str::<Value>(value)
                    .map_err(|e| format!("contains an invalid JSON document: {}", e))?;
            }
        }
        Ok(())
    }
}

/// A single attribute declaration
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: AttrType,
    pub presence: Presence,
    pub force_new: bool,
    pub default: Option<&'static str>,
    pub validators: Vec<Validator>,
    /// Schema of nested block elements
    pub block: Option<Schema>,
}

impl Attribute {
    pub fn new(name: &'static str, ty: AttrType, presence: Presence) -> Self {
        Self {
            name,
            ty,
            presence,
            force_new: false,
            default: None,
            validators: Vec::new(),
            block: None,
        }
    }

    pub fn required(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Presence::Required)
    }

    pub fn optional(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Presence::Optional)
    }

    pub fn computed(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Presence::Computed)
    }

    pub fn optional_computed(name: &'static str, ty: AttrType) -> Self {
        Self::new(name, ty, Presence::OptionalComputed)
    }

    /// Changing this attribute requires replacing the resource
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Nested block (a list/set of objects or a single object)
    pub fn block(mut self, schema: Schema) -> Self {
        self.block = Some(schema);
        self
    }

    pub fn is_mutable(&self) -> bool {
        !self.force_new && self.presence != Presence::Computed
    }
}

/// Attribute schema of one resource, data source, or nested block
#[derive(Debug, Clone)]
pub struct Schema {
    pub type_name: &'static str,
    pub attributes: Vec<Attribute>,
}

/// Attributes that differ between two configurations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub changed: Vec<&'static str>,
    pub replace: Vec<&'static str>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn has_change(&self, name: &str) -> bool {
        self.changed.contains(&name)
    }

    pub fn has_changes(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_change(n))
    }

    pub fn requires_replace(&self) -> bool {
        !self.replace.is_empty()
    }
}

impl Schema {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Validate a serialized configuration against the schema
    pub fn validate(&self, config: &Value) -> Result<()> {
        self.validate_at(config, "")
    }

    fn validate_at(&self, config: &Value, prefix: &str) -> Result<()> {
        for attribute in &self.attributes {
            let path = if prefix.is_empty() {
                attribute.name.to_string()
            } else {
                format!("{}.{}", prefix, attribute.name)
            };
            let value = config.get(attribute.name).filter(|v| !is_absent(v));

            let Some(value) = value else {
                if attribute.presence == Presence::Required {
                    return Err(ProviderError::validation(path, "required attribute is not set"));
                }
                continue;
            };

            if attribute.presence == Presence::Computed {
                return Err(ProviderError::validation(path, "computed attribute cannot be set"));
            }

            check_type(attribute.ty, value).map_err(|m| ProviderError::validation(&path, m))?;

            for s in string_values(value) {
                for validator in &attribute.validators {
                    validator
                        .check(s)
                        .map_err(|m| ProviderError::validation(&path, m))?;
                }
            }

            if let Some(block) = &attribute.block {
                match value {
                    Value::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            block.validate_at(item, &format!("{}.{}", path, i))?;
                        }
                    }
                    other => block.validate_at(other, &path)?,
                }
            }
        }
        Ok(())
    }

    /// Compare two serialized configurations attribute by attribute.
    /// Null and absent are equal; sets ignore element order.
    pub fn diff(&self, prior: &Value, desired: &Value) -> Diff {
        let mut diff = Diff::default();
        for attribute in &self.attributes {
            if attribute.presence == Presence::Computed {
                continue;
            }
            let old = normalize(attribute, prior.get(attribute.name));
            let new = normalize(attribute, desired.get(attribute.name));
            if old != new {
                diff.changed.push(attribute.name);
                if attribute.force_new {
                    diff.replace.push(attribute.name);
                }
            }
        }
        diff
    }
}

fn is_absent(value: &Value) -> bool {
    value.is_null()
}

fn check_type(ty: AttrType, value: &Value) -> std::result::Result<(), String> {
    let ok = match ty {
        AttrType::String => value.is_string(),
        AttrType::Bool => value.is_boolean(),
        AttrType::Number => value.is_number(),
        AttrType::List | AttrType::Set => value.is_array(),
        AttrType::Map => value.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("expected {:?}, got {}", ty, value))
    }
}

fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    }
}

fn normalize(attribute: &Attribute, value: Option<&Value>) -> Value {
    let value = match value {
        Some(v) if !is_absent(v) => v.clone(),
        _ => match attribute.default {
            Some(d) => Value::String(d.to_string()),
            None => return Value::Null,
        },
    };

    match (attribute.ty, value) {
        (AttrType::Set, Value::Array(items)) => {
            let mut items: Vec<String> = items.iter().map(canonical_element).collect();
            items.sort();
            Value::Array(items.into_iter().map(Value::String).collect())
        }
        (AttrType::List | AttrType::Map, Value::Array(items)) if items.is_empty() => Value::Null,
        (AttrType::Map, Value::Object(map)) if map.is_empty() => Value::Null,
        (_, v) => v,
    }
}

/// Canonical form of a set element, with nested arrays sorted too so that
/// blocks containing sets compare by content
fn canonical_element(value: &Value) -> String {
    fn sort_nested(value: &Value) -> Value {
        match value {
            Value::Array(items) => {
                let mut items: Vec<Value> = items.iter().map(sort_nested).collect();
                items.sort_by_key(|v| v.to_string());
                Value::Array(items)
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), sort_nested(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
    sort_nested(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("test_thing")
            .attribute(
                Attribute::required("name", AttrType::String)
                    .force_new()
                    .validate(Validator::LengthBetween(3, 8)),
            )
            .attribute(Attribute::optional("description", AttrType::String))
            .attribute(
                Attribute::optional("kind", AttrType::String)
                    .default_value("data")
                    .validate(Validator::OneOf(&["data", "network"])),
            )
            .attribute(Attribute::optional("tags", AttrType::Map))
            .attribute(
                Attribute::optional("rule", AttrType::Set).block(
                    Schema::new("rule")
                        .attribute(Attribute::required("name", AttrType::String))
                        .attribute(Attribute::optional("values", AttrType::Set)),
                ),
            )
            .attribute(Attribute::computed("arn", AttrType::String))
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        let config = json!({"name": "abcd", "kind": "network", "rule": [{"name": "r"}]});
        schema().validate(&config).unwrap();
    }

    #[test]
    fn test_validate_required() {
        let err = schema().validate(&json!({"description": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for name: required attribute is not set");
    }

    #[test]
    fn test_validate_length_and_enum() {
        assert!(schema().validate(&json!({"name": "ab"})).is_err());
        assert!(schema().validate(&json!({"name": "abcd", "kind": "other"})).is_err());
    }

    #[test]
    fn test_validate_nested_block_reports_path() {
        let err = schema()
            .validate(&json!({"name": "abcd", "rule": [{"name": "ok"}, {"values": []}]}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for rule.1.name: required attribute is not set"
        );
    }

    #[test]
    fn test_validate_rejects_computed() {
        assert!(schema().validate(&json!({"name": "abcd", "arn": "x"})).is_err());
    }

    #[test]
    fn test_validate_pattern() {
        let validator = Validator::Pattern {
            pattern: r"^[a-zA-Z0-9._-]*$",
            message: "must contain only alphanumeric characters, hyphens, underscores, and periods",
        };
        assert!(validator.check("default").is_ok());
        assert!(validator.check("bad space").is_err());
    }

    #[test]
    fn test_pattern_is_compiled_once() {
        const PATTERN: &str = r"^cached-[0-9]+$";
        let validator = Validator::Pattern {
            pattern: PATTERN,
            message: "must be cached-N",
        };
        for _ in 0..3 {
            assert!(validator.check("cached-7").is_ok());
        }
        assert_eq!(validator.check("cached-").unwrap_err(), "must be cached-N");

        let cache = PATTERNS.lock().unwrap();
        assert_eq!(cache.get(PATTERN).map(|re| re.as_str()), Some(PATTERN));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let validator = Validator::Pattern {
            pattern: r"^(unclosed$",
            message: "unused",
        };
        assert!(validator.check("x").unwrap_err().contains("unclosed"));
        assert!(!PATTERNS.lock().unwrap().contains_key(r"^(unclosed$"));
    }

    #[test]
    fn test_diff_ignores_null_and_default() {
        let prior = json!({"name": "abcd", "description": null});
        let desired = json!({"name": "abcd", "kind": "data", "tags": {}});
        assert!(schema().diff(&prior, &desired).is_empty());
    }

    #[test]
    fn test_diff_marks_force_new() {
        let diff = schema().diff(
            &json!({"name": "abcd", "description": "a"}),
            &json!({"name": "efgh", "description": "b"}),
        );
        assert_eq!(diff.changed, vec!["name", "description"]);
        assert_eq!(diff.replace, vec!["name"]);
        assert!(diff.requires_replace());
    }

    #[test]
    fn test_diff_set_ignores_order() {
        let prior = json!({"name": "abcd", "rule": [{"name": "a", "values": ["1", "2"]}, {"name": "b"}]});
        let desired = json!({"name": "abcd", "rule": [{"name": "b"}, {"name": "a", "values": ["2", "1"]}]});
        assert!(schema().diff(&prior, &desired).is_empty());
    }
}
