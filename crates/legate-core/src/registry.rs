use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use legate_openai::FunctionSchema;

use crate::error::{Error, Result};

/// Local implementation behind a registered function.
///
/// Handlers report their own failures through `anyhow`; the registry
/// propagates them unmodified. A panicking handler is not caught.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, params: Value) -> anyhow::Result<Value>;
}

/// A callable function: published schema plus the handler that backs it.
#[derive(Clone)]
pub struct FunctionDefinition {
    pub schema: FunctionSchema,
    pub tags: Vec<String>,
    handler: Arc<dyn FunctionHandler>,
}

impl FunctionDefinition {
    pub fn new(schema: FunctionSchema, handler: Arc<dyn FunctionHandler>) -> Self {
        Self {
            schema,
            tags: Vec::new(),
            handler,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Registry of callable functions, keyed by name.
///
/// Registration order is preserved; registering a name again replaces the
/// definition in its original slot. Built once at startup and then shared
/// read-only.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: Vec<FunctionDefinition>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: FunctionDefinition) {
        match self
            .functions
            .iter_mut()
            .find(|existing| existing.name() == definition.name())
        {
            Some(slot) => *slot = definition,
            None => self.functions.push(definition),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|def| def.name() == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Schemas of every function carrying the tag, in registration order.
    pub fn schemas_by_tag(&self, tag: &str) -> Vec<FunctionSchema> {
        self.functions
            .iter()
            .filter(|def| def.has_tag(tag))
            .map(|def| def.schema.clone())
            .collect()
    }

    /// Validate `params` against the declared schema, then call the handler.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value> {
        let definition = self
            .lookup(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;

        validate_params(name, &definition.schema.parameters, &params)?;

        tracing::debug!("Invoking function '{}'", name);
        Ok(definition.handler.call(params).await?)
    }
}

/// Shallow JSON Schema check: required properties are present and supplied
/// values match their declared primitive type. Nested schemas are not
/// descended into.
fn validate_params(function: &str, schema: &Value, params: &Value) -> Result<()> {
    let empty = serde_json::Map::new();
    let supplied = params.as_object().unwrap_or(&empty);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !supplied.contains_key(name) {
                return Err(Error::InvalidParameters {
                    function: function.to_string(),
                    reason: format!("missing required parameter '{}'", name),
                });
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in supplied {
            let expected = match properties
                .get(name)
                .and_then(|property| property.get("type"))
                .and_then(Value::as_str)
            {
                Some(expected) => expected,
                None => continue,
            };

            if !type_matches(expected, value) {
                return Err(Error::InvalidParameters {
                    function: function.to_string(),
                    reason: format!("parameter '{}' is not of type '{}'", name, expected),
                });
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}
