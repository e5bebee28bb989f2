use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use legate_core::{FunctionDefinition, FunctionHandler, FunctionRegistry};
use legate_openai::FunctionSchema;

/// Tag under which the built-ins are published to the assistant.
pub const DEFAULT_TAG: &str = "default";

/// Register the functions every conversation can call.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDefinition::new(
            FunctionSchema::new(
                "current_time",
                "Current UTC time in RFC 3339 format",
                json!({"type": "object", "properties": {}}),
            ),
            Arc::new(CurrentTime),
        )
        .with_tag(DEFAULT_TAG),
    );

    registry.register(
        FunctionDefinition::new(
            FunctionSchema::new(
                "calculator",
                "Binary arithmetic on two numbers",
                json!({
                    "type": "object",
                    "properties": {
                        "operation": {
                            "type": "string",
                            "enum": ["add", "subtract", "multiply", "divide"]
                        },
                        "a": {"type": "number"},
                        "b": {"type": "number"}
                    },
                    "required": ["operation", "a", "b"]
                }),
            ),
            Arc::new(Calculator),
        )
        .with_tag(DEFAULT_TAG),
    );
}

struct CurrentTime;

#[async_trait]
impl FunctionHandler for CurrentTime {
    async fn call(&self, _params: Value) -> anyhow::Result<Value> {
        Ok(json!(chrono::Utc::now().to_rfc3339()))
    }
}

struct Calculator;

#[async_trait]
impl FunctionHandler for Calculator {
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        let operation = params["operation"].as_str().unwrap_or_default();
        let a = params["a"].as_f64().unwrap_or(0.0);
        let b = params["b"].as_f64().unwrap_or(0.0);

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(anyhow::anyhow!("division by zero"));
                }
                a / b
            }
            other => return Err(anyhow::anyhow!("unsupported operation '{}'", other)),
        };

        Ok(number_value(result))
    }
}

/// Whole results are reported as integers ("4", not "4.0").
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
