//! Built-in functions shipped with the dispatcher.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::registry::{FunctionHandler, FunctionRequest, HandlerFuture, Query};

/// All built-ins as `(name, handler)` pairs.
pub fn all() -> Vec<(&'static str, FunctionHandler)> {
    vec![
        ("echo", sync_handler(echo)),
        ("calculate", sync_handler(calculate)),
        ("weather", sync_handler(weather)),
    ]
}

fn sync_handler(f: fn(&Query) -> Value) -> FunctionHandler {
    Arc::new(move |req: FunctionRequest| -> HandlerFuture {
        Box::pin(async move { Ok(f(&req.query)) })
    })
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Echo the `text` parameter back.
pub fn echo(query: &Query) -> Value {
    json!({
        "success": true,
        "text": query.get("text").map(String::as_str).unwrap_or("please provide a text parameter"),
        "timestamp": now_rfc3339(),
    })
}

/// Binary arithmetic on `a` and `b` with `op` in add/subtract/multiply/divide.
pub fn calculate(query: &Query) -> Value {
    let parse = |key: &str| query.get(key).and_then(|v| v.trim().parse::<f64>().ok());
    let (Some(a), Some(b)) = (parse("a"), parse("b")) else {
        return json!({
            "error": "Invalid parameters",
            "message": "parameters a and b must be numbers",
        });
    };

    let op = query
        .get("op")
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "add".to_string());

    let result = match op.as_str() {
        "add" => a + b,
        "subtract" => a - b,
        "multiply" => a * b,
        "divide" => {
            if b == 0.0 {
                return json!({
                    "error": "Division by zero",
                    "message": "divisor must not be zero",
                });
            }
            a / b
        }
        _ => {
            return json!({
                "error": "Invalid operation",
                "message": "supported operations: add, subtract, multiply, divide",
            });
        }
    };

    json!({
        "success": true,
        "operation": op,
        "a": a,
        "b": b,
        "result": result,
        "timestamp": now_rfc3339(),
    })
}

/// Canned weather for a handful of cities.
pub fn weather(query: &Query) -> Value {
    let city = query.get("city").map(String::as_str).unwrap_or("Beijing");
    let (temperature, condition) = match city {
        "Beijing" => ("20°C", "sunny"),
        "Shanghai" => ("22°C", "cloudy"),
        "Guangzhou" => ("28°C", "light rain"),
        "Shenzhen" => ("26°C", "overcast"),
        "Hangzhou" => ("21°C", "sunny"),
        _ => ("unknown", "unknown"),
    };

    json!({
        "success": true,
        "city": city,
        "temperature": temperature,
        "condition": condition,
        "timestamp": now_rfc3339(),
    })
}
