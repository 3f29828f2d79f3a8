//! Tool argument normalization.
//!
//! Models invent argument spellings (`qty`, `orderType`, `underlying`) and
//! loose value forms (`"side": "Long"`, `"quantity": "1.0"`). Each trading
//! tool has an alias table mapping those to the canonical names, followed by
//! value coercion and a required-argument check. Unmapped keys pass through
//! so genuinely extra arguments still reach the tool.

use serde_json::{Map, Value};

use crate::error::AgentError;

/// Alias sentinel: keys mapped to `DROP` are removed entirely.
const DROP: &str = "";

fn alias_table(tool: &str) -> &'static [(&'static str, &'static str)] {
    match tool {
        "place_option_order" => &[
            ("qty", "quantity"),
            ("orderType", "order_type"),
            ("limitPrice", "limit_price"),
            ("timeInForce", "time_in_force"),
            ("transactTime", DROP),
            ("transact_time", DROP),
        ],
        "place_multi_leg_option_order" => &[
            ("qty", "quantity"),
            ("orderType", "order_type"),
            ("limitPrice", "limit_price"),
            ("timeInForce", "time_in_force"),
        ],
        "close_option_position" => &[("qty", "quantity")],
        "get_option_contracts" => &[
            ("underlying", "underlying_symbol"),
            ("symbol", "underlying_symbol"),
            ("type", "contract_type"),
            ("expiration_after", "expiration_date_gte"),
            ("expiration_before", "expiration_date_lte"),
            ("strike_gte", "strike_price_gte"),
            ("strike_lte", "strike_price_lte"),
        ],
        "get_options_chain" => &[
            ("underlying", "underlying_symbol"),
            ("symbol", "underlying_symbol"),
            ("expiration", "expiration_date"),
            ("type", "contract_type"),
        ],
        "cancel_order" => &[("id", "order_id"), ("orderId", "order_id")],
        _ => &[],
    }
}

fn required_keys(tool: &str) -> &'static [&'static str] {
    match tool {
        "place_option_order" => &["symbol", "side", "quantity"],
        "place_multi_leg_option_order" => &["legs", "quantity"],
        "close_option_position" => &["symbol"],
        "cancel_order" => &["order_id"],
        _ => &[],
    }
}

/// Map a model-provided side value onto "buy" or "sell". Unknown or missing
/// values default to buy, loudly.
pub fn normalize_side(raw: Option<&str>) -> String {
    match raw.map(|s| s.to_lowercase()) {
        Some(side) if ["buy", "long", "b", "l", "purchase"].contains(&side.as_str()) => {
            "buy".to_string()
        }
        Some(side) if ["sell", "short", "s"].contains(&side.as_str()) => "sell".to_string(),
        other => {
            tracing::warn!(side = ?other, "unrecognized side value, defaulting to buy");
            "buy".to_string()
        }
    }
}

fn normalize_order_type(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "market" | "marketorder" => "market".to_string(),
        "limit" | "limitorder" => "limit".to_string(),
        other => {
            tracing::warn!(order_type = other, "unrecognized order type, defaulting to market");
            "market".to_string()
        }
    }
}

fn coerce_quantity(tool: &str, raw: &Value) -> Result<i64, AgentError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(q) => Ok(q.trunc() as i64),
        None => Err(AgentError::Validation(format!(
            "Invalid quantity value {raw} for {tool}"
        ))),
    }
}

fn normalize_legs(value: &Value) -> Result<Value, AgentError> {
    let Some(legs) = value.as_array() else {
        return Err(AgentError::Validation(
            "Each leg must be a dictionary".to_string(),
        ));
    };
    if legs.is_empty() {
        return Err(AgentError::Validation(
            "place_multi_leg_option_order requires 'legs' to be a non-empty list".to_string(),
        ));
    }
    let mut normalized = Vec::with_capacity(legs.len());
    for leg in legs {
        let Some(leg_map) = leg.as_object() else {
            return Err(AgentError::Validation(
                "Each leg must be a dictionary".to_string(),
            ));
        };
        if !leg_map.contains_key("symbol") {
            return Err(AgentError::Validation(
                "Each leg must have a 'symbol' field".to_string(),
            ));
        }
        if !leg_map.contains_key("side") {
            return Err(AgentError::Validation(
                "Each leg must have a 'side' field".to_string(),
            ));
        }
        let mut leg_map = leg_map.clone();
        let side = normalize_side(leg_map.get("side").and_then(Value::as_str));
        leg_map.insert("side".to_string(), Value::String(side));
        normalized.push(Value::Object(leg_map));
    }
    Ok(Value::Array(normalized))
}

/// Normalize raw tool-call arguments for `tool`.
///
/// Non-object input yields an empty map; tools without an alias table pass
/// through untouched. Validation failures are `AgentError::Validation`.
pub fn normalize_parameters(tool: &str, raw: &Value) -> Result<Map<String, Value>, AgentError> {
    let Some(input) = raw.as_object() else {
        return Ok(Map::new());
    };

    let aliases = alias_table(tool);
    let mut args = Map::new();
    for (key, value) in input {
        match aliases.iter().find(|(from, _)| from == key) {
            Some((_, to)) if *to == DROP => continue,
            Some((_, to)) => {
                args.insert((*to).to_string(), value.clone());
            }
            None => {
                args.insert(key.clone(), value.clone());
            }
        }
    }

    let missing: Vec<&str> = required_keys(tool)
        .iter()
        .filter(|key| !args.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        let received: Vec<&str> = input.keys().map(String::as_str).collect();
        return Err(AgentError::Validation(format!(
            "{tool} missing required arguments: [{}]; received: [{}]",
            missing.join(", "),
            received.join(", ")
        )));
    }

    if matches!(
        tool,
        "place_option_order" | "place_multi_leg_option_order" | "close_option_position"
    ) {
        if tool == "place_option_order" {
            let side = normalize_side(args.get("side").and_then(Value::as_str));
            args.insert("side".to_string(), Value::String(side));
        }
        if let Some(raw_qty) = args.get("quantity") {
            let quantity = coerce_quantity(tool, raw_qty)?;
            args.insert("quantity".to_string(), Value::from(quantity));
        }
        if let Some(raw_type) = args.get("order_type").and_then(Value::as_str) {
            let order_type = normalize_order_type(raw_type);
            args.insert("order_type".to_string(), Value::String(order_type));
        }
        if tool == "place_multi_leg_option_order" {
            // Required check above guarantees presence.
            let legs = normalize_legs(&args["legs"])?;
            args.insert("legs".to_string(), legs);
        }
    }

    Ok(args)
}
