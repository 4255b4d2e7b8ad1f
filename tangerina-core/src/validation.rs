//! Parameter Validation and Autofill
//!
//! Runs before every dispatch: fills identifiers the model left out from
//! the live conversation context, checks required parameters, coerces
//! loosely typed integers and enforces schema ranges.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ValidationError;
use crate::schema::{ParamType, ToolRegistry, ToolSchema};

/// Identifiers of the conversation the message arrived in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub guild_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub user_id: Option<u64>,
}

impl CallerContext {
    pub fn new(guild_id: Option<u64>, channel_id: Option<u64>, user_id: Option<u64>) -> Self {
        Self {
            guild_id,
            channel_id,
            user_id,
        }
    }

    fn lookup(&self, param: &str) -> Option<u64> {
        match param {
            "guild_id" => self.guild_id,
            "channel_id" => self.channel_id,
            "user_id" => self.user_id,
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.guild_id.is_none() && self.channel_id.is_none() && self.user_id.is_none()
    }
}

/// Validate a call and return its repaired parameters.
pub fn validate(
    registry: &ToolRegistry,
    tool_name: &str,
    mut params: Map<String, Value>,
    ctx: &CallerContext,
) -> Result<Map<String, Value>, ValidationError> {
    let schema = registry
        .get(tool_name)
        .ok_or_else(|| ValidationError::UnknownTool(tool_name.to_string()))?;

    for name in &schema.required {
        if params.contains_key(name) {
            continue;
        }
        if let Some(id) = ctx.lookup(name) {
            debug!(tool = %tool_name, param = %name, "filled parameter from context");
            params.insert(name.clone(), Value::from(id));
        }
    }

    let missing: Vec<String> = schema
        .required
        .iter()
        .filter(|p| !params.contains_key(p.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingParameters(missing));
    }

    coerce_integers(schema, &mut params);
    check_ranges(schema, &params)?;
    Ok(params)
}

/// Coerce integer-typed parameters of `tool_name` in place. Unknown tools
/// are left untouched. Applied to native calls as they are parsed.
pub(crate) fn normalize_integer_ids(
    registry: &ToolRegistry,
    tool_name: &str,
    params: &mut Map<String, Value>,
) {
    if let Some(schema) = registry.get(tool_name) {
        coerce_integers(schema, params);
    }
}

fn coerce_integers(schema: &ToolSchema, params: &mut Map<String, Value>) {
    for (name, value) in params.iter_mut() {
        let is_integer = schema
            .property(name)
            .is_some_and(|p| p.ty == ParamType::Integer);
        if !is_integer {
            continue;
        }
        if let Some(coerced) = coerce_integer(value) {
            *value = coerced;
        }
    }
}

/// Integer form of `value`, or `None` when it should stay as is.
fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => None,
        Value::Number(n) => n.as_f64().and_then(integral_f64),
        Value::String(s) => parse_integer_str(s.trim()),
        _ => None,
    }
}

/// Integer read from decimal text. Integrality is decided on the digits
/// themselves, so no value goes through a float on the way.
fn parse_integer_str(s: &str) -> Option<Value> {
    let (negative, unsigned) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], unsigned[i + 1..].parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit())
    {
        return None;
    }

    // Shift the decimal point by the exponent over the joined digits.
    let digits = format!("{int_part}{frac_part}");
    let point = int_part.len() as i64 + i64::from(exponent);
    let split = point.clamp(0, digits.len() as i64) as usize;
    let (whole, fraction) = digits.split_at(split);
    if fraction.bytes().any(|b| b != b'0') {
        return None;
    }

    let whole = whole.trim_start_matches('0');
    if whole.is_empty() {
        return Some(Value::from(0));
    }
    let zeros = (point - digits.len() as i64).max(0) as usize;
    // u64::MAX has 20 digits.
    if whole.len() + zeros > 20 {
        return None;
    }
    let text = format!("{whole}{}", "0".repeat(zeros));
    if negative {
        format!("-{text}").parse::<i64>().ok().map(Value::from)
    } else {
        text.parse::<u64>().ok().map(Value::from)
    }
}

/// Largest magnitude below which every integer is exact in f64.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

fn integral_f64(f: f64) -> Option<Value> {
    if !f.is_finite() || f.fract() != 0.0 || f.abs() > MAX_EXACT_F64 {
        return None;
    }
    Some(Value::from(f as i64))
}

fn check_ranges(schema: &ToolSchema, params: &Map<String, Value>) -> Result<(), ValidationError> {
    for (name, prop) in &schema.properties {
        if prop.ty != ParamType::Integer || (prop.minimum.is_none() && prop.maximum.is_none()) {
            continue;
        }
        let Some(value) = params.get(name) else {
            continue;
        };
        let min = prop.minimum.unwrap_or(i64::MIN);
        let max = prop.maximum.unwrap_or(i64::MAX);
        let in_range = match (value.as_i64(), value.as_u64()) {
            (Some(n), _) => (min..=max).contains(&n),
            // Above i64::MAX, so only an unbounded maximum admits it.
            (None, Some(_)) => prop.maximum.is_none(),
            (None, None) => {
                return Err(ValidationError::NotAnInteger {
                    param: name.clone(),
                })
            }
        };
        if !in_range {
            return Err(ValidationError::OutOfRange {
                param: name.clone(),
                min,
                max,
            });
        }
    }
    Ok(())
}
