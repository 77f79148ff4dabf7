//! Reshaping of backend responses for the browser.
//!
//! Both transforms keep every field they do not touch.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::error::{CoreResult, GatewayError};

/// Matplotlib day number of 1970-01-01.
pub const MPL_UNIX_EPOCH_DAY: f64 = 719_163.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Matplotlib/backtrader day number to `YYYY-MM-DD` (UTC).
/// Fractional days are allowed; sub-millisecond parts are truncated.
pub fn mpl_date_to_iso(day: f64) -> Option<String> {
    if !day.is_finite() {
        return None;
    }
    let ms = ((day - MPL_UNIX_EPOCH_DAY) * MS_PER_DAY).trunc();
    if ms.abs() > 8.64e15 {
        return None;
    }
    let dt = DateTime::from_timestamp_millis(ms as i64)?;
    Some(dt.format("%Y-%m-%d").to_string())
}

/// JSON number the way a browser would print it: integral values without `.0`.
fn js_number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// JavaScript truthiness of an optional JSON value.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn decode_err(message: impl Into<String>) -> GatewayError {
    GatewayError::Decode {
        service: "backend".into(),
        message: message.into(),
    }
}

/// `{data: [bar]}` → same bars with `time = timestamp / 1000`.
pub fn transform_price_bars(raw: Value) -> CoreResult<Value> {
    let Value::Object(mut root) = raw else {
        return Err(decode_err("price bars response is not an object"));
    };
    let Some(Value::Array(bars)) = root.remove("data") else {
        return Err(decode_err("price bars response has no data array"));
    };

    let bars = bars
        .into_iter()
        .map(|bar| {
            let mut bar = match bar {
                Value::Object(m) => m,
                _ => Map::new(),
            };
            let time = match bar.get("timestamp") {
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(ms) if ms % 1000 == 0 => Value::from(ms / 1000),
                    _ => n.as_f64().map(|ms| js_number(ms / 1000.0)).unwrap_or(Value::Null),
                },
                _ => Value::Null,
            };
            bar.insert("time".into(), time);
            Value::Object(bar)
        })
        .collect();

    let mut out = Map::new();
    out.insert("data".into(), Value::Array(bars));
    Ok(Value::Object(out))
}

fn convert_trade_date(trade: &mut Map<String, Value>, key: &str) -> CoreResult<()> {
    if let Some(Value::Number(n)) = trade.get(key) {
        let day = n.as_f64().unwrap_or(f64::NAN);
        let iso = mpl_date_to_iso(day).ok_or_else(|| decode_err(format!("{key} out of range")))?;
        trade.insert(key.into(), Value::String(iso));
    }
    Ok(())
}

fn transform_trade(trade: Value) -> CoreResult<Value> {
    let Value::Object(mut trade) = trade else {
        return Ok(trade);
    };
    let closed = truthy(trade.get("exit_date"));
    convert_trade_date(&mut trade, "entry_date")?;
    convert_trade_date(&mut trade, "exit_date")?;
    trade.insert(
        "status".into(),
        Value::from(if closed { "closed" } else { "open" }),
    );
    if !truthy(trade.get("trade_type")) {
        trade.insert("trade_type".into(), Value::from("long"));
    }
    Ok(Value::Object(trade))
}

fn transform_signal(signal: Value) -> Value {
    let Value::Object(mut signal) = signal else {
        return signal;
    };
    let kind = signal
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.to_lowercase().replacen("_signal", "", 1))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "unknown".into());
    signal.insert("signal_type".into(), Value::String(kind));
    // absent date drops the key, an explicit null is carried over
    match signal.get("date").cloned() {
        Some(date) => {
            signal.insert("timestamp".into(), date);
        }
        None => {
            signal.remove("timestamp");
        }
    }
    Value::Object(signal)
}

/// Normalize trades and signals under `data`. Anything without a truthy
/// `data` passes through unchanged.
pub fn transform_task_result(raw: Value) -> CoreResult<Value> {
    let Value::Object(mut root) = raw else {
        return Ok(raw);
    };
    if !truthy(root.get("data")) {
        return Ok(Value::Object(root));
    }
    if let Some(Value::Object(data)) = root.get_mut("data") {
        if let Some(Value::Array(trades)) = data.get_mut("trades") {
            let taken = std::mem::take(trades);
            *trades = taken
                .into_iter()
                .map(transform_trade)
                .collect::<CoreResult<Vec<_>>>()?;
        }
        if let Some(Value::Array(signals)) = data.get_mut("signals") {
            let taken = std::mem::take(signals);
            *signals = taken.into_iter().map(transform_signal).collect();
        }
    }
    Ok(Value::Object(root))
}
