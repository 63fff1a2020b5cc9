//! Near-equality of document content

use serde_json::Value;

/// Default relative tolerance for content comparisons
pub const DEFAULT_REL_TOL: f64 = 1e-9;

/// Compare two content values, allowing numeric drift.
///
/// Numbers compare by value whatever their JSON representation (`1` equals
/// `1.0`) and are equal when `|a - b| <= max(rel_tol * max(|a|, |b|), abs_tol)`.
/// Objects compare key-wise irrespective of key order, arrays element-wise,
/// everything else exactly.
pub fn values_near_equal(a: &Value, b: &Value, rel_tol: f64, abs_tol: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => is_close(x, y, rel_tol, abs_tol),
            _ => x == y,
        },
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, value)| {
                    y.get(key)
                        .is_some_and(|other| values_near_equal(value, other, rel_tol, abs_tol))
                })
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(left, right)| values_near_equal(left, right, rel_tol, abs_tol))
        }
        _ => a == b,
    }
}

#[allow(clippy::float_cmp)]
fn is_close(a: f64, b: f64, rel_tol: f64, abs_tol: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= (rel_tol * a.abs().max(b.abs())).max(abs_tol)
}
