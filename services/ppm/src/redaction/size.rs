use serde_json::{Number, Value};

pub const DEFAULT_SIZE_REPLACEMENT: f64 = 0.0;

/// Overwrites vehicle width and length, which can single out unusual vehicles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRedactor {
    replacement: f64,
}

impl SizeRedactor {
    pub fn new(replacement: f64) -> Self {
        Self { replacement }
    }

    pub fn replacement(&self) -> f64 {
        self.replacement
    }

    /// The replacement as a JSON number; integral values serialize without a
    /// fraction so `0` stays `0`.
    pub fn replacement_value(&self) -> Value {
        if self.replacement.fract() == 0.0 && self.replacement.abs() < i64::MAX as f64 {
            Value::Number(Number::from(self.replacement as i64))
        } else {
            Number::from_f64(self.replacement)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
    }
}

impl Default for SizeRedactor {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_REPLACEMENT)
    }
}
