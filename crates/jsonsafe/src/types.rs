use std::{fmt, str::FromStr};

use serde_json::{Number, Value};

/// Primitive JSON types usable in the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl JsonType {
    const ALL: [JsonType; 7] = [
        JsonType::Array,
        JsonType::Boolean,
        JsonType::Integer,
        JsonType::Null,
        JsonType::Number,
        JsonType::Object,
        JsonType::String,
    ];

    fn bit(self) -> u8 {
        match self {
            JsonType::Array => 1,
            JsonType::Boolean => 1 << 1,
            JsonType::Integer => 1 << 2,
            JsonType::Null => 1 << 3,
            JsonType::Number => 1 << 4,
            JsonType::Object => 1 << 5,
            JsonType::String => 1 << 6,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            JsonType::Array => "array",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Null => "null",
            JsonType::Number => "number",
            JsonType::Object => "object",
            JsonType::String => "string",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JsonType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(JsonType::Array),
            "boolean" => Ok(JsonType::Boolean),
            "integer" => Ok(JsonType::Integer),
            "null" => Ok(JsonType::Null),
            "number" => Ok(JsonType::Number),
            "object" => Ok(JsonType::Object),
            "string" => Ok(JsonType::String),
            _ => Err(()),
        }
    }
}

/// A compact set of [`JsonType`] values.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct JsonTypeSet(u8);

impl JsonTypeSet {
    pub(crate) const fn empty() -> Self {
        JsonTypeSet(0)
    }

    #[must_use]
    pub(crate) fn insert(mut self, ty: JsonType) -> Self {
        self.0 |= ty.bit();
        self
    }

    /// Whether the set contains `ty`. `number` implies `integer`.
    pub(crate) fn contains(self, ty: JsonType) -> bool {
        self.0 & ty.bit() != 0 || (ty == JsonType::Integer && self.0 & JsonType::Number.bit() != 0)
    }

    pub(crate) fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub(crate) fn iter(self) -> impl Iterator<Item = JsonType> {
        JsonType::ALL
            .into_iter()
            .filter(move |ty| self.0 & ty.bit() != 0)
    }

    /// Whether `instance` has one of the types in the set.
    ///
    /// With `strict_integers`, `1.0` is not an integer (draft 4 semantics).
    pub(crate) fn contains_value_type(self, instance: &Value, strict_integers: bool) -> bool {
        match instance {
            Value::Array(_) => self.contains(JsonType::Array),
            Value::Bool(_) => self.contains(JsonType::Boolean),
            Value::Null => self.contains(JsonType::Null),
            Value::Object(_) => self.contains(JsonType::Object),
            Value::String(_) => self.contains(JsonType::String),
            Value::Number(number) => {
                self.contains(JsonType::Number)
                    || (self.contains(JsonType::Integer) && is_integer(number, strict_integers))
            }
        }
    }
}

impl fmt::Debug for JsonTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for JsonTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, ty) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "\"{ty}\"")?;
        }
        Ok(())
    }
}

#[allow(clippy::float_cmp)]
pub(crate) fn is_integer(number: &Number, strict: bool) -> bool {
    if number.is_u64() || number.is_i64() {
        return true;
    }
    if strict {
        return false;
    }
    number.as_f64().is_some_and(|value| value.is_finite() && value.trunc() == value)
}
