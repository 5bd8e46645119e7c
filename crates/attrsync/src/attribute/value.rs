//! Typed role data values.
//!
//! [`AttributeValue`] is the value domain of attribute role data. Values keep
//! their type once stored: writes are checked against the stored variant,
//! with integers and floats converting into each other and the `Json`
//! variant accepting anything.
//!
//! # JSON encoding
//!
//! | variant         | JSON                          |
//! |-----------------|-------------------------------|
//! | `Colour`        | `["colour", 1, r, g, b]`      |
//! | `Vec4`          | `["vec4", 1, x, y, z, w]`     |
//! | `Uuid`          | hyphenated string             |
//! | everything else | the natural JSON value        |

use serde_json::{Value, json};
use uuid::Uuid;

/// An RGB colour with float channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColourTriplet {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColourTriplet {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// A typed role value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
    BoolList(Vec<bool>),
    FloatList(Vec<f64>),
    Colour(ColourTriplet),
    Vec4([f32; 4]),
    Uuid(Uuid),
    /// Free-form JSON, including null.
    Json(Value),
}

impl AttributeValue {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::String(_) => "string",
            AttributeValue::StringList(_) => "string list",
            AttributeValue::BoolList(_) => "bool list",
            AttributeValue::FloatList(_) => "float list",
            AttributeValue::Colour(_) => "colour",
            AttributeValue::Vec4(_) => "vec4",
            AttributeValue::Uuid(_) => "uuid",
            AttributeValue::Json(_) => "json",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(v) => json!(v),
            AttributeValue::Integer(v) => json!(v),
            AttributeValue::Float(v) => json!(v),
            AttributeValue::String(v) => json!(v),
            AttributeValue::StringList(v) => json!(v),
            AttributeValue::BoolList(v) => json!(v),
            AttributeValue::FloatList(v) => json!(v),
            AttributeValue::Colour(c) => json!(["colour", 1, c.r, c.g, c.b]),
            AttributeValue::Vec4(v) => json!(["vec4", 1, v[0], v[1], v[2], v[3]]),
            AttributeValue::Uuid(v) => json!(v.to_string()),
            AttributeValue::Json(v) => v.clone(),
        }
    }

    /// Infer a value from JSON with no stored type to go by.
    pub fn from_json(value: &Value) -> AttributeValue {
        match value {
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => AttributeValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => AttributeValue::String(s.clone()),
            Value::Array(items) => {
                if let Some(c) = decode_colour(value) {
                    AttributeValue::Colour(c)
                } else if let Some(v) = decode_vec4(value) {
                    AttributeValue::Vec4(v)
                } else if let Some(v) = string_list(items) {
                    AttributeValue::StringList(v)
                } else if let Some(v) = bool_list(items) {
                    AttributeValue::BoolList(v)
                } else if let Some(v) = float_list(items) {
                    AttributeValue::FloatList(v)
                } else {
                    AttributeValue::Json(value.clone())
                }
            }
            other => AttributeValue::Json(other.clone()),
        }
    }

    /// Decode `value` as the same variant as `self`.
    ///
    /// Returns `None` if the JSON cannot be represented by this variant.
    pub fn decode_like(&self, value: &Value) -> Option<AttributeValue> {
        let decoded = match self {
            AttributeValue::Bool(_) => AttributeValue::Bool(value.as_bool()?),
            AttributeValue::Integer(_) => AttributeValue::Integer(json_integer(value)?),
            AttributeValue::Float(_) => AttributeValue::Float(value.as_f64()?),
            AttributeValue::String(_) => AttributeValue::String(value.as_str()?.to_string()),
            AttributeValue::StringList(_) => AttributeValue::StringList(string_list(value.as_array()?)?),
            AttributeValue::BoolList(_) => AttributeValue::BoolList(bool_list(value.as_array()?)?),
            AttributeValue::FloatList(_) => AttributeValue::FloatList(float_list(value.as_array()?)?),
            AttributeValue::Colour(_) => AttributeValue::Colour(decode_colour(value)?),
            AttributeValue::Vec4(_) => AttributeValue::Vec4(decode_vec4(value)?),
            AttributeValue::Uuid(_) => AttributeValue::Uuid(Uuid::parse_str(value.as_str()?).ok()?),
            AttributeValue::Json(_) => AttributeValue::Json(value.clone()),
        };
        Some(decoded)
    }

    /// Convert `other` into the variant of `self`, if the types are compatible.
    pub fn convert_like(&self, other: AttributeValue) -> Option<AttributeValue> {
        use AttributeValue as V;
        match (self, other) {
            (V::Json(_), other) => Some(V::Json(other.to_json())),
            (V::Integer(_), V::Float(f)) => Some(V::Integer(f as i64)),
            (V::Float(_), V::Integer(i)) => Some(V::Float(i as f64)),
            (V::Uuid(_), V::String(s)) => Uuid::parse_str(&s).ok().map(V::Uuid),
            (current, other) if std::mem::discriminant(current) == std::mem::discriminant(&other) => {
                Some(other)
            }
            (current, other) => current.decode_like(&other.to_json()),
        }
    }

    /// Read the value as `T`.
    pub fn get<T: FromAttributeValue>(&self) -> Option<T> {
        T::from_attribute_value(self)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.get()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

fn json_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn string_list(items: &[Value]) -> Option<Vec<String>> {
    items.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

fn bool_list(items: &[Value]) -> Option<Vec<bool>> {
    items.iter().map(Value::as_bool).collect()
}

fn float_list(items: &[Value]) -> Option<Vec<f64>> {
    items.iter().map(Value::as_f64).collect()
}

fn tagged_floats<const N: usize>(value: &Value, tag: &str) -> Option<[f32; N]> {
    let items = value.as_array()?;
    if items.len() != N + 2 || items[0].as_str()? != tag {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(&items[2..]) {
        *slot = item.as_f64()? as f32;
    }
    Some(out)
}

fn decode_colour(value: &Value) -> Option<ColourTriplet> {
    let [r, g, b] = tagged_floats::<3>(value, "colour")?;
    Some(ColourTriplet::new(r, g, b))
}

fn decode_vec4(value: &Value) -> Option<[f32; 4]> {
    tagged_floats::<4>(value, "vec4")
}

/// Types that can be read out of an [`AttributeValue`].
pub trait FromAttributeValue: Sized {
    /// Name of the expected type, used in error messages.
    const EXPECTED: &'static str;

    fn from_attribute_value(value: &AttributeValue) -> Option<Self>;
}

macro_rules! impl_value {
    ($ty:ty, $variant:ident, $expected:literal) => {
        impl From<$ty> for AttributeValue {
            fn from(value: $ty) -> Self {
                AttributeValue::$variant(value)
            }
        }

        impl FromAttributeValue for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_value!(bool, Bool, "bool");
impl_value!(String, String, "string");
impl_value!(Vec<String>, StringList, "string list");
impl_value!(Vec<bool>, BoolList, "bool list");
impl_value!(Vec<f64>, FloatList, "float list");
impl_value!(ColourTriplet, Colour, "colour");
impl_value!([f32; 4], Vec4, "vec4");
impl_value!(Uuid, Uuid, "uuid");

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(f64::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue::Json(value)
    }
}

impl FromAttributeValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Integer(i) => Some(*i),
            AttributeValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromAttributeValue for i32 {
    const EXPECTED: &'static str = "integer";

    fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        i64::from_attribute_value(value).and_then(|i| i32::try_from(i).ok())
    }
}

impl FromAttributeValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Float(f) => Some(*f),
            AttributeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromAttributeValue for f32 {
    const EXPECTED: &'static str = "float";

    fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        f64::from_attribute_value(value).map(|f| f as f32)
    }
}

impl FromAttributeValue for Value {
    const EXPECTED: &'static str = "json";

    fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        Some(value.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let c = AttributeValue::Colour(ColourTriplet::new(1.0, 0.5, 0.0));
        assert_eq!(c.to_json(), json!(["colour", 1, 1.0, 0.5, 0.0]));
        assert_eq!(AttributeValue::from_json(&c.to_json()), c);

        let v = AttributeValue::Vec4([0.0, 1.0, 2.0, 3.0]);
        assert_eq!(v.to_json(), json!(["vec4", 1, 0.0, 1.0, 2.0, 3.0]));
        assert_eq!(AttributeValue::from_json(&v.to_json()), v);
    }

    #[test]
    fn test_inference() {
        assert_eq!(AttributeValue::from_json(&json!(3)), AttributeValue::Integer(3));
        assert_eq!(AttributeValue::from_json(&json!(0.25)), AttributeValue::Float(0.25));
        assert_eq!(
            AttributeValue::from_json(&json!(["a", "b"])),
            AttributeValue::StringList(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            AttributeValue::from_json(&json!([true, false])),
            AttributeValue::BoolList(vec![true, false])
        );
        assert_eq!(
            AttributeValue::from_json(&json!({"a": 1})),
            AttributeValue::Json(json!({"a": 1}))
        );
        assert_eq!(
            AttributeValue::from_json(&json!(["a", 1])),
            AttributeValue::Json(json!(["a", 1]))
        );
    }

    #[test]
    fn test_decode_like_checks_type() {
        let f = AttributeValue::Float(0.0);
        assert_eq!(f.decode_like(&json!(2)), Some(AttributeValue::Float(2.0)));
        assert_eq!(f.decode_like(&json!("x")), None);

        let i = AttributeValue::Integer(0);
        assert_eq!(i.decode_like(&json!(2.7)), Some(AttributeValue::Integer(2)));

        let s = AttributeValue::String(String::new());
        assert_eq!(s.decode_like(&json!(true)), None);

        let j = AttributeValue::Json(Value::Null);
        assert_eq!(j.decode_like(&json!([1, "a"])), Some(AttributeValue::Json(json!([1, "a"]))));

        let u = Uuid::new_v4();
        assert_eq!(
            AttributeValue::Uuid(Uuid::nil()).decode_like(&json!(u.to_string())),
            Some(AttributeValue::Uuid(u))
        );
    }

    #[test]
    fn test_convert_like() {
        let f = AttributeValue::Float(0.0);
        assert_eq!(f.convert_like(AttributeValue::Integer(4)), Some(AttributeValue::Float(4.0)));
        assert_eq!(f.convert_like(AttributeValue::Bool(true)), None);

        let list = AttributeValue::StringList(Vec::new());
        assert_eq!(
            list.convert_like(AttributeValue::Json(json!(["x"]))),
            Some(AttributeValue::StringList(vec!["x".into()]))
        );
        assert_eq!(
            AttributeValue::Json(json!(null)).convert_like(AttributeValue::Bool(true)),
            Some(AttributeValue::Json(json!(true)))
        );
    }

    #[test]
    fn test_typed_reads() {
        let v = AttributeValue::Integer(7);
        assert_eq!(v.get::<i64>(), Some(7));
        assert_eq!(v.get::<f32>(), Some(7.0));
        assert_eq!(v.get::<bool>(), None);
        assert_eq!(v.get::<Value>(), Some(json!(7)));
        assert_eq!(AttributeValue::from("x").as_str(), Some("x"));
    }
}
