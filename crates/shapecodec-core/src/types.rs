//! Value types with special codec treatment: exact numbers, raw JSON text and
//! dynamically typed values.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::describe::{Describe, Kind, TypeDescriptor, TypeRef};
use crate::error::{CodecError, Result};

/// A JSON number kept as its literal text.
///
/// Decoding into `Number` never rounds; encoding writes the text back
/// verbatim after checking it is a valid number literal. An empty `Number`
/// encodes as `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(String);

impl Number {
    /// Wrap literal text. Validity is checked when the number is encoded.
    pub fn new(text: impl Into<String>) -> Self {
        Number(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(n: $ty) -> Self {
                    Number(n.to_string())
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Describe for Number {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Number>(Kind::Number)
    }

    fn zero() -> Option<Self> {
        Some(Number::default())
    }
}

/// Pre-encoded JSON text.
///
/// On output the text is validated and compacted before it is spliced in. On
/// input it receives the exact bytes of the value, whitespace included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawValue(String);

impl RawValue {
    pub fn new(json: impl Into<String>) -> Self {
        RawValue(json.into())
    }

    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Describe for RawValue {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<RawValue>(Kind::Raw)
    }

    fn zero() -> Option<Self> {
        Some(RawValue::default())
    }
}

// ============================================================================
// Dynamic values
// ============================================================================

/// Object-safe view of any describable value held by a [`Dynamic`].
pub trait DynValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_ref(&self) -> TypeRef;
}

impl<T: Describe + Send + Sync> DynValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<T>()
    }
}

/// A value whose concrete type is only known at run time.
///
/// Encoding dispatches on the held value's type (compiling its program on
/// first use). Decoding into a `Dynamic` produces the generic forms:
/// `BTreeMap<String, Dynamic>` for objects, `Vec<Dynamic>` for arrays,
/// `f64` (or [`Number`] with `use_number`) for numbers, `String`, `bool`, and
/// the null `Dynamic`.
///
/// ```
/// use shapecodec_core::Dynamic;
///
/// let v: Dynamic = shapecodec_core::from_str(r#"{"a":[1,"x",null]}"#).unwrap();
/// let a = v.get("a").and_then(Dynamic::as_array).unwrap();
/// assert_eq!(a[0].as_f64(), Some(1.0));
/// assert_eq!(a[1].as_str(), Some("x"));
/// assert!(a[2].is_null());
/// ```
#[derive(Clone, Default)]
pub struct Dynamic(Option<Arc<dyn DynValue>>);

impl Dynamic {
    pub fn null() -> Self {
        Dynamic(None)
    }

    pub fn new<T: Describe + Send + Sync>(value: T) -> Self {
        Dynamic(Some(Arc::new(value)))
    }

    /// Share an existing allocation. Encoding tracks the allocation's address
    /// while it is being written, so a value that reaches itself is reported
    /// as a cycle instead of looping.
    pub fn from_arc<T: Describe + Send + Sync>(value: Arc<T>) -> Self {
        Dynamic(Some(value))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn type_name(&self) -> Option<&'static str> {
        self.0.as_ref().map(|v| v.type_ref().name())
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.downcast_ref::<&'static str>().copied())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.downcast_ref::<bool>().copied()
    }

    /// Numeric value of an `f64`, integer or [`Number`] payload.
    pub fn as_f64(&self) -> Option<f64> {
        let any = self.0.as_ref()?.as_any();
        if let Some(f) = any.downcast_ref::<f64>() {
            return Some(*f);
        }
        if let Some(n) = any.downcast_ref::<Number>() {
            return n.as_f64();
        }
        if let Some(i) = any.downcast_ref::<i64>() {
            return Some(*i as f64);
        }
        any.downcast_ref::<u64>().map(|u| *u as f64)
    }

    pub fn as_number(&self) -> Option<&Number> {
        self.downcast_ref::<Number>()
    }

    pub fn as_array(&self) -> Option<&[Dynamic]> {
        self.downcast_ref::<Vec<Dynamic>>().map(Vec::as_slice)
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Dynamic>> {
        self.downcast_ref::<BTreeMap<String, Dynamic>>()
    }

    /// Member of an object payload.
    pub fn get(&self, key: &str) -> Option<&Dynamic> {
        self.as_object()?.get(key)
    }

    /// Convert through the encoder into a `serde_json::Value`.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        let bytes = crate::to_vec(self)?;
        serde_json::from_slice(&bytes).map_err(|e| CodecError::unsupported_value(e.to_string()))
    }

    pub(crate) fn value(&self) -> Option<&Arc<dyn DynValue>> {
        self.0.as_ref()
    }

    /// Address of the held allocation (cycle tracking).
    pub(crate) fn addr(&self) -> Option<usize> {
        self.0.as_ref().map(|v| Arc::as_ptr(v) as *const () as usize)
    }
}

/// Generic arrays and objects are taken apart on an explicit stack, so
/// dropping a deeply nested tree does not recurse once per level.
impl Drop for Dynamic {
    fn drop(&mut self) {
        let mut pending: Vec<Arc<dyn DynValue>> = self.0.take().into_iter().collect();
        while let Some(mut value) = pending.pop() {
            // Shared payloads are left to their other owners.
            let Some(inner) = Arc::get_mut(&mut value) else {
                continue;
            };
            let any = inner.as_any_mut();
            if let Some(items) = any.downcast_mut::<Vec<Dynamic>>() {
                pending.extend(items.iter_mut().filter_map(|d| d.0.take()));
            } else if let Some(map) = any.downcast_mut::<BTreeMap<String, Dynamic>>() {
                pending.extend(map.values_mut().filter_map(|d| d.0.take()));
            }
        }
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = match (&self.0, &other.0) {
            (None, None) => return true,
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        if Arc::ptr_eq(a, b) {
            return true;
        }
        let (a, b) = (a.as_any(), b.as_any());
        fn same<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> Option<bool> {
            Some(a.downcast_ref::<T>()? == b.downcast_ref::<T>()?)
        }
        same::<String>(a, b)
            .or_else(|| same::<bool>(a, b))
            .or_else(|| same::<f64>(a, b))
            .or_else(|| same::<Number>(a, b))
            .or_else(|| same::<Vec<Dynamic>>(a, b))
            .or_else(|| same::<BTreeMap<String, Dynamic>>(a, b))
            .or_else(|| same::<i64>(a, b))
            .or_else(|| same::<u64>(a, b))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::to_string(self) {
            Ok(json) => write!(f, "Dynamic({json})"),
            Err(_) => write!(f, "Dynamic(<{}>)", self.type_name().unwrap_or("null")),
        }
    }
}

impl Describe for Dynamic {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Dynamic>(Kind::Dynamic)
    }

    fn zero() -> Option<Self> {
        Some(Dynamic::null())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::new(s)
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::new(s.to_string())
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::new(b)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::new(n)
    }
}

impl From<Number> for Dynamic {
    fn from(n: Number) -> Self {
        Dynamic::new(n)
    }
}

impl From<Vec<Dynamic>> for Dynamic {
    fn from(items: Vec<Dynamic>) -> Self {
        Dynamic::new(items)
    }
}

impl From<BTreeMap<String, Dynamic>> for Dynamic {
    fn from(map: BTreeMap<String, Dynamic>) -> Self {
        Dynamic::new(map)
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Dynamic::null(),
            Value::Bool(b) => b.into(),
            Value::Number(n) => Number::new(n.to_string()).into(),
            Value::String(s) => s.into(),
            Value::Array(items) => items.into_iter().map(Dynamic::from).collect::<Vec<_>>().into(),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, Dynamic::from(v)))
                .collect::<BTreeMap<_, _>>()
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_accessors() {
        let n = Number::new("12345678901234567890");
        assert_eq!(n.as_u64(), Some(12345678901234567890));
        assert_eq!(n.as_i64(), None);
        assert_eq!(Number::from(1.5f64).as_str(), "1.5");
    }

    #[test]
    fn dynamic_equality_by_value() {
        assert_eq!(Dynamic::from("a"), Dynamic::from("a"));
        assert_ne!(Dynamic::from("a"), Dynamic::from(true));
        assert_eq!(Dynamic::null(), Dynamic::default());
        assert_ne!(Dynamic::null(), Dynamic::from(0.0));
    }

    #[test]
    fn deep_tree_drops_without_recursion() {
        let mut d = Dynamic::from(true);
        for _ in 0..200_000 {
            d = Dynamic::from(vec![d]);
        }
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), d);
        drop(Dynamic::from(map));
    }

    #[test]
    fn shared_payload_survives_drop_of_one_owner() {
        let inner = Dynamic::from(vec![Dynamic::from("kept")]);
        let outer = Dynamic::from(vec![inner.clone()]);
        drop(outer);
        assert_eq!(inner.as_array().map(<[Dynamic]>::len), Some(1));
        assert_eq!(inner.as_array().and_then(|a| a[0].as_str()), Some("kept"));
    }

    #[test]
    fn from_serde_value_keeps_number_text() {
        let v: serde_json::Value = serde_json::json!({"big": 12345678901234567890u64});
        let d = Dynamic::from(v);
        assert_eq!(d.get("big").and_then(Dynamic::as_number).map(Number::as_str), Some("12345678901234567890"));
    }
}
