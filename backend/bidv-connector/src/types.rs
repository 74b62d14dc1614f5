use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Value of one request field: either text or a nested group of fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    Nested(RequestParameters),
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

macro_rules! scalar_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_number!(i32, i64, u32, u64);

impl From<RequestParameters> for ParamValue {
    fn from(value: RequestParameters) -> Self {
        Self::Nested(value)
    }
}

/// Request fields in insertion order.
///
/// The gateway signs the pipe-joined values in exactly this order, so the
/// order is part of the wire contract. Re-inserting an existing key replaces
/// its value in place.
#[derive(Clone, Debug, Default)]
pub struct RequestParameters {
    entries: IndexMap<String, ParamValue>,
}

impl PartialEq for RequestParameters {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().eq(other.entries.iter())
    }
}

impl Eq for RequestParameters {}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder style [`Self::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Left-biased union: keys already present win, new keys are appended in
    /// the order `other` lists them.
    pub fn union(mut self, other: Self) -> Self {
        for (key, value) in other.entries {
            self.entries.entry(key).or_insert(value);
        }
        self
    }

    /// Leaf values in signing order. Nested groups contribute their leaves
    /// depth first, in place.
    pub fn values_for_signing(&self) -> Vec<&str> {
        let mut values = Vec::with_capacity(self.entries.len());
        collect_leaf_values(self, &mut values);
        values
    }
}

fn collect_leaf_values<'a>(params: &'a RequestParameters, values: &mut Vec<&'a str>) {
    for value in params.entries.values() {
        match value {
            ParamValue::Scalar(text) => values.push(text),
            ParamValue::Nested(nested) => collect_leaf_values(nested, values),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParameters
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignatureAlgorithm {
    #[default]
    Md5,
    #[serde(alias = "rsa")]
    #[strum(to_string = "rsa_sha1", serialize = "rsa")]
    RsaSha1,
}

/// How the signing string is finalised before it is digested.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignMode {
    Standard,
    /// Drops the last character of the signing string. Inbound verification
    /// uses this: the derived `IS_CORRECT_SIGN` placeholder renders empty and
    /// leaves a trailing delimiter behind.
    TrailingCharRemoved,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

/// Flat response of the gateway, tag name (namespace prefix stripped) to text,
/// in document order, plus the fields derived while processing it.
#[derive(Clone, Debug, Default)]
pub struct ResponseFields {
    fields: IndexMap<String, String>,
    pub is_correct_sign: bool,
    pub message: Option<String>,
}

impl PartialEq for ResponseFields {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().eq(other.fields.iter())
            && self.is_correct_sign == other.is_correct_sign
            && self.message == other.message
    }
}

impl Eq for ResponseFields {}

impl ResponseFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decoded tag. A repeated tag keeps its first position and its last value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn response_code(&self) -> Option<&str> {
        self.get(constants::RESPONSE_CODE)
    }

    /// Response a caller of the catch-all API receives when anything fails.
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            fields: IndexMap::from([(
                constants::RESPONSE_CODE.to_string(),
                constants::FALLBACK_RESPONSE_CODE.to_string(),
            )]),
            is_correct_sign: false,
            message: Some(message.into()),
        }
    }

    /// Flat key/value view including the derived `IS_CORRECT_SIGN` and `MESSAGE` keys.
    pub fn to_map(&self) -> Vec<(String, String)> {
        let mut map: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        map.push((
            constants::IS_CORRECT_SIGN.to_string(),
            self.is_correct_sign.to_string(),
        ));
        if let Some(message) = &self.message {
            map.push((constants::MESSAGE.to_string(), message.clone()));
        }
        map
    }
}

impl From<&ResponseFields> for RequestParameters {
    fn from(response: &ResponseFields) -> Self {
        response.iter().collect()
    }
}
