//! Structured key/value documents carried by requests and target entities
pub use serde_json::{Map, Value};

/// A JSON object. Stored inside CBOR records as its JSON encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
    /// The subset of this document restricted to `keys`. Missing keys are skipped.
    pub fn only<S: AsRef<str>>(&self, keys: &[S]) -> Payload {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.0.get(key).map(|value| (key.to_string(), value.clone()))
            })
            .collect()
    }
    /// True when every entry of `subset` is present here with an equal value.
    pub fn contains(&self, subset: &Payload) -> bool {
        subset
            .iter()
            .all(|(key, value)| self.0.get(key) == Some(value))
    }
    /// Overwrite entries with the ones in `changes`, keeping everything else.
    pub fn merge(&mut self, changes: &Payload) {
        for (key, value) in changes.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload(map)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::Object(payload.0)
    }
}

impl TryFrom<Value> for Payload {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Payload(map)),
            other => Err(anyhow::anyhow!("expected a JSON object, got {other}")),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Payload(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<C> minicbor::Encode<C> for Payload {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let json = serde_json::to_vec(&self.0).map_err(minicbor::encode::Error::custom)?;
        e.bytes(&json)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Payload {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let json = d.bytes()?;
        let map = serde_json::from_slice(json).map_err(minicbor::decode::Error::custom)?;

        Ok(Payload(map))
    }
}
