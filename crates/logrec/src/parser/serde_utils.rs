use serde::{Serialize, Serializer};
use serde::ser::SerializeMap;

/// Serialize ordered `(name, value)` pairs as a map, keeping their order.
pub fn serialize_fields_as_map<S, V>(fields: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (k, v) in fields {
        map.serialize_entry(k, v)?;
    }
    map.end()
}
