//! Serialization formats for transformed records.

use protobuf::well_known_types::struct_::{ListValue, NullValue, Struct, Value as PbValue};
use protobuf::Message;
use serde::{Deserialize, Serialize};
use sync_core::Row;

use crate::coerce::CoercedRow;
use crate::error::TransformError;

/// Output encoding of a record.
///
/// Configured by name; unrecognized names fall back to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SerializationFormat {
    /// Newline-terminated JSON object
    #[default]
    Json,
    /// MessagePack map
    MsgPack,
    /// Block-style YAML mapping
    Yaml,
    /// Binary `google.protobuf.Struct`
    Protobuf,
}

impl SerializationFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationFormat::Json => "json",
            SerializationFormat::MsgPack => "msgpack",
            SerializationFormat::Yaml => "yaml",
            SerializationFormat::Protobuf => "protobuf",
        }
    }

    /// Encode a row. Coercion happens here, not before.
    pub fn encode(&self, row: &Row) -> Result<Vec<u8>, TransformError> {
        let coerced = CoercedRow(row);
        match self {
            SerializationFormat::Json => {
                let mut buf = serde_json::to_vec(&coerced)?;
                buf.push(b'\n');
                Ok(buf)
            }
            SerializationFormat::MsgPack => Ok(rmp_serde::to_vec(&coerced)?),
            SerializationFormat::Yaml => Ok(serde_yaml::to_string(&coerced)?.into_bytes()),
            SerializationFormat::Protobuf => {
                // Coerce to JSON scalars first, Struct only knows null/bool/number/string
                let fields = match serde_json::to_value(&coerced)? {
                    serde_json::Value::Object(fields) => fields,
                    _ => serde_json::Map::new(),
                };
                Ok(json_object_to_struct(fields).write_to_bytes()?)
            }
        }
    }
}

impl From<String> for SerializationFormat {
    fn from(name: String) -> Self {
        match name.as_str() {
            "msgpack" => SerializationFormat::MsgPack,
            "yaml" => SerializationFormat::Yaml,
            "protobuf" => SerializationFormat::Protobuf,
            _ => SerializationFormat::Json,
        }
    }
}

impl From<SerializationFormat> for String {
    fn from(format: SerializationFormat) -> Self {
        format.as_str().to_string()
    }
}

fn json_object_to_struct(fields: serde_json::Map<String, serde_json::Value>) -> Struct {
    let mut st = Struct::new();
    for (key, value) in fields {
        st.fields.insert(key, json_to_proto_value(value));
    }
    st
}

fn json_to_proto_value(value: serde_json::Value) -> PbValue {
    let mut pb = PbValue::new();
    match value {
        serde_json::Value::Null => pb.set_null_value(NullValue::NULL_VALUE),
        serde_json::Value::Bool(b) => pb.set_bool_value(b),
        serde_json::Value::Number(n) => pb.set_number_value(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => pb.set_string_value(s),
        serde_json::Value::Array(items) => {
            let mut list = ListValue::new();
            list.values = items.into_iter().map(json_to_proto_value).collect();
            pb.set_list_value(list);
        }
        serde_json::Value::Object(fields) => pb.set_struct_value(json_object_to_struct(fields)),
    }
    pb
}
