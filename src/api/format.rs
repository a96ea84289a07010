use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

/// Convert a stored document into the public wire format.
///
/// ObjectIds become their hex string, datetimes become RFC 3339 strings and
/// everything else follows relaxed extended JSON.
pub fn document_to_api_value(doc: Document) -> Value {
    let mut obj = Map::new();
    for (key, value) in doc {
        obj.insert(key, bson_to_api_value(value));
    }
    Value::Object(obj)
}

pub fn documents_to_api_array(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(document_to_api_value).collect())
}

pub fn bson_to_api_value(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Document(inner) => document_to_api_value(inner),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_api_value).collect()),
        other => other.into_relaxed_extjson(),
    }
}

/// Convert a JSON request body into a document for storage.
pub fn json_to_document(body: Map<String, Value>) -> Result<Document, String> {
    match Bson::try_from(Value::Object(body)) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err("request body must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid request body: {}", e)),
    }
}
