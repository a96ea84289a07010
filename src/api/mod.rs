pub mod format;

pub use format::{bson_to_api_value, document_to_api_value, documents_to_api_array, json_to_document};
