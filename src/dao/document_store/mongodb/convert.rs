use mongodb::bson::{Bson, Document, doc};
use serde_json::Value;

use crate::dao::document_store::{Filter, SortOrder};

pub fn to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(*flag),
        Value::Number(number) => number
            .as_i64()
            .map(Bson::Int64)
            .unwrap_or_else(|| Bson::Double(number.as_f64().unwrap_or_default())),
        Value::String(text) => Bson::String(text.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(to_bson).collect()),
        Value::Object(map) => {
            let mut document = Document::new();
            for (key, item) in map {
                document.insert(key.clone(), to_bson(item));
            }
            Bson::Document(document)
        }
    }
}

/// Convert a stored document back to JSON, dropping MongoDB's `_id` key.
pub fn from_document(document: Document) -> Value {
    let mut map = serde_json::Map::new();
    for (key, item) in document {
        if key == "_id" {
            continue;
        }
        map.insert(key, from_bson(item));
    }
    Value::Object(map)
}

fn from_bson(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(number) => Value::from(number),
        Bson::Int64(number) => Value::from(number),
        Bson::Double(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(text) => Value::String(text),
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson).collect()),
        Bson::Document(document) => {
            let mut map = serde_json::Map::new();
            for (key, item) in document {
                map.insert(key, from_bson(item));
            }
            Value::Object(map)
        }
        Bson::DateTime(at) => Value::from(at.timestamp_millis()),
        other => Value::String(other.to_string()),
    }
}

fn operator(field: &str, op: &str, value: &Value) -> Document {
    let mut inner = Document::new();
    inner.insert(op, to_bson(value));
    let mut outer = Document::new();
    outer.insert(field, inner);
    outer
}

/// Escape regex metacharacters so user input matches literally.
fn escape_regex(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if "\\.^$|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub fn filter_document(filter: &Filter) -> Document {
    match filter {
        Filter::All => Document::new(),
        Filter::Eq(field, value) => {
            let mut document = Document::new();
            document.insert(field.as_str(), to_bson(value));
            document
        }
        Filter::Ne(field, value) => operator(field, "$ne", value),
        Filter::In(field, values) => {
            let options: Vec<Bson> = values.iter().map(to_bson).collect();
            let mut outer = Document::new();
            outer.insert(field.as_str(), doc! { "$in": options });
            outer
        }
        Filter::Gt(field, value) => operator(field, "$gt", value),
        Filter::Gte(field, value) => operator(field, "$gte", value),
        Filter::Lt(field, value) => operator(field, "$lt", value),
        Filter::Lte(field, value) => operator(field, "$lte", value),
        Filter::Contains { fields, needle } => {
            let pattern = escape_regex(needle);
            let branches: Vec<Document> = fields
                .iter()
                .map(|field| {
                    let mut branch = Document::new();
                    branch.insert(
                        field.as_str(),
                        doc! { "$regex": pattern.clone(), "$options": "i" },
                    );
                    branch
                })
                .collect();
            doc! { "$or": branches }
        }
        Filter::And(filters) => {
            let parts: Vec<Document> = filters.iter().map(filter_document).collect();
            doc! { "$and": parts }
        }
        Filter::Or(filters) => {
            let parts: Vec<Document> = filters.iter().map(filter_document).collect();
            doc! { "$or": parts }
        }
    }
}

pub fn sort_document(sort: &[(String, SortOrder)]) -> Option<Document> {
    if sort.is_empty() {
        return None;
    }
    let mut document = Document::new();
    for (field, order) in sort {
        let direction = match order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        document.insert(field.as_str(), direction);
    }
    Some(document)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn search_needles_are_escaped() {
        assert_eq!(escape_regex("c++ (beta)"), r"c\+\+ \(beta\)");
        assert_eq!(escape_regex("plain"), "plain");
    }

    #[test]
    fn integers_stay_integral() {
        assert_eq!(to_bson(&json!(42)), Bson::Int64(42));
        assert_eq!(to_bson(&json!(0.5)), Bson::Double(0.5));
    }
}
