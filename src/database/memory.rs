use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use super::store::{Collection, DocumentStore, StoreError, UpdateOutcome};

#[derive(Default)]
struct Inner {
    collections: HashMap<Collection, Vec<Document>>,
    unique_indexes: HashMap<Collection, Vec<Vec<String>>>,
}

/// In-process DocumentStore.
///
/// Evaluates the same filter, update and pipeline documents that are sent to
/// MongoDB: equality filters, `$set` updates, and the `$match`, `$addFields`,
/// `$lookup`, `$unwind` and `$project` stages with `$ifNull`, `$convert` and
/// `$toObjectId` expressions. Used for local development and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve a dotted path against a document. `None` means the field is missing.
fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, expected) in filter {
        if key.starts_with('$') {
            return Err(StoreError::Unsupported(format!("query operator {}", key)));
        }
        let actual = get_path(doc, key).unwrap_or(&Bson::Null);
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

fn index_key(doc: &Document, keys: &[String]) -> Vec<Bson> {
    keys.iter()
        .map(|k| get_path(doc, k).cloned().unwrap_or(Bson::Null))
        .collect()
}

impl Inner {
    /// Reject `candidate` if it collides on `_id` or any unique index, ignoring the
    /// document at `skip` (the one being replaced).
    fn check_unique(&self, coll: Collection, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        let docs = self.collections.get(&coll).map(Vec::as_slice).unwrap_or(&[]);
        let id = candidate.get("_id");
        for (pos, existing) in docs.iter().enumerate() {
            if Some(pos) == skip {
                continue;
            }
            if id.is_some() && existing.get("_id") == id {
                return Err(StoreError::DuplicateKey(format!("{} _id", coll.name())));
            }
        }

        if let Some(indexes) = self.unique_indexes.get(&coll) {
            for keys in indexes {
                let wanted = index_key(candidate, keys);
                let clash = docs
                    .iter()
                    .enumerate()
                    .any(|(pos, existing)| Some(pos) != skip && index_key(existing, keys) == wanted);
                if clash {
                    return Err(StoreError::DuplicateKey(format!("{} {}", coll.name(), keys.join("_"))));
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, coll: Collection, mut doc: Document) -> Result<Bson, StoreError> {
        if !doc.contains_key("_id") {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            for (k, v) in doc {
                with_id.insert(k, v);
            }
            doc = with_id;
        }
        self.check_unique(coll, &doc, None)?;
        let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        self.collections.entry(coll).or_default().push(doc);
        Ok(id)
    }
}

fn set_fields(update: &Document) -> Result<Document, StoreError> {
    let mut set = Document::new();
    for (op, fields) in update {
        match (op.as_str(), fields) {
            ("$set", Bson::Document(fields)) => {
                for (k, v) in fields {
                    set.insert(k.clone(), v.clone());
                }
            }
            _ => return Err(StoreError::Unsupported(format!("update operator {}", op))),
        }
    }
    Ok(set)
}

/// Evaluate an aggregation expression. `Ok(None)` is a missing value.
fn eval(expr: &Bson, doc: &Document) -> Result<Option<Bson>, StoreError> {
    match expr {
        Bson::String(s) if s.starts_with('$') => Ok(get_path(doc, &s[1..]).cloned()),
        Bson::Document(spec) if spec.len() == 1 && spec.keys().all(|k| k.starts_with('$')) => {
            let (op, arg) = spec.iter().next().ok_or_else(|| StoreError::InvalidDocument("empty expression".into()))?;
            match op.as_str() {
                "$ifNull" => eval_if_null(arg, doc),
                "$convert" => eval_convert(arg, doc),
                "$toObjectId" => to_object_id(eval(arg, doc)?, None, None, doc),
                other => Err(StoreError::Unsupported(format!("expression {}", other))),
            }
        }
        Bson::Document(spec) => {
            let mut out = Document::new();
            for (k, v) in spec {
                if let Some(value) = eval(v, doc)? {
                    out.insert(k.clone(), value);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        other => Ok(Some(other.clone())),
    }
}

fn eval_if_null(arg: &Bson, doc: &Document) -> Result<Option<Bson>, StoreError> {
    let args = match arg {
        Bson::Array(args) if args.len() >= 2 => args,
        _ => return Err(StoreError::InvalidDocument("$ifNull expects at least two arguments".into())),
    };
    let (fallback, candidates) = args.split_last().ok_or_else(|| StoreError::InvalidDocument("$ifNull".into()))?;
    for candidate in candidates {
        match eval(candidate, doc)? {
            Some(Bson::Null) | None => continue,
            Some(value) => return Ok(Some(value)),
        }
    }
    eval(fallback, doc)
}

fn eval_convert(arg: &Bson, doc: &Document) -> Result<Option<Bson>, StoreError> {
    let spec = match arg {
        Bson::Document(spec) => spec,
        _ => return Err(StoreError::InvalidDocument("$convert expects a document".into())),
    };
    match spec.get_str("to") {
        Ok("objectId") => {}
        _ => return Err(StoreError::Unsupported("$convert target other than objectId".into())),
    }
    let input = match spec.get("input") {
        Some(input) => eval(input, doc)?,
        None => return Err(StoreError::InvalidDocument("$convert requires input".into())),
    };
    to_object_id(input, spec.get("onError"), spec.get("onNull"), doc)
}

fn to_object_id(
    input: Option<Bson>,
    on_error: Option<&Bson>,
    on_null: Option<&Bson>,
    doc: &Document,
) -> Result<Option<Bson>, StoreError> {
    match input {
        None | Some(Bson::Null) => match on_null {
            Some(fallback) => eval(fallback, doc),
            None => Ok(Some(Bson::Null)),
        },
        Some(Bson::ObjectId(oid)) => Ok(Some(Bson::ObjectId(oid))),
        Some(Bson::String(s)) => match ObjectId::parse_str(&s) {
            Ok(oid) => Ok(Some(Bson::ObjectId(oid))),
            Err(_) => match on_error {
                Some(fallback) => eval(fallback, doc),
                None => Err(StoreError::InvalidDocument(format!("cannot convert '{}' to objectId", s))),
            },
        },
        Some(other) => match on_error {
            Some(fallback) => eval(fallback, doc),
            None => Err(StoreError::InvalidDocument(format!("cannot convert {} to objectId", other))),
        },
    }
}

fn is_inclusion(spec: &Bson) -> Option<bool> {
    match spec {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(n) => Some(*n != 0),
        Bson::Int64(n) => Some(*n != 0),
        Bson::Double(n) => Some(*n != 0.0),
        _ => None,
    }
}

fn project(doc: &Document, spec: &Document) -> Result<Document, StoreError> {
    let mut out = Document::new();
    let keep_id = spec.get("_id").and_then(is_inclusion).unwrap_or(true);
    if keep_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (field, rule) in spec {
        if field == "_id" && is_inclusion(rule).is_some() {
            continue;
        }
        match is_inclusion(rule) {
            Some(true) => {
                if let Some(value) = get_path(doc, field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            Some(false) => {
                return Err(StoreError::Unsupported(format!("exclusion of '{}' in $project", field)));
            }
            None => {
                if let Some(value) = eval(rule, doc)? {
                    out.insert(field.clone(), value);
                }
            }
        }
    }
    Ok(out)
}

fn unwind(docs: Vec<Document>, spec: &Bson) -> Result<Vec<Document>, StoreError> {
    let (path, preserve) = match spec {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(options) => (
            options
                .get_str("path")
                .map_err(|_| StoreError::InvalidDocument("$unwind requires a path".into()))?,
            options.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        ),
        _ => return Err(StoreError::InvalidDocument("$unwind".into())),
    };
    let field = path
        .strip_prefix('$')
        .ok_or_else(|| StoreError::InvalidDocument("$unwind path must start with '$'".into()))?;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.get(field).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    copy.insert(field, item);
                    out.push(copy);
                }
            }
            Some(Bson::Array(_)) => {
                if preserve {
                    let mut copy = doc;
                    copy.remove(field);
                    out.push(copy);
                }
            }
            None | Some(Bson::Null) => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

impl Inner {
    fn lookup(&self, docs: Vec<Document>, spec: &Document) -> Result<Vec<Document>, StoreError> {
        let field = |name: &str| {
            spec.get_str(name)
                .map_err(|_| StoreError::InvalidDocument(format!("$lookup requires '{}'", name)))
        };
        let from = field("from")?;
        let local = field("localField")?;
        let foreign = field("foreignField")?;
        let target = field("as")?;
        let coll = Collection::from_name(from)
            .ok_or_else(|| StoreError::InvalidDocument(format!("unknown collection '{}'", from)))?;
        let foreign_docs = self.collections.get(&coll).map(Vec::as_slice).unwrap_or(&[]);

        Ok(docs
            .into_iter()
            .map(|mut doc| {
                let key = get_path(&doc, local).cloned().unwrap_or(Bson::Null);
                let joined: Vec<Bson> = foreign_docs
                    .iter()
                    .filter(|f| get_path(f, foreign).unwrap_or(&Bson::Null) == &key)
                    .cloned()
                    .map(Bson::Document)
                    .collect();
                doc.insert(target, joined);
                doc
            })
            .collect())
    }

    fn run_pipeline(&self, coll: Collection, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self.collections.get(&coll).cloned().unwrap_or_default();
        for stage in pipeline {
            let (name, spec) = match (stage.len(), stage.iter().next()) {
                (1, Some(entry)) => entry,
                _ => return Err(StoreError::InvalidDocument("pipeline stage must have exactly one key".into())),
            };
            docs = match (name.as_str(), spec) {
                ("$match", Bson::Document(filter)) => {
                    let mut kept = Vec::new();
                    for doc in docs {
                        if matches(&doc, filter)? {
                            kept.push(doc);
                        }
                    }
                    kept
                }
                ("$addFields", Bson::Document(fields)) => {
                    let mut out = Vec::with_capacity(docs.len());
                    for mut doc in docs {
                        for (k, expr) in fields {
                            match eval(expr, &doc)? {
                                Some(value) => {
                                    doc.insert(k.clone(), value);
                                }
                                None => {
                                    doc.remove(k);
                                }
                            }
                        }
                        out.push(doc);
                    }
                    out
                }
                ("$lookup", Bson::Document(lookup)) => self.lookup(docs, lookup)?,
                ("$unwind", spec) => unwind(docs, spec)?,
                ("$project", Bson::Document(spec)) => docs
                    .iter()
                    .map(|doc| project(doc, spec))
                    .collect::<Result<Vec<_>, _>>()?,
                (other, _) => return Err(StoreError::Unsupported(format!("pipeline stage {}", other))),
            };
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, coll: Collection, filter: Document) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().await;
        for doc in inner.collections.get(&coll).into_iter().flatten() {
            if matches(doc, &filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn find_many(&self, coll: Collection, filter: Document) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let mut found = Vec::new();
        for doc in inner.collections.get(&coll).into_iter().flatten() {
            if matches(doc, &filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn insert_one(&self, coll: Collection, doc: Document) -> Result<Bson, StoreError> {
        self.inner.write().await.insert(coll, doc)
    }

    async fn update_one(
        &self,
        coll: Collection,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let set = set_fields(&update)?;
        let mut inner = self.inner.write().await;

        let mut position = None;
        for (pos, doc) in inner.collections.get(&coll).into_iter().flatten().enumerate() {
            if matches(doc, &filter)? {
                position = Some(pos);
                break;
            }
        }

        match position {
            Some(pos) => {
                let current = inner.collections.get(&coll).and_then(|docs| docs.get(pos)).cloned();
                let mut updated = current.clone().unwrap_or_default();
                for (k, v) in &set {
                    updated.insert(k.clone(), v.clone());
                }
                if current.as_ref() == Some(&updated) {
                    return Ok(UpdateOutcome { matched_count: 1, modified_count: 0, upserted_id: None });
                }
                inner.check_unique(coll, &updated, Some(pos))?;
                if let Some(slot) = inner.collections.get_mut(&coll).and_then(|docs| docs.get_mut(pos)) {
                    *slot = updated;
                }
                Ok(UpdateOutcome { matched_count: 1, modified_count: 1, upserted_id: None })
            }
            None if upsert => {
                let mut doc = Document::new();
                for (k, v) in &filter {
                    doc.insert(k.clone(), v.clone());
                }
                for (k, v) in set {
                    doc.insert(k, v);
                }
                let id = inner.insert(coll, doc)?;
                Ok(UpdateOutcome { matched_count: 0, modified_count: 0, upserted_id: Some(id) })
            }
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn delete_one(&self, coll: Collection, filter: Document) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(docs) = inner.collections.get_mut(&coll) else {
            return Ok(0);
        };
        let mut position = None;
        for (pos, doc) in docs.iter().enumerate() {
            if matches(doc, &filter)? {
                position = Some(pos);
                break;
            }
        }
        match position {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(&self, coll: Collection, pipeline: Vec<Document>) -> Result<Vec<Document>, StoreError> {
        self.inner.read().await.run_pipeline(coll, &pipeline)
    }

    async fn ensure_unique_index(&self, coll: Collection, keys: &[&str]) -> Result<(), StoreError> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let mut inner = self.inner.write().await;
        let indexes = inner.unique_indexes.entry(coll).or_default();
        if !indexes.contains(&keys) {
            indexes.push(keys);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn insert_assigns_object_id() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Users, doc! { "email": "a@b.com" })
            .await
            .unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let found = store
            .find_one(Collection::Users, doc! { "_id": id.clone() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("email").unwrap(), "a@b.com");
        assert_eq!(found.keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .ensure_unique_index(Collection::Applications, &["scholarshipId", "userEmail"])
            .await
            .unwrap();
        store
            .insert_one(Collection::Applications, doc! { "scholarshipId": "s1", "userEmail": "a@b.com" })
            .await
            .unwrap();
        store
            .insert_one(Collection::Applications, doc! { "scholarshipId": "s2", "userEmail": "a@b.com" })
            .await
            .unwrap();

        let err = store
            .insert_one(Collection::Applications, doc! { "scholarshipId": "s1", "userEmail": "a@b.com" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn update_with_identical_value_is_not_modified() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::Users, doc! { "email": "a@b.com", "role": "User" })
            .await
            .unwrap();

        let same = store
            .update_one(Collection::Users, doc! { "_id": id.clone() }, doc! { "$set": { "role": "User" } }, false)
            .await
            .unwrap();
        assert_eq!(same.matched_count, 1);
        assert_eq!(same.modified_count, 0);

        let changed = store
            .update_one(Collection::Users, doc! { "_id": id }, doc! { "$set": { "role": "Admin" } }, false)
            .await
            .unwrap();
        assert_eq!(changed.modified_count, 1);
    }

    #[tokio::test]
    async fn upsert_creates_document_at_filter_id() {
        let store = MemoryStore::new();
        let oid = ObjectId::new();

        let outcome = store
            .update_one(
                Collection::Scholarships,
                doc! { "_id": oid },
                doc! { "$set": { "universityName": "X" } },
                true,
            )
            .await
            .unwrap();
        assert_eq!(outcome.upserted_id, Some(Bson::ObjectId(oid)));

        let missing = store
            .update_one(
                Collection::Scholarships,
                doc! { "_id": ObjectId::new() },
                doc! { "$set": { "universityName": "Y" } },
                false,
            )
            .await
            .unwrap();
        assert_eq!(missing, UpdateOutcome::default());
        assert_eq!(store.find_many(Collection::Scholarships, doc! {}).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let store = MemoryStore::new();
        let id = store.insert_one(Collection::Payments, doc! { "a": 1 }).await.unwrap();
        assert_eq!(store.delete_one(Collection::Payments, doc! { "_id": id.clone() }).await.unwrap(), 1);
        assert_eq!(store.delete_one(Collection::Payments, doc! { "_id": id }).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lookup_and_unwind_preserve_unmatched_rows() {
        let store = MemoryStore::new();
        let sid = store
            .insert_one(Collection::Scholarships, doc! { "universityName": "X" })
            .await
            .unwrap();
        let hex = sid.as_object_id().unwrap().to_hex();
        store
            .insert_one(Collection::Applications, doc! { "scholarshipId": hex, "userEmail": "a@b.com" })
            .await
            .unwrap();
        store
            .insert_one(Collection::Applications, doc! { "scholarshipId": "not-an-id", "userEmail": "a@b.com" })
            .await
            .unwrap();

        let pipeline = vec![
            doc! { "$match": { "userEmail": "a@b.com" } },
            doc! { "$addFields": { "sid": { "$convert": { "input": "$scholarshipId", "to": "objectId", "onError": null, "onNull": null } } } },
            doc! { "$lookup": { "from": "scholarships", "localField": "sid", "foreignField": "_id", "as": "s" } },
            doc! { "$unwind": { "path": "$s", "preserveNullAndEmptyArrays": true } },
            doc! { "$project": { "_id": 0, "name": { "$ifNull": ["$s.universityName", null] } } },
        ];
        let rows = store.aggregate(Collection::Applications, pipeline).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_str("name").unwrap(), "X");
        assert_eq!(rows[1].get("name"), Some(&Bson::Null));
        assert!(!rows[1].contains_key("_id"));
    }

    #[tokio::test]
    async fn inner_unwind_drops_unmatched_rows() {
        let store = MemoryStore::new();
        store
            .insert_one(Collection::Applications, doc! { "scholarshipId": "x", "userEmail": "a@b.com" })
            .await
            .unwrap();
        let rows = store
            .aggregate(
                Collection::Applications,
                vec![
                    doc! { "$lookup": { "from": "scholarships", "localField": "scholarshipId", "foreignField": "_id", "as": "s" } },
                    doc! { "$unwind": "$s" },
                ],
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unsupported_stage_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .aggregate(Collection::Users, vec![doc! { "$group": { "_id": "$role" } }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }
}
