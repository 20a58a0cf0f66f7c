//! End-to-end scenarios exercising `Collection`/`Database` over an
//! in-memory backend pair, covering the concrete walkthroughs a
//! document database of this shape needs to get right: dotted-path
//! filtering, logical combination, immutable `_id`, array update
//! operators, duplicate-key rejection, and cross-instance modification
//! conflicts via the master index.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use vaultdb_core::{BlobStore, Database, DatabaseConfig, PropertyStore, Result, VaultError};

#[derive(Clone, Default)]
struct MemoryBlobStore {
    files: Arc<Mutex<HashMap<String, Value>>>,
    next_id: Arc<Mutex<u64>>,
}

impl BlobStore for MemoryBlobStore {
    fn read_file(&self, handle: &str) -> Result<Value> {
        self.files
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("no such file {handle}")))
    }
    fn write_file(&self, handle: &str, content: &Value) -> Result<()> {
        self.files.lock().insert(handle.to_string(), content.clone());
        Ok(())
    }
    fn create_file(&self, _name: &str, content: &Value) -> Result<String> {
        let mut id = self.next_id.lock();
        *id += 1;
        let handle = format!("file-{id}");
        self.files.lock().insert(handle.clone(), content.clone());
        Ok(handle)
    }
    fn delete_file(&self, handle: &str) -> Result<()> {
        self.files.lock().remove(handle);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MemoryPropertyStore {
    props: Arc<Mutex<HashMap<String, String>>>,
}

impl PropertyStore for MemoryPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.props.lock().get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.props.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn delete(&self, key: &str) -> Result<()> {
        self.props.lock().remove(key);
        Ok(())
    }
    fn with_exclusive_lock<R>(&self, _timeout_ms: u64, f: impl FnOnce() -> Result<R>) -> Result<R> {
        f()
    }
}

fn open_db() -> (Database<MemoryBlobStore, MemoryPropertyStore>, MemoryBlobStore, MemoryPropertyStore) {
    let blobs = MemoryBlobStore::default();
    let props = MemoryPropertyStore::default();
    let db = Database::open(DatabaseConfig::default(), blobs.clone(), props.clone()).unwrap();
    (db, blobs, props)
}

#[test]
fn dotted_path_implicit_equality_over_array_of_objects() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people
        .insert_one(json!({"_id": "1", "name": {"first": "Anna"}, "addresses": [{"city": "NYC"}, {"city": "LA"}]}))
        .unwrap();
    people
        .insert_one(json!({"_id": "2", "name": {"first": "Ben"}, "addresses": [{"city": "SF"}]}))
        .unwrap();

    let hits = people.find(&json!({"name.first": "Anna"})).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), "1");

    let by_city = people.find(&json!({"addresses.city": "LA"})).unwrap();
    assert_eq!(by_city.len(), 1);
    assert_eq!(by_city[0].id(), "1");
}

#[test]
fn logical_and_combines_field_predicates() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1", "age": 30, "isActive": true})).unwrap();
    people.insert_one(json!({"_id": "2", "age": 17, "isActive": true})).unwrap();
    people.insert_one(json!({"_id": "3", "age": 40, "isActive": false})).unwrap();

    let filter = json!({"$and": [{"age": {"$gte": 18}}, {"isActive": true}]});
    let mut hits: Vec<String> = people.find(&filter).unwrap().into_iter().map(|d| d.id().to_string()).collect();
    hits.sort();
    assert_eq!(hits, vec!["1".to_string()]);
}

#[test]
fn id_is_immutable_via_update_operators() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1", "name": "Anna"})).unwrap();

    let err = people.update_one(&json!({"_id": "1"}), &json!({"$set": {"_id": "2"}})).unwrap_err();
    assert!(matches!(err, VaultError::ImmutableField));
}

#[test]
fn array_operators_push_pull_add_to_set() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1", "tags": ["a"]})).unwrap();

    people.update_one(&json!({"_id": "1"}), &json!({"$push": {"tags": {"$each": ["b", "c"]}}})).unwrap();
    let after_push = people.find_one(&json!({"_id": "1"})).unwrap().unwrap();
    assert_eq!(after_push.get("tags"), Some(&json!(["a", "b", "c"])));

    people.update_one(&json!({"_id": "1"}), &json!({"$pull": {"tags": "b"}})).unwrap();
    let after_pull = people.find_one(&json!({"_id": "1"})).unwrap().unwrap();
    assert_eq!(after_pull.get("tags"), Some(&json!(["a", "c"])));

    people.update_one(&json!({"_id": "1"}), &json!({"$addToSet": {"tags": {"$each": ["a", "d"]}}})).unwrap();
    let after_add = people.find_one(&json!({"_id": "1"})).unwrap().unwrap();
    assert_eq!(after_add.get("tags"), Some(&json!(["a", "c", "d"])));
}

#[test]
fn duplicate_id_insert_is_rejected() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1", "name": "Anna"})).unwrap();
    let err = people.insert_one(json!({"_id": "1", "name": "Duplicate"})).unwrap_err();
    assert!(matches!(err, VaultError::DuplicateKey(_)));
}

#[test]
fn two_database_handles_sharing_a_backend_see_each_others_writes() {
    let blobs = MemoryBlobStore::default();
    let props = MemoryPropertyStore::default();

    let mut db_a = Database::open(DatabaseConfig::default(), blobs.clone(), props.clone()).unwrap();
    db_a.create_collection("people").unwrap();
    db_a.collection("people").unwrap().insert_one(json!({"_id": "1", "name": "Anna"})).unwrap();

    let mut db_b = Database::open(DatabaseConfig::default(), blobs, props).unwrap();
    let found = db_b.collection("people").unwrap().find_one(&json!({"_id": "1"})).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("Anna")));
}

#[test]
fn stale_instance_publishing_after_a_concurrent_write_hits_a_conflict() {
    let blobs = MemoryBlobStore::default();
    let props = MemoryPropertyStore::default();

    let mut db_a = Database::open(DatabaseConfig::default(), blobs.clone(), props.clone()).unwrap();
    db_a.create_collection("people").unwrap();
    db_a.collection("people").unwrap().insert_one(json!({"_id": "1", "name": "Anna"})).unwrap();

    // A opens a second handle on the same backend; both now agree on the
    // collection's current modification token.
    let mut db_b = Database::open(DatabaseConfig::default(), blobs, props).unwrap();

    // B publishes a change, minting a fresh token that A's in-memory copy
    // of the master index does not know about.
    db_b.collection("people")
        .unwrap()
        .update_one(&json!({"_id": "1"}), &json!({"$set": {"name": "Ben"}}))
        .unwrap();

    // A, still holding its now-stale token, attempts to publish a change
    // of its own — it must be rejected rather than clobber B's write.
    let err = db_a
        .collection("people")
        .unwrap()
        .update_one(&json!({"_id": "1"}), &json!({"$set": {"name": "Clara"}}))
        .unwrap_err();
    match err {
        VaultError::Conflict { collection, expected, actual } => {
            assert_eq!(collection, "people");
            assert_ne!(expected, actual);
        }
        other => panic!("expected VaultError::Conflict, got {other:?}"),
    }

    // B's write survived; A's did not get applied.
    let found = db_b.collection("people").unwrap().find_one(&json!({"_id": "1"})).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&json!("Ben")));
}

#[test]
fn empty_filter_matches_every_document() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1"})).unwrap();
    people.insert_one(json!({"_id": "2"})).unwrap();
    assert_eq!(people.count_documents(&json!({})).unwrap(), 2);
}

#[test]
fn replace_one_preserves_id_and_drops_other_fields() {
    let (mut db, ..) = open_db();
    db.create_collection("people").unwrap();
    let mut people = db.collection("people").unwrap();
    people.insert_one(json!({"_id": "1", "name": "Anna", "age": 30})).unwrap();
    let replaced = people.replace_one(&json!({"_id": "1"}), json!({"name": "Annabel"})).unwrap();
    assert_eq!(replaced.id(), "1");
    assert_eq!(replaced.get("age"), None);
    assert_eq!(replaced.get("name"), Some(&json!("Annabel")));
}
