use repokit_domain::{DomainError, Entity, EntitySchema, Record, Tracked, Value};

#[derive(Debug, Clone, PartialEq)]
struct Note {
    id: Option<i64>,
    title: String,
    pinned: bool,
}

impl Entity for Note {
    type Key = i64;

    const SCHEMA: EntitySchema = EntitySchema::new("notes", "id", &["title", "pinned"]);

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        vec![self.title.clone().into(), self.pinned.into()]
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.try_get("id")?,
            title: record.try_get("title")?,
            pinned: record.try_get("pinned")?,
        })
    }
}

fn note(title: &str) -> Note {
    Note {
        id: None,
        title: title.to_string(),
        pinned: false,
    }
}

#[test]
fn from_record_reads_sqlite_booleans() {
    let record = Record::new()
        .with("id", 7_i64)
        .with("title", "groceries")
        .with("pinned", 1_i64);

    let loaded = Note::from_record(&record).expect("map record");

    assert_eq!(loaded.id, Some(7));
    assert!(loaded.pinned);
    assert_eq!(loaded.values().len(), Note::SCHEMA.columns.len());
}

#[test]
fn tracked_clones_share_one_cell() {
    let tracked = Tracked::new(note("draft"));
    let other = tracked.clone();

    other.assign_key(42);
    tracked.modify(|n| n.title = "final".to_string());

    assert!(tracked.ptr_eq(&other));
    assert_eq!(tracked.handle_id(), other.handle_id());
    assert_eq!(other.key(), Some(42));
    assert_eq!(other.get().title, "final");
}

#[test]
fn separate_handles_are_distinct() {
    let a = Tracked::new(note("a"));
    let b = Tracked::new(note("a"));

    assert!(!a.ptr_eq(&b));
    assert_eq!(a.get(), b.get());
}

#[test]
fn undeclared_relation_is_rejected() {
    let mut n = note("x");
    let err = n.load_related("tags", Vec::new()).unwrap_err();

    assert!(matches!(err, DomainError::InvalidArgument(_)));
    assert!(err.message().contains("tags"));
}

#[test]
fn values_serialize_untagged() {
    let json = serde_json::to_string(&vec![
        Value::Integer(3),
        Value::Text("a".into()),
        Value::Null,
    ])
    .expect("serialize");

    assert_eq!(json, r#"[3,"a",null]"#);
}
