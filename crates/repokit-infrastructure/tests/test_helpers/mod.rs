#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use repokit_domain::{DomainError, Entity, EntitySchema, Record, Relation, Value};
use repokit_infrastructure::{Database, SqliteUnitOfWork, StoreConfig};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    age INTEGER NOT NULL
);

CREATE TABLE appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    scheduled_at TEXT NOT NULL,
    notes TEXT
);

CREATE TABLE practitioners (
    license_no TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    specialty TEXT
);

CREATE TABLE tickets (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL
);

CREATE TABLE labels (
    name TEXT PRIMARY KEY
);
"#;

pub async fn setup_in_memory_db() -> Database {
    let db = Database::connect(&StoreConfig::in_memory())
        .await
        .expect("open in-memory database");
    db.execute_script(SCHEMA_SQL).await.expect("create schema");
    db
}

pub async fn setup_unit_of_work() -> SqliteUnitOfWork {
    let db = setup_in_memory_db().await;
    SqliteUnitOfWork::from_pool(db.into_pool())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub appointments: Vec<Appointment>,
}

impl Patient {
    pub fn new(name: &str, email: &str, age: i64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
            age,
            appointments: Vec::new(),
        }
    }
}

impl Entity for Patient {
    type Key = i64;

    const SCHEMA: EntitySchema = EntitySchema::new("patients", "id", &["name", "email", "age"])
        .with_relations(&[Relation::has_many(
            "appointments",
            "appointments",
            "patient_id",
        )]);

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.email.clone().into(),
            self.age.into(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.try_get("id")?,
            name: record.try_get("name")?,
            email: record.try_get("email")?,
            age: record.try_get("age")?,
            appointments: Vec::new(),
        })
    }

    fn load_related(&mut self, relation: &str, records: Vec<Record>) -> Result<(), DomainError> {
        match relation {
            "appointments" => {
                self.appointments = records
                    .iter()
                    .map(Appointment::from_record)
                    .collect::<Result<_, _>>()?;
                Ok(())
            }
            other => Err(DomainError::InvalidArgument(format!(
                "patients has no relation '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: Option<i64>,
    pub patient_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub patient: Option<Box<Patient>>,
}

impl Appointment {
    pub fn new(patient_id: i64, day: u32, notes: Option<&str>) -> Self {
        Self {
            id: None,
            patient_id,
            scheduled_at: Utc
                .with_ymd_and_hms(2026, 3, day, 9, 30, 0)
                .single()
                .expect("valid date"),
            notes: notes.map(String::from),
            patient: None,
        }
    }
}

impl Entity for Appointment {
    type Key = i64;

    const SCHEMA: EntitySchema = EntitySchema::new(
        "appointments",
        "id",
        &["patient_id", "scheduled_at", "notes"],
    )
    .with_relations(&[Relation::belongs_to("patient", "patients", "patient_id", "id")]);

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.patient_id.into(),
            self.scheduled_at.into(),
            self.notes.clone().into(),
        ]
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.try_get("id")?,
            patient_id: record.try_get("patient_id")?,
            scheduled_at: record.try_get("scheduled_at")?,
            notes: record.try_get("notes")?,
            patient: None,
        })
    }

    fn load_related(&mut self, relation: &str, records: Vec<Record>) -> Result<(), DomainError> {
        match relation {
            "patient" => {
                self.patient = records
                    .first()
                    .map(Patient::from_record)
                    .transpose()?
                    .map(Box::new);
                Ok(())
            }
            other => Err(DomainError::InvalidArgument(format!(
                "appointments has no relation '{}'",
                other
            ))),
        }
    }
}

/// String-keyed entity; the caller assigns the key
#[derive(Debug, Clone, PartialEq)]
pub struct Practitioner {
    pub license_no: Option<String>,
    pub full_name: String,
    pub specialty: Option<String>,
}

impl Practitioner {
    pub fn new(license_no: &str, full_name: &str) -> Self {
        Self {
            license_no: Some(license_no.to_string()),
            full_name: full_name.to_string(),
            specialty: None,
        }
    }
}

impl Entity for Practitioner {
    type Key = String;

    const SCHEMA: EntitySchema =
        EntitySchema::new("practitioners", "license_no", &["full_name", "specialty"])
            .with_assigned_key();

    fn key(&self) -> Option<String> {
        self.license_no.clone()
    }

    fn set_key(&mut self, key: String) {
        self.license_no = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        vec![self.full_name.clone().into(), self.specialty.clone().into()]
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            license_no: record.try_get("license_no")?,
            full_name: record.try_get("full_name")?,
            specialty: record.try_get("specialty")?,
        })
    }
}

/// Insert `count` patients named `patient-01`.. with ages 20..
pub async fn seed_patients(uow: &SqliteUnitOfWork, count: usize) -> Vec<i64> {
    use repokit_domain::{Repository, UnitOfWork};

    let repo = uow.repository::<Patient>();
    let handles: Vec<_> = (1..=count)
        .map(|n| {
            repo.add(Patient::new(
                &format!("patient-{:02}", n),
                &format!("patient{:02}@example.com", n),
                19 + n as i64,
            ))
            .expect("stage patient")
        })
        .collect();

    uow.commit().await.expect("commit seed");

    handles
        .iter()
        .map(|h| h.key().expect("generated key"))
        .collect()
}

/// Narrow `i32` key over an `INTEGER` rowid
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: Option<i32>,
    pub label: String,
}

impl Ticket {
    pub fn new(label: &str) -> Self {
        Self {
            id: None,
            label: label.to_string(),
        }
    }
}

impl Entity for Ticket {
    type Key = i32;

    const SCHEMA: EntitySchema = EntitySchema::new("tickets", "id", &["label"]);

    fn key(&self) -> Option<i32> {
        self.id
    }

    fn set_key(&mut self, key: i32) {
        self.id = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        vec![self.label.clone().into()]
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.try_get("id")?,
            label: record.try_get("label")?,
        })
    }
}

/// Key-only entity
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: Option<String>,
}

impl Label {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }
}

impl Entity for Label {
    type Key = String;

    const SCHEMA: EntitySchema = EntitySchema::new("labels", "name", &[]).with_assigned_key();

    fn key(&self) -> Option<String> {
        self.name.clone()
    }

    fn set_key(&mut self, key: String) {
        self.name = Some(key);
    }

    fn values(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_record(record: &Record) -> Result<Self, DomainError> {
        Ok(Self {
            name: record.try_get("name")?,
        })
    }
}
