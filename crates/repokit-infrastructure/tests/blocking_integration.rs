use repokit_domain::{DomainError, EntityState, Filter, OrderBy, Predicate, UnitOfWorkState, Value};
use repokit_infrastructure::blocking::BlockingUnitOfWork;
use repokit_infrastructure::StoreConfig;

mod test_helpers;
use test_helpers::{Patient, Practitioner, SCHEMA_SQL};

fn setup() -> BlockingUnitOfWork {
    let uow = BlockingUnitOfWork::connect(&StoreConfig::in_memory()).expect("connect");
    uow.execute_script(SCHEMA_SQL).expect("create schema");
    uow
}

#[test]
fn blocking_mutations_save_immediately() {
    let uow = setup();
    let repo = uow.repository::<Patient>();

    let handle = repo
        .add(Patient::new("Sync", "sync@example.com", 30))
        .expect("add");
    let id = handle.key().expect("key assigned on save");

    assert_eq!(uow.state(), UnitOfWorkState::Clean);
    assert_eq!(repo.state_of(&handle), EntityState::Unchanged);
    assert_eq!(repo.count().expect("count"), 1);

    let mut patient = repo.get_by_id(Some(id)).expect("get").expect("exists");
    assert_eq!(patient, handle.get());

    patient.age = 31;
    assert!(repo.update(Some(patient)).expect("update").is_some());
    assert!(!uow.has_changes());
    assert_eq!(
        repo.find(Predicate::eq("age", 31_i64))
            .expect("find")
            .map(|p| p.id),
        Some(Some(id))
    );

    assert_eq!(repo.delete(handle.get()).expect("delete"), 1);
    assert!(repo.get_by_id(Some(id)).expect("get").is_none());
    assert_eq!(repo.count().expect("count"), 0);
}

#[test]
fn blocking_update_none_saves_nothing() {
    let uow = setup();
    let repo = uow.repository::<Patient>();

    assert!(repo.update(None).expect("update").is_none());
    assert_eq!(repo.count().expect("count"), 0);
}

#[test]
fn blocking_reads_match_async_semantics() {
    let uow = setup();
    let repo = uow.repository::<Patient>();
    for n in 1..=5_i64 {
        repo.add(Patient::new(
            &format!("p{}", n),
            &format!("p{}@example.com", n),
            n * 10,
        ))
        .expect("add");
    }

    assert!(matches!(
        repo.get_by_id(None),
        Err(DomainError::InvalidArgument(_))
    ));
    assert!(matches!(
        repo.find(Predicate::gt("age", 10_i64)),
        Err(DomainError::AmbiguousResult(_))
    ));

    assert_eq!(repo.get_all().expect("get_all").len(), 5);
    assert_eq!(repo.get_all_compiled().expect("compiled").len(), 5);
    assert_eq!(repo.find_all(Predicate::le("age", 20_i64)).expect("find_all").len(), 2);
    assert_eq!(repo.find_by(Predicate::ge("age", 40_i64)).expect("find_by").len(), 2);
    assert!(repo.exist(Predicate::eq("name", "p3")).expect("exist"));

    let page = repo
        .filter(Filter::new().order_by(OrderBy::desc("age")).page(2, 2))
        .expect("filter");
    let ages: Vec<_> = page.iter().map(|p| p.age).collect();
    assert_eq!(ages, vec![30, 20]);

    let raw = repo
        .exec_with_store_procedure(
            "SELECT * FROM patients WHERE age BETWEEN ? AND ? ORDER BY age",
            &[Value::Integer(20), Value::Integer(30)],
        )
        .expect("raw");
    assert_eq!(raw.len(), 2);
}

#[test]
fn blocking_string_keys_and_rollback() {
    let uow = setup();
    let repo = uow.repository::<Practitioner>();

    repo.add(Practitioner::new("LIC-100", "Dr. Sync"))
        .expect("add");
    assert_eq!(
        repo.get_by_unique_id("LIC-100")
            .expect("get")
            .map(|p| p.full_name),
        Some("Dr. Sync".to_string())
    );

    // Staging through the async side, then discarding
    use repokit_domain::{Repository, UnitOfWork};
    uow.as_async()
        .repository::<Practitioner>()
        .add(Practitioner::new("LIC-200", "Dr. Pending"))
        .expect("stage");
    assert!(uow.has_changes());

    uow.rollback().expect("rollback");
    assert!(!uow.has_changes());
    assert!(repo.get_by_unique_id("LIC-200").expect("get").is_none());
    assert_eq!(uow.commit().expect("commit"), 0);
}
