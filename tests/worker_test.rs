//! Concurrent indexing through the transactional worker: many sessions,
//! two entity types sharing one physical directory, sync and async batch
//! execution. Every batch must leave the workspace clean, whatever the
//! interleaving.

mod support;

use std::sync::Arc;
use std::thread;

use quiver::config::Settings;
use quiver::engine::EntityDescriptorBuilder;
use quiver::event::IndexingEventListener;
use quiver::factory::SearchFactory;
use quiver::query::TermQuery;
use support::TestTransaction;

struct Employee {
    id: i64,
    name: String,
}

struct Employer {
    id: i64,
    name: String,
}

fn factory(settings: Settings) -> SearchFactory {
    let employee = EntityDescriptorBuilder::<Employee>::new("Employee", "people")
        .id_i64("id", |e| e.id)
        .text("name", |e| Some(e.name.as_str().into()))
        .build()
        .unwrap();
    let employer = EntityDescriptorBuilder::<Employer>::new("Employer", "people")
        .id_i64("id", |e| e.id)
        .text("name", |e| Some(e.name.as_str().into()))
        .build()
        .unwrap();
    SearchFactory::builder()
        .settings(settings.with("quiver.default.directory_provider", "ram"))
        .register(employee)
        .register(employer)
        .build()
        .unwrap()
}

/// One session: persist an employee and its employer, commit, then delete
/// both in a second transaction.
fn work(listener: &IndexingEventListener, seed: i64) {
    let employee = Arc::new(Employee {
        id: seed,
        name: format!("Emmanuel {seed}"),
    });
    let employer = Arc::new(Employer {
        id: seed,
        name: format!("RedHat {seed}"),
    });

    let transaction = TestTransaction::begin();
    listener.on_post_insert(employee.clone(), &transaction).unwrap();
    listener.on_post_insert(employer.clone(), &transaction).unwrap();
    transaction.commit();

    let transaction = TestTransaction::begin();
    listener.on_post_delete(employee, &transaction).unwrap();
    listener.on_post_delete(employer, &transaction).unwrap();
    transaction.commit();
}

fn run_concurrently(settings: Settings) -> Arc<dyn quiver::store::DirectoryProvider> {
    let factory = Arc::new(factory(settings));
    let directory = factory.directory_providers()[0].clone();

    let mut handles = Vec::new();
    for thread_index in 0..15 {
        let factory = factory.clone();
        handles.push(thread::spawn(move || {
            let listener = IndexingEventListener::new(&factory);
            for iteration in 0..10 {
                work(&listener, thread_index * 1000 + iteration);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("no indexing thread may fail");
    }

    // dropping the factory drains the async worker pool
    drop(factory);
    directory
}

#[test]
fn concurrent_sessions_with_sync_execution() {
    // inline execution applies each session's batches in order: every
    // insert pair is deleted again, leaving no live documents
    let directory = run_concurrently(Settings::new());
    assert_eq!(directory.read_segment().unwrap().num_live_docs(), 0);
}

#[test]
fn concurrent_sessions_with_async_execution() {
    // a multi-threaded pool gives no ordering guarantee across a session's
    // batches (its delete may land before its own add), so the final live
    // count is unspecified; what must hold is that every session completes
    // cleanly and every add batch was applied exactly once
    let settings = Settings::new()
        .with("quiver.worker.execution", "async")
        .with("quiver.worker.thread_pool.size", "4")
        .with("quiver.worker.buffer_queue.max", "8");
    let directory = run_concurrently(settings);
    // 15 threads x 10 sessions x 2 inserts; deletes only tombstone, so the
    // total is invariant under batch reordering
    assert_eq!(directory.read_segment().unwrap().documents.len(), 300);
}

#[test]
fn async_single_worker_applies_batches_in_submission_order() {
    // one worker over an unbounded queue preserves submission order, so
    // each session's delete batch lands after its own add batch
    let settings = Settings::new()
        .with("quiver.worker.execution", "async")
        .with("quiver.worker.thread_pool.size", "1");
    let directory = run_concurrently(settings);
    assert_eq!(directory.read_segment().unwrap().num_live_docs(), 0);
}

#[test]
fn types_sharing_a_directory_stay_distinguishable() {
    let factory = factory(Settings::new());
    let listener = IndexingEventListener::new(&factory);

    let transaction = TestTransaction::begin();
    listener
        .on_post_insert(
            Arc::new(Employee {
                id: 1,
                name: "Emmanuel".into(),
            }),
            &transaction,
        )
        .unwrap();
    listener
        .on_post_insert(
            Arc::new(Employer {
                id: 1,
                name: "Emmanuel".into(),
            }),
            &transaction,
        )
        .unwrap();
    transaction.commit();

    let all = factory.create_query(TermQuery::new("name", "emmanuel"));
    assert_eq!(all.result_size().unwrap(), 2);

    let employees = factory
        .create_query(TermQuery::new("name", "emmanuel"))
        .restrict_to("Employee");
    let refs = employees.list().unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].type_name, "Employee");

    // delete one type's instance; the other with the same id survives
    let transaction = TestTransaction::begin();
    listener
        .on_post_delete(
            Arc::new(Employee {
                id: 1,
                name: "Emmanuel".into(),
            }),
            &transaction,
        )
        .unwrap();
    transaction.commit();

    let refs = factory
        .create_query(TermQuery::new("name", "emmanuel"))
        .list()
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].type_name, "Employer");
}
