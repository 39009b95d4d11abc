//! Query result surfaces: list, iterator, scrollable cursor, result size,
//! type restriction, and loading hits back into live entities.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use quiver::config::Settings;
use quiver::engine::{EntityDescriptorBuilder, EntityHandle, EntityId};
use quiver::event::IndexingEventListener;
use quiver::factory::SearchFactory;
use quiver::query::{EntityLoader, EntityRef, TermQuery};
use support::TestTransaction;

struct Clock {
    id: i64,
    brand: String,
}

struct Book {
    id: i64,
    title: String,
}

fn factory() -> SearchFactory {
    let clock = EntityDescriptorBuilder::<Clock>::new("Clock", "clocks")
        .id_i64("id", |c| c.id)
        .text("brand", |c| Some(c.brand.as_str().into()))
        .build()
        .unwrap();
    let book = EntityDescriptorBuilder::<Book>::new("Book", "books")
        .id_i64("id", |b| b.id)
        .text("title", |b| Some(b.title.as_str().into()))
        .build()
        .unwrap();
    SearchFactory::builder()
        .settings(Settings::new().with("quiver.default.directory_provider", "ram"))
        .register(clock)
        .register(book)
        .build()
        .unwrap()
}

fn populate(factory: &SearchFactory) {
    let listener = IndexingEventListener::new(factory);
    let transaction = TestTransaction::begin();
    for (id, brand) in [(1, "Seiko swing"), (2, "Festina swing"), (3, "Omega still")] {
        listener
            .on_post_insert(
                Arc::new(Clock {
                    id,
                    brand: brand.to_string(),
                }),
                &transaction,
            )
            .unwrap();
    }
    listener
        .on_post_insert(
            Arc::new(Book {
                id: 1,
                title: "A swing of the pendulum".to_string(),
            }),
            &transaction,
        )
        .unwrap();
    transaction.commit();
}

#[test]
fn list_returns_every_matching_type() {
    let factory = factory();
    populate(&factory);

    let refs = factory
        .create_query(TermQuery::new("brand", "swing"))
        .list()
        .unwrap();
    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|r| r.type_name == "Clock"));
}

#[test]
fn restriction_narrows_the_searched_types() {
    let factory = factory();
    populate(&factory);

    // "swing" exists in both indexes under different fields; an unfiltered
    // brand query still only hits clocks
    let clocks = factory
        .create_query(TermQuery::new("brand", "swing"))
        .restrict_to("Clock")
        .result_size()
        .unwrap();
    assert_eq!(clocks, 2);

    let books = factory
        .create_query(TermQuery::new("brand", "swing"))
        .restrict_to("Book")
        .result_size()
        .unwrap();
    assert_eq!(books, 0);

    let unknown = factory
        .create_query(TermQuery::new("brand", "swing"))
        .restrict_to("Invoice")
        .result_size();
    assert!(unknown.is_err());
}

#[test]
fn iterator_walks_every_hit() {
    let factory = factory();
    populate(&factory);

    let iter = factory
        .create_query(TermQuery::new("brand", "swing"))
        .iter()
        .unwrap();
    assert_eq!(iter.len(), 2);
    let ids: Vec<EntityId> = iter.map(|r| r.id).collect();
    assert!(ids.contains(&EntityId::Int(1)));
    assert!(ids.contains(&EntityId::Int(2)));
}

#[test]
fn scroll_moves_in_both_directions() {
    let factory = factory();
    populate(&factory);

    let mut scroll = factory
        .create_query(TermQuery::new("brand", "swing"))
        .scroll()
        .unwrap();
    assert_eq!(scroll.len(), 2);
    assert!(scroll.get().is_none());

    assert!(scroll.next());
    let first = scroll.get().unwrap().clone();
    assert!(scroll.next());
    assert!(!scroll.next());

    assert!(scroll.first());
    assert_eq!(scroll.get().unwrap(), &first);
}

#[test]
fn loader_resolves_hits_and_drops_stale_ones() {
    let factory = factory();
    populate(&factory);

    struct MapLoader {
        clocks: HashMap<i64, Arc<Clock>>,
    }

    impl EntityLoader for MapLoader {
        fn load(&self, reference: &EntityRef) -> Option<EntityHandle> {
            match reference.id {
                EntityId::Int(id) => self
                    .clocks
                    .get(&id)
                    .map(|clock| clock.clone() as EntityHandle),
                _ => None,
            }
        }
    }

    // the store only knows clock 1; clock 2 is a stale hit
    let loader = MapLoader {
        clocks: HashMap::from([(
            1,
            Arc::new(Clock {
                id: 1,
                brand: "Seiko swing".to_string(),
            }),
        )]),
    };

    let entities = factory
        .create_query(TermQuery::new("brand", "swing"))
        .list_with(&loader)
        .unwrap();
    assert_eq!(entities.len(), 1);
    let clock = entities[0].downcast_ref::<Clock>().unwrap();
    assert_eq!(clock.id, 1);
}

#[test]
fn no_hits_yield_empty_surfaces() {
    let factory = factory();
    populate(&factory);

    let query = factory.create_query(TermQuery::new("brand", "cuckoo"));
    assert_eq!(query.result_size().unwrap(), 0);
    assert!(query.list().unwrap().is_empty());
    assert!(query.iter().unwrap().next().is_none());
    let mut scroll = query.scroll().unwrap();
    assert!(!scroll.next());
}
