//! Benchmark utilities.

use entikv_core::{Database, Entity, Schema};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// First names entities are spread over; one index set each.
pub const FNAMES: [&str; 8] = ["Ann", "Bob", "Cid", "Dee", "Eve", "Fay", "Gus", "Hal"];

/// The benchmarked model: unique `email`, indexed `fname` and `city`,
/// counter `score`.
pub fn person_schema() -> Arc<Schema> {
    Schema::builder("Person")
        .attribute("email")
        .attribute("fname")
        .attribute("city")
        .counter("score")
        .unique("email")
        .index("fname")
        .index("city")
        .build()
        .expect("benchmark schema is valid")
}

/// Opens an in-memory database with the model registered.
pub fn open() -> (Database, Arc<Schema>) {
    let db = Database::in_memory();
    let schema = db.register(person_schema()).expect("register Person");
    (db, schema)
}

/// Generates attributes for the `n`-th person.
pub fn person_row(n: usize, rng: &mut impl Rng) -> [(&'static str, String); 3] {
    let fname = FNAMES.choose(rng).copied().unwrap_or("Ann");
    let city = if rng.gen_bool(0.5) { "north" } else { "south" };
    [
        ("email", format!("p{n}@bench.io")),
        ("fname", fname.to_string()),
        ("city", city.to_string()),
    ]
}

/// Saves `count` people with random names and cities and random scores.
pub fn populate(db: &Database, schema: &Arc<Schema>, count: usize) -> Vec<Entity> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|n| {
            let person = Entity::create(db, Arc::clone(schema), person_row(n, &mut rng))
                .expect("create person");
            person
                .incr(db, "score", rng.gen_range(0..1000))
                .expect("score person");
            person
        })
        .collect()
}
