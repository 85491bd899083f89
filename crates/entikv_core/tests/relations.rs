//! References, declared sets and reverse collections.

use entikv_core::{Collection, CoreError, Database, Entity, Schema};
use entikv_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn reference_resolves_and_follows_changes() {
    let db = TestDatabase::memory();
    let Samples { users, posts } = register_samples(&db);
    let ann = create_user(&db, &users, "ann@x.io", "Ann");
    let bob = create_user(&db, &users, "bob@x.io", "Bob");
    let post = create_post(&db, &posts, &ann, "hello", "live");

    let mut loaded = db.fetch(&posts, post.id().unwrap()).unwrap().unwrap();
    assert_eq!(loaded.attr("author_id"), Some("1"));
    assert_eq!(loaded.reference(&db, "author").unwrap(), Some(&ann));

    loaded.set_attr("author_id", "2").unwrap();
    assert_eq!(loaded.reference(&db, "author").unwrap(), Some(&bob));

    loaded.remove_attr("author_id").unwrap();
    assert_eq!(loaded.reference(&db, "author").unwrap(), None);
}

#[test]
fn dangling_reference_reads_as_none() {
    let db = TestDatabase::memory();
    let Samples { users, posts } = register_samples(&db);
    let mut ann = create_user(&db, &users, "ann@x.io", "Ann");
    let mut post = create_post(&db, &posts, &ann, "hello", "live");
    ann.delete(&db).unwrap();

    let mut fresh = db.fetch(&posts, post.id().unwrap()).unwrap().unwrap();
    assert_eq!(fresh.reference(&db, "author").unwrap(), None);
    // A cached target is kept until the reference attribute changes.
    assert_eq!(post.reference(&db, "author").unwrap().map(|a| a.attr("fname")), Some(Some("Ann")));
    post.set_attr("author_id", "1").unwrap();
    assert!(post.reference(&db, "author").unwrap().is_some());
    post.remove_attr("author_id").unwrap();
    post.set_attr("author_id", "1").unwrap();
    assert_eq!(post.reference(&db, "author").unwrap(), None);
}

#[test]
fn set_reference_checks_the_target() {
    let db = TestDatabase::memory();
    let Samples { users, posts } = register_samples(&db);
    let ann = create_user(&db, &users, "ann@x.io", "Ann");
    let other = create_post(&db, &posts, &ann, "x", "live");
    let draft = Entity::new(Arc::clone(&users), [("email", "d@x.io")]).unwrap();

    let mut post = Entity::new(Arc::clone(&posts), [("title", "t")]).unwrap();
    assert!(matches!(
        post.set_reference("author", &other).unwrap_err(),
        CoreError::InvalidOperation { .. }
    ));
    assert!(matches!(
        post.set_reference("author", &draft).unwrap_err(),
        CoreError::MissingId { .. }
    ));
    assert!(matches!(
        post.set_reference("title", &ann).unwrap_err(),
        CoreError::UnknownField { .. }
    ));
}

#[test]
fn reverse_collection_finds_referencing_instances() {
    let db = TestDatabase::memory();
    let Samples { users, posts } = register_samples(&db);
    let ann = create_user(&db, &users, "ann@x.io", "Ann");
    let bob = create_user(&db, &users, "bob@x.io", "Bob");
    let p1 = create_post(&db, &posts, &ann, "one", "live");
    let p2 = create_post(&db, &posts, &ann, "two", "draft");
    create_post(&db, &posts, &bob, "three", "live");

    let anns = ann.collection(&db, "posts").unwrap();
    let mut got = anns.fetch_all().unwrap();
    got.sort_by(|a, b| a.id().unwrap().cmp(b.id().unwrap()));
    assert_eq!(got, vec![p1.clone(), p2]);

    let live = anns.find([("status", "live")]).unwrap();
    assert_eq!(live.fetch_all().unwrap(), vec![p1]);

    let draft = Entity::new(Arc::clone(&users), [("email", "d@x.io")]).unwrap();
    assert!(matches!(draft.collection(&db, "posts").unwrap_err(), CoreError::MissingId { .. }));
}

#[test]
fn declared_sets_hold_members() {
    let db = TestDatabase::memory();
    let users = register_samples(&db).users;
    let ann = create_user(&db, &users, "ann@x.io", "Ann");
    let bob = create_user(&db, &users, "bob@x.io", "Bob");
    let cid = create_user(&db, &users, "cid@x.io", "Cid");

    let friends = ann.members(&db, "friends").unwrap();
    assert_eq!(friends.key().as_str(), "User:1:friends");
    friends.add(&bob).unwrap();
    friends.add(&cid).unwrap();
    assert_eq!(friends.size().unwrap(), 2);
    assert_eq!(friends.find([("fname", "Cid")]).unwrap().fetch_all().unwrap(), vec![cid.clone()]);

    friends.delete(&bob).unwrap();
    assert_eq!(friends.fetch_all().unwrap(), vec![cid]);

    friends.replace(&[bob.clone()]).unwrap();
    assert_eq!(friends.fetch_all().unwrap(), vec![bob]);

    assert!(matches!(
        ann.members(&db, "fname").unwrap_err(),
        CoreError::UnknownField { .. }
    ));
}

#[test]
fn unregistered_target_model_is_reported() {
    let db = Database::in_memory();
    let lonely = db
        .register(
            Schema::builder("Comment")
                .attribute("body")
                .reference("post", "Post")
                .build()
                .unwrap(),
        )
        .unwrap();
    let mut comment = Entity::create(&db, lonely, [("body", "hi"), ("post_id", "1")]).unwrap();
    assert!(matches!(
        comment.reference(&db, "post").unwrap_err(),
        CoreError::ModelNotFound { .. }
    ));
}
