use std::thread;

use warble::core::db::{self, DbError, UniqueField};
use warble::core::store::{FileStore, JsonStore, KvStore, MemoryStore};
use warble::models::models::{Tweet, User};

#[test]
fn memory_store_clones_share_state() {
    let store = MemoryStore::new();
    let clone = store.clone();

    store.set("user:1", b"alice").unwrap();
    assert_eq!(clone.get("user:1").unwrap(), Some(b"alice".to_vec()));

    clone.delete("user:1").unwrap();
    assert!(store.get("user:1").unwrap().is_none());
    assert!(store.is_empty());
}

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    assert!(store.get("tweets:abc").unwrap().is_none());
    store.set("tweets:abc", b"[\"1\"]").unwrap();
    assert_eq!(store.get("tweets:abc").unwrap(), Some(b"[\"1\"]".to_vec()));

    store.set("tweets:abc", b"[]").unwrap();
    assert_eq!(store.get("tweets:abc").unwrap(), Some(b"[]".to_vec()));

    store.delete("tweets:abc").unwrap();
    store.delete("tweets:abc").unwrap();
    assert!(store.get("tweets:abc").unwrap().is_none());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user = User::new("alice".into(), "alice@example.com".into(), "hash".into());

    {
        let store = FileStore::open(dir.path().join("data")).unwrap();
        db::insert_user(&store, &user).unwrap();
    }

    let store = FileStore::open(dir.path().join("data")).unwrap();
    let found = db::find_user_by_email(&store, "alice@example.com").unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.username, "alice");
}

#[test]
fn corrupt_documents_are_errors() {
    let store = MemoryStore::new();
    store.set("user:broken", b"{not json").unwrap();

    let err = store.get_json::<User>("user:broken").unwrap_err();
    assert!(err.to_string().contains("user:broken"));
}

#[test]
fn concurrent_signups_on_shared_clones_are_all_findable() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 50;
    let store = MemoryStore::new();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let store = store.clone();
            scope.spawn(move || {
                for n in 0..PER_THREAD {
                    let name = format!("user_{t}_{n}");
                    let user = User::new(name.clone(), format!("{name}@example.com"), "hash".to_string());
                    db::insert_user(&store, &user).unwrap();
                }
            });
        }
    });

    for t in 0..THREADS {
        for n in 0..PER_THREAD {
            let name = format!("user_{t}_{n}");
            let by_email = db::find_user_by_email(&store, &format!("{name}@example.com")).unwrap();
            let by_name = db::find_user_by_username(&store, &name).unwrap();
            assert_eq!(by_email.map(|u| u.id), by_name.map(|u| u.id), "{name} lost");
        }
    }
}

#[test]
fn concurrent_duplicate_signups_admit_exactly_one() {
    let store = MemoryStore::new();

    let results: Vec<Result<(), DbError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                scope.spawn(move || {
                    let user = User::new(format!("racer{n}"), "same@example.com".to_string(), "hash".to_string());
                    db::insert_user(&store, &user)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(DbError::Taken(UniqueField::Email))));
    }

    // Losers released their usernames again.
    let winner = db::find_user_by_email(&store, "same@example.com").unwrap().unwrap();
    for n in 0..8 {
        let name = format!("racer{n}");
        let found = db::find_user_by_username(&store, &name).unwrap();
        assert_eq!(found.is_some(), name == winner.username, "{name}");
    }
}

#[test]
fn taken_username_releases_the_claimed_email() {
    let store = MemoryStore::new();
    let first = User::new("dup".into(), "first@example.com".into(), "hash".into());
    db::insert_user(&store, &first).unwrap();

    let second = User::new("dup".into(), "second@example.com".into(), "hash".into());
    assert!(matches!(
        db::insert_user(&store, &second),
        Err(DbError::Taken(UniqueField::Username))
    ));

    let third = User::new("third".into(), "second@example.com".into(), "hash".into());
    db::insert_user(&store, &third).unwrap();
}

#[test]
fn concurrent_tweets_keep_the_author_index_complete() {
    let store = MemoryStore::new();
    let author = User::new("busy".into(), "busy@example.com".into(), "hash".into());
    db::insert_user(&store, &author).unwrap();

    let mut ids: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                let author_id = author.id.clone();
                scope.spawn(move || {
                    (0..25)
                        .map(|n| {
                            let tweet = Tweet::new(author_id.clone(), format!("tweet {t}-{n}"));
                            db::insert_tweet(&store, &tweet).unwrap();
                            tweet.id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });

    let mut indexed = db::author_tweet_ids(&store, &author.id).unwrap();
    ids.sort();
    indexed.sort();
    assert_eq!(indexed, ids);
}

#[test]
fn file_store_updates_are_serialised_across_clones() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    thread::scope(|scope| {
        for _ in 0..8 {
            let store = store.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    store
                        .update_json("counter", |n: Option<u64>| (Some(n.unwrap_or(0) + 1), ()))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(store.get_json::<u64>("counter").unwrap(), Some(160));
}

#[test]
fn update_returning_none_deletes() {
    let store = MemoryStore::new();
    store.set_json("k", &1u32).unwrap();

    let previous = store.update_json("k", |n: Option<u32>| (None, n)).unwrap();
    assert_eq!(previous, Some(1));
    assert!(store.get("k").unwrap().is_none());
}
