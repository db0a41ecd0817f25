//! Benchmark utilities.

use contentmirror_core::Record;
use contentmirror_testkit::{entry, link_to};
use rand::Rng;
use serde_json::json;

/// Generate `authors` authors and `posts` posts linking to random authors.
pub fn blog_corpus(authors: usize, posts: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let authors = authors.max(1);
    let mut records: Vec<Record> = (0..authors)
        .map(|i| entry(&format!("au{i}"), "author", json!({ "name": format!("Author {i}") })))
        .collect();
    records.extend((0..posts).map(|i| {
        let author = rng.gen_range(0..authors);
        entry(
            &format!("p{i}"),
            "post",
            json!({
                "title": format!("Post {i}"),
                "slug": format!("/post-{i}"),
                "views": rng.gen_range(0..10_000),
                "featured": rng.gen_bool(0.1),
                "author": link_to(&format!("au{author}")),
            }),
        )
    }));
    records
}

/// Generate `count` revisions of entries spread over `ids` records, in random order.
pub fn shuffled_revisions(ids: usize, count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let ids = ids.max(1);
    (0..count)
        .map(|_| {
            let id = rng.gen_range(0..ids);
            let revision = rng.gen_range(1..100u64);
            entry(&format!("r{id}"), "doc", json!({ "rev": revision })).with_revision(revision)
        })
        .collect()
}
