mod common;

use serde_json::json;

use tabletx::{Client, ClientOptions, Error, Key};

use common::{item, post, Blog};

#[derive(Debug, thiserror::Error)]
#[error("no such post")]
struct NoSuchPost;

fn key(id: &str) -> Key {
    Key::new().with("id", id)
}

fn post_id(n: usize) -> String {
    format!("post-{n:03}")
}

/// Seeds posts 0..150 except the given ones.
async fn seed_posts(blog: &Blog, skip: &[usize]) {
    for n in (0..150).filter(|n| !skip.contains(n)) {
        blog.seed_post(&post(&post_id(n), n as u32), 0).await;
    }
}

#[tokio::test]
async fn test_get_item_not_found() {
    let blog = Blog::new();

    let error = blog.client.get_item(&blog.posts, key("nope")).send().await.unwrap_err();
    match error {
        Error::ItemNotFound { keys } => assert_eq!(keys, vec![key("nope")]),
        other => panic!("unexpected error: {other:?}"),
    }

    let absent = blog
        .client
        .get_item(&blog.posts, key("nope"))
        .send_optional()
        .await
        .unwrap();
    assert!(absent.is_none());

    let error = blog
        .client
        .get_item(&blog.posts, key("nope"))
        .map_not_found(|_| Error::custom(NoSuchPost))
        .send()
        .await
        .unwrap_err();
    assert!(error.downcast_custom::<NoSuchPost>().is_some());
}

#[tokio::test]
async fn test_stored_item_without_version_fails_closed() {
    let blog = Blog::new();
    blog.store
        .put_raw(
            "BlogPosts",
            item(json!({"id": "p", "name": "n", "content": "c", "numComments": 0})),
        )
        .await
        .unwrap();

    let error = blog.client.get_item(&blog.posts, key("p")).send().await.unwrap_err();
    assert!(matches!(error, Error::ItemWithoutVersion { .. }));
}

#[tokio::test]
async fn test_stored_item_with_wrong_shape_fails() {
    let blog = Blog::new();
    blog.store
        .put_raw(
            "BlogPosts",
            item(json!({"id": "p", "name": "n", "content": "c", "numComments": "x", "version": 0})),
        )
        .await
        .unwrap();

    let error = blog.client.get_item(&blog.posts, key("p")).send().await.unwrap_err();
    assert!(matches!(error, Error::ShapeValidation(_)));
}

#[tokio::test]
async fn test_batch_reports_exactly_the_missing_keys() {
    let blog = Blog::new();
    seed_posts(&blog, &[17, 120]).await;
    let keys: Vec<Key> = (0..150).map(|n| key(&post_id(n))).collect();

    let error = blog
        .client
        .get_items(&blog.posts, keys.clone())
        .send()
        .await
        .unwrap_err();
    match error {
        Error::ItemNotFound { keys: missing } => {
            assert_eq!(missing, vec![key("post-017"), key("post-120")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(blog.store.calls().batch_get_items, 2);
}

#[tokio::test]
async fn test_batch_omitting_missing_keeps_request_order() {
    let blog = Blog::new();
    seed_posts(&blog, &[17, 120]).await;
    let keys: Vec<Key> = (0..150).rev().map(|n| key(&post_id(n))).collect();

    let found = blog
        .client
        .get_items(&blog.posts, keys)
        .omit_missing()
        .send()
        .await
        .unwrap();

    let expected: Vec<String> = (0..150)
        .rev()
        .filter(|n| *n != 17 && *n != 120)
        .map(post_id)
        .collect();
    let ids: Vec<String> = found.iter().map(|p| p.id.clone()).collect();
    assert_eq!(found.len(), 148);
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_batch_not_found_override() {
    let blog = Blog::new();
    seed_posts(&blog, &[3]).await;

    let error = blog
        .client
        .get_items(&blog.posts, vec![key("post-002"), key("post-003")])
        .map_not_found(|_| Error::custom(NoSuchPost))
        .send()
        .await
        .unwrap_err();
    assert!(error.downcast_custom::<NoSuchPost>().is_some());
}

#[tokio::test]
async fn test_batch_deduplicates_requested_keys() {
    let blog = Blog::new();
    seed_posts(&blog, &[]).await;

    let found = blog
        .client
        .get_items(
            &blog.posts,
            vec![key("post-001"), key("post-002"), key("post-001")],
        )
        .send()
        .await
        .unwrap();

    let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["post-001", "post-002", "post-001"]);
    assert_eq!(blog.store.calls().batch_get_items, 1);
}

#[tokio::test]
async fn test_empty_batch_makes_no_call() {
    let blog = Blog::new();
    let found = blog.client.get_items(&blog.posts, Vec::new()).send().await.unwrap();
    assert!(found.is_empty());
    assert_eq!(blog.store.calls().total(), 0);
}

#[tokio::test]
async fn test_unprocessed_keys_are_retried() {
    let blog = Blog::with_store(|builder| builder.batch_get_limit(40));
    seed_posts(&blog, &[]).await;
    let keys: Vec<Key> = (0..100).map(|n| key(&post_id(n))).collect();

    let found = blog.client.get_items(&blog.posts, keys).send().await.unwrap();

    assert_eq!(found.len(), 100);
    assert_eq!(found[99].id, "post-099");
    // 100 keys, 40 processed per call.
    assert_eq!(blog.store.calls().batch_get_items, 3);
}

#[tokio::test]
async fn test_no_progress_is_an_unprocessed_keys_error() {
    let blog = Blog::with_store(|builder| builder.batch_get_limit(0));
    seed_posts(&blog, &[]).await;
    let keys = vec![key("post-001"), key("post-002")];

    let error = blog
        .client
        .get_items(&blog.posts, keys.clone())
        .map_not_found(|_| Error::custom(NoSuchPost))
        .send()
        .await
        .unwrap_err();

    match error {
        Error::UnprocessedKeys { keys: unprocessed } => assert_eq!(unprocessed, keys),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(blog.store.calls().batch_get_items, 1);
}

#[tokio::test]
async fn test_chunk_size_comes_from_options() {
    let blog = Blog::new();
    seed_posts(&blog, &[]).await;
    let client = Client::with_options(
        blog.store.clone(),
        ClientOptions {
            batch_get_chunk_size: 25,
        },
    );
    let keys: Vec<Key> = (0..60).map(|n| key(&post_id(n))).collect();

    let found = client.get_items(&blog.posts, keys).send().await.unwrap();

    assert_eq!(found.len(), 60);
    assert_eq!(blog.store.calls().batch_get_items, 3);
}
