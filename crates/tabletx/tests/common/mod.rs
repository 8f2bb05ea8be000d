//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use tabletx::schema::{AttributeType, ObjectShape, Table, TableDefinition};
use tabletx::storage::inmemory::{InMemoryStore, InMemoryStoreBuilder};
use tabletx::{Client, Item};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn item(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub name: String,
    pub content: String,
    pub num_comments: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub blog_post_id: String,
    pub id: String,
    pub content: String,
}

pub fn blog_posts() -> Table<BlogPost> {
    let shape = ObjectShape::new()
        .required("id", AttributeType::String)
        .required("name", AttributeType::String)
        .required("content", AttributeType::String)
        .required("numComments", AttributeType::Integer);
    Table::new(
        TableDefinition::builder("BlogPosts", shape, "id")
            .build()
            .expect("valid table"),
    )
}

pub fn comments() -> Table<Comment> {
    let shape = ObjectShape::new()
        .required("blogPostId", AttributeType::String)
        .required("id", AttributeType::String)
        .required("content", AttributeType::String);
    Table::new(
        TableDefinition::builder("Comments", shape, "blogPostId")
            .sort_key("id")
            .build()
            .expect("valid table"),
    )
}

pub fn post(id: &str, num_comments: u32) -> BlogPost {
    BlogPost {
        id: id.to_string(),
        name: format!("Post {id}"),
        content: "Hello world".to_string(),
        num_comments,
    }
}

pub fn comment(blog_post_id: &str, id: &str) -> Comment {
    Comment {
        blog_post_id: blog_post_id.to_string(),
        id: id.to_string(),
        content: format!("Comment {id}"),
    }
}

/// A blog with both tables created in an in-memory store.
pub struct Blog {
    pub posts: Table<BlogPost>,
    pub comments: Table<Comment>,
    pub store: Arc<InMemoryStore>,
    pub client: Client,
}

impl Blog {
    pub fn new() -> Self {
        Self::with_store(|builder| builder)
    }

    pub fn with_store(configure: impl FnOnce(InMemoryStoreBuilder) -> InMemoryStoreBuilder) -> Self {
        init_tracing();
        let posts = blog_posts();
        let comments = comments();
        let builder = InMemoryStore::builder().table(&posts).table(&comments);
        let store = Arc::new(configure(builder).build());
        let client = Client::new(store.clone());
        Self {
            posts,
            comments,
            store,
            client,
        }
    }

    /// Another client sharing the same store.
    pub fn second_client(&self) -> Client {
        Client::new(self.store.clone())
    }

    /// Stores a blog post at `version` without going through a client.
    pub async fn seed_post(&self, post: &BlogPost, version: u64) {
        let mut raw = item(serde_json::to_value(post).expect("serializable"));
        raw.insert("version".to_string(), Value::from(version));
        self.store.put_raw("BlogPosts", raw).await.expect("seeded");
    }

    pub async fn seed_comment(&self, comment: &Comment, version: u64) {
        let mut raw = item(serde_json::to_value(comment).expect("serializable"));
        raw.insert("version".to_string(), Value::from(version));
        self.store.put_raw("Comments", raw).await.expect("seeded");
    }
}
