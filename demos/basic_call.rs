//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with retries and a timeout
//! - Make GET requests and decode JSON bodies
//! - Make POST requests with a JSON body
//! - Read latency and attempt counts from the response
//!
//! Run with: `cargo run --example basic_call`

use rampart::logging::TracingLogger;
use rampart::{Client, Error, Request};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("rampart=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .timeout(Duration::from_secs(5))
        .max_retries(3)
        .retry_wait(Duration::from_millis(100), Duration::from_secs(2))
        .default_header("User-Agent", "rampart-basic-call")?
        .logger(Arc::new(TracingLogger))
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get("/posts/1").await?;
    let post: Post = response.json()?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Request latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!();

    println!("=== GET With Query Parameters ===");
    let request = Request::new(http::Method::GET, "/posts").with_query_param("userId", "1");
    let posts: Vec<Post> = client.send(request).await?.json()?;
    println!("User 1 has {} posts", posts.len());
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let response = client.post_json("/posts", &new_post).await?;
    let created: Post = response.json()?;

    println!("Created post with ID: {}", created.id);
    println!("Status code: {}", response.status);
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
