//! Load tests against a running server. Start one with `cargo run` and run
//! `cargo test --test perf -- --ignored --nocapture`.

use serde_json::{json, Value};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const NUM_USERS: usize = 100;
const TWEETS_PER_USER: usize = 2;
const LOADED_USER_EMAIL: &str = "bob@example.com";
const LOADED_USER_NAME: &str = "bob";
const LOADED_USER_PASSWORD: &str = "bobbob";
const LOADED_USER_TWEETS: usize = 50;

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

async fn signup(client: &reqwest::Client, username: &str, email: &str, password: &str) -> Option<(String, String)> {
    let resp = client
        .post(format!("{}/signup", base_url()))
        .json(&json!({ "username": username, "email": email, "password": password }))
        .send()
        .await
        .ok()?;
    if resp.status() != 201 {
        return None;
    }
    let body = resp.json::<Value>().await.ok()?;
    Some((body["userID"].as_str()?.to_string(), body["token"].as_str()?.to_string()))
}

async fn login(client: &reqwest::Client, email: &str, password: &str) -> Option<(String, String)> {
    let resp = client
        .post(format!("{}/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .ok()?;
    if resp.status() != 200 {
        return None;
    }
    let body = resp.json::<Value>().await.ok()?;
    Some((body["userID"].as_str()?.to_string(), body["token"].as_str()?.to_string()))
}

async fn tweet(client: &reqwest::Client, token: &str, content: String) -> bool {
    client
        .post(format!("{}/tweets", base_url()))
        .header("authorization", format!("Bearer {}", token))
        .json(&json!({ "content": content }))
        .send()
        .await
        .is_ok_and(|resp| resp.status() == 201)
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn perf_test_users_with_tweets() {
    let client = reqwest::Client::new();
    let start = Instant::now();

    println!("\n=== Performance Test ===");
    println!("Creating {} users with {} tweets each...", NUM_USERS, TWEETS_PER_USER);

    let user_creation_start = Instant::now();
    let mut accounts = Vec::new();
    for i in 0..NUM_USERS {
        let tag = &uuid::Uuid::new_v4().to_string()[0..8];
        let username = format!("perf_user_{}_{}", i, tag);
        let email = format!("{}@example.com", username);
        if let Some(account) = signup(&client, &username, &email, "password123").await {
            accounts.push(account);
        }
    }
    let user_creation_time = user_creation_start.elapsed();

    println!(
        "User creation done: {} users in {:.2}s ({:.2} users/sec)",
        accounts.len(),
        user_creation_time.as_secs_f64(),
        accounts.len() as f64 / user_creation_time.as_secs_f64()
    );

    // Everyone follows the previous user so timelines have two authors.
    let follow_start = Instant::now();
    let mut follows = 0;
    for pair in accounts.windows(2) {
        let (target_id, _) = &pair[0];
        let (_, token) = &pair[1];
        let resp = client
            .put(format!("{}/users/{}/follow", base_url(), target_id))
            .header("authorization", format!("Bearer {}", token))
            .send()
            .await;
        if resp.is_ok_and(|r| r.status() == 200) {
            follows += 1;
        }
    }
    let follow_time = follow_start.elapsed();

    let tweet_start = Instant::now();
    let mut tweets_created = 0;
    let mut tweets_failed = 0;
    for (idx, (_, token)) in accounts.iter().enumerate() {
        for n in 0..TWEETS_PER_USER {
            if tweet(&client, token, format!("Tweet {} from user {}", n + 1, idx)).await {
                tweets_created += 1;
            } else {
                tweets_failed += 1;
            }
        }
    }
    let tweet_time = tweet_start.elapsed();

    let timeline_start = Instant::now();
    for (_, token) in &accounts {
        let _ = client
            .get(format!("{}/tweets?limit=20", base_url()))
            .header("authorization", format!("Bearer {}", token))
            .send()
            .await;
    }
    let timeline_time = timeline_start.elapsed();

    let total_time = start.elapsed();
    let total_requests = accounts.len() * 2 + follows + tweets_created + tweets_failed;

    println!("\n=== Results ===");
    println!("Total time: {:.2}s", total_time.as_secs_f64());
    println!("User creation: {:.2}s", user_creation_time.as_secs_f64());
    println!("Follows: {} in {:.2}s", follows, follow_time.as_secs_f64());
    println!("Tweet creation: {:.2}s", tweet_time.as_secs_f64());
    println!("Timeline reads: {:.2}s", timeline_time.as_secs_f64());
    println!("Tweets created: {}", tweets_created);
    println!("Tweets failed: {}", tweets_failed);
    println!("Total requests: {}", total_requests);
    println!(
        "Avg time per request: {:.2}ms",
        (total_time.as_secs_f64() * 1000.0) / total_requests as f64
    );
}

#[ignore]
#[tokio::test(flavor = "multi_thread")]
async fn perf_test_page_through_large_feed() {
    let client = reqwest::Client::new();
    let start = Instant::now();

    println!("\n=== Large Feed Performance Test ===");

    let account = match login(&client, LOADED_USER_EMAIL, LOADED_USER_PASSWORD).await {
        Some(account) => {
            println!("User '{}' already exists, skipping creation", LOADED_USER_NAME);
            Some(account)
        }
        None => signup(&client, LOADED_USER_NAME, LOADED_USER_EMAIL, LOADED_USER_PASSWORD).await,
    };
    let Some((user_id, token)) = account else {
        println!("Failed to login or create user");
        return;
    };

    let tweet_start = Instant::now();
    let mut tweets_created = 0;
    for n in 0..LOADED_USER_TWEETS {
        if tweet(&client, &token, format!("Tweet {} - load test", n + 1)).await {
            tweets_created += 1;
        }
    }
    let tweet_time = tweet_start.elapsed();

    let paging_start = Instant::now();
    let mut pages = 0;
    let mut offset = 0;
    loop {
        let resp = client
            .get(format!("{}/users/{}/tweets?limit=20&offset={}", base_url(), user_id, offset))
            .send()
            .await;
        let Ok(resp) = resp else { break };
        let Ok(body) = resp.json::<Value>().await else { break };
        pages += 1;
        if body["moreResults"] != true {
            break;
        }
        offset += 20;
    }
    let paging_time = paging_start.elapsed();

    println!("\n=== Results ===");
    println!("Total time: {:.2}s", start.elapsed().as_secs_f64());
    println!("Tweet creation: {:.2}s ({} tweets)", tweet_time.as_secs_f64(), tweets_created);
    println!("Paged {} pages in {:.2}ms", pages, paging_time.as_millis());
}
