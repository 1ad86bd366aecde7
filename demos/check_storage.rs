//! Demo: Check R2 Storage Connection
//!
//! Uploads a small file the same way staged variants are persisted, mints a
//! presigned URL for it, reads it back, and deletes it.
//!
//! Usage:
//!   cargo run --example check_storage
//!
//! Prerequisites:
//!   - .env file with R2 credentials (R2_BUCKET, R2_ENDPOINT, R2_ACCESS_KEY, R2_SECRET_KEY)

use std::env;
use std::time::Duration;
use twin_staging::services::storage::{ObjectStore, R2Client};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let bucket = env::var("R2_BUCKET").expect("R2_BUCKET not set");
    let endpoint = env::var("R2_ENDPOINT").expect("R2_ENDPOINT not set");
    let access_key = env::var("R2_ACCESS_KEY").expect("R2_ACCESS_KEY not set");
    let secret_key = env::var("R2_SECRET_KEY").expect("R2_SECRET_KEY not set");

    println!("Bucket:     {}", bucket);
    println!("Endpoint:   {}", endpoint);
    println!("Access Key: {}***", &access_key[..8.min(access_key.len())]);

    let client = R2Client::new(&bucket, &endpoint, &access_key, &secret_key)?;

    let content = b"twin-staging storage check";
    let path = client
        .upload("connection-check", "", "check.txt", content, "text/plain")
        .await?;
    println!("Uploaded   {} ({} bytes)", path, content.len());

    let presigned = client.presigned_url(&path, Duration::from_secs(60)).await?;
    println!("Presigned  {} (valid {}s)", presigned.url, presigned.expires_in.as_secs());

    let via_url = reqwest::get(&presigned.url).await?.bytes().await?;
    if via_url.as_ref() != content {
        return Err("Presigned URL returned different content".into());
    }

    let downloaded = client.download(&path).await?;
    if downloaded != content {
        return Err("Downloaded content doesn't match uploaded content".into());
    }

    client.delete(&path).await?;
    println!("Deleted    {}", path);
    println!("Storage is configured correctly.");

    Ok(())
}
