//! Streaming a run's text output as it arrives.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cargo run --example agent_streaming
//! ```

#![allow(clippy::print_stdout)]

use std::io::{Write, stdout};
use std::time::Duration;

use machi::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let agent = Agent::builder("poet")
        .instructions("You are a creative poet. Write vivid, expressive poetry.")
        .model("gpt-4o-mini")
        .build()?;

    let config = ApiConfig::from_env()?;
    let mut handle = stream(agent, "Write a haiku about Rust.", config, RunOptions::default());

    while let Some(event) = handle.next(Duration::from_secs(30)).await {
        if let Event::TextDelta { text, .. } = event {
            print!("{text}");
            stdout().flush().ok();
        }
    }

    let result = handle.join().await?;
    println!("\n\ndone, usage: {}", result.usage);

    Ok(())
}
