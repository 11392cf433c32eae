//! Basic agent run: a single agent, no tools, no handoffs.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cargo run --example agent_basic
//! ```

#![allow(clippy::print_stdout)]

use machi::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let agent = Agent::builder("assistant")
        .instructions("You are a helpful assistant. Keep answers concise.")
        .model("gpt-4o-mini")
        .build()?;

    let config = ApiConfig::from_env()?;
    let result = run(agent, "What is the capital of France?", config, RunOptions::default()).await?;
    println!("{}", result.output);

    Ok(())
}
