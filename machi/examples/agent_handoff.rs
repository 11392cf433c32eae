//! A triage agent that hands off to a specialist agent.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cargo run --example agent_handoff
//! ```

#![allow(clippy::print_stdout)]

use machi::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let billing = Agent::builder("billing_agent")
        .instructions("You handle billing questions: refunds, invoices, charges.")
        .model("gpt-4o-mini")
        .build()?;

    let triage = Agent::builder("triage_agent")
        .instructions("Route the user to the right specialist. For billing questions, hand off.")
        .model("gpt-4o-mini")
        .handoff(Handoff::new(billing))
        .build()?;

    let config = ApiConfig::from_env()?;
    let result = run(
        triage,
        "I was charged twice for my subscription, can I get a refund?",
        config,
        RunOptions::default(),
    )
    .await?;
    println!("{}", result.output);

    Ok(())
}
