//! An agent that calls a locally-registered tool.
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cargo run --example agent_with_tools
//! ```

#![allow(clippy::print_stdout)]

use async_trait::async_trait;
use machi::prelude::*;
use serde_json::Value;

struct Weather;

#[async_trait]
impl Tool for Weather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> String {
        "Look up the current weather for a city.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value, _context: &RunContext) -> std::result::Result<Value, ToolError> {
        let city = args["city"].as_str().unwrap_or("unknown");
        Ok(serde_json::json!({"city": city, "condition": "sunny", "celsius": 22}))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let agent = Agent::builder("weather_bot")
        .instructions("You answer questions about the weather using the get_weather tool.")
        .model("gpt-4o-mini")
        .tool(Weather)
        .build()?;

    let config = ApiConfig::from_env()?;
    let result = run(agent, "What's the weather like in Lisbon?", config, RunOptions::default()).await?;
    println!("{}", result.output);

    Ok(())
}
