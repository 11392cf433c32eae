//! End-to-end scenarios against a mocked Responses endpoint.
//!
//! Each test stands up a `wiremock::MockServer` and points an [`ApiConfig`]
//! at it, so `run`/`stream` exercise the full turn loop — guardrails, tool
//! dispatch, handoffs — against canned fixtures rather than a live model.

use std::time::Duration;

use async_trait::async_trait;
use machi::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ApiConfig {
    ApiConfig::new("sk-test").with_base_url(server.uri()).with_tracing_disabled(true)
}

/// Scenario 1: pure Q&A, no tools, a single model turn.
#[tokio::test]
async fn pure_qa_returns_model_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 3, "output_tokens": 1, "total_tokens": 4},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "pong"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("ponger").instructions("reply 'pong'").build().unwrap();
    let result = run(agent, "ping", config_for(&server), RunOptions::default()).await.unwrap();

    assert_eq!(result.output, "pong");
    assert_eq!(result.usage.input_tokens, 3);
    assert_eq!(result.usage.output_tokens, 1);
    assert_eq!(result.usage.total_tokens, 4);
}

struct Add;

#[async_trait]
impl Tool for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> String {
        "adds two numbers".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"a": {"type": "number"}, "b": {"type": "number"}}})
    }

    async fn execute(&self, args: Value, _context: &RunContext) -> std::result::Result<Value, ToolError> {
        let a = args["a"].as_i64().unwrap_or(0);
        let b = args["b"].as_i64().unwrap_or(0);
        Ok(json!({"sum": a + b}))
    }
}

/// Scenario 2: a single tool call, then a text turn using its result.
#[tokio::test]
async fn single_tool_call_feeds_result_back_to_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 5, "output_tokens": 2, "total_tokens": 7},
            "output": [{"type": "function_call", "call_id": "c1", "name": "add", "arguments": "{\"a\":2,\"b\":3}"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "model": "gpt-4o",
            "created_at": 1701,
            "usage": {"input_tokens": 8, "output_tokens": 4, "total_tokens": 12},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "The sum is 5."}]}]
        })))
        .mount(&server)
        .await;

    let agent = Agent::builder("calculator")
        .instructions("use the add tool to answer arithmetic questions")
        .tool(Add)
        .build()
        .unwrap();

    let result = run(agent, "what is 2 + 3?", config_for(&server), RunOptions::default()).await.unwrap();
    assert_eq!(result.output, "The sum is 5.");
    assert_eq!(result.usage.total_tokens, 7 + 12);
}

struct Delayed(&'static str, u64);

#[async_trait]
impl Tool for Delayed {
    fn name(&self) -> &str {
        self.0
    }

    fn description(&self) -> String {
        "delayed tool".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, _context: &RunContext) -> std::result::Result<Value, ToolError> {
        tokio::time::sleep(Duration::from_millis(self.1)).await;
        Ok(json!({"tool": self.0}))
    }
}

/// Scenario 3: two parallel tool calls preserve input order regardless of
/// completion order.
#[tokio::test]
async fn parallel_tool_calls_preserve_input_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 5, "output_tokens": 2, "total_tokens": 7},
            "output": [
                {"type": "function_call", "call_id": "c1", "name": "slow", "arguments": "{}"},
                {"type": "function_call", "call_id": "c2", "name": "fast", "arguments": "{}"}
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "model": "gpt-4o",
            "created_at": 1701,
            "usage": {"input_tokens": 8, "output_tokens": 4, "total_tokens": 12},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "done"}]}]
        })))
        .mount(&server)
        .await;

    let agent = Agent::builder("dispatcher")
        .instructions("call both tools")
        .tool(Delayed("slow", 40))
        .tool(Delayed("fast", 5))
        .build()
        .unwrap();

    let result = run(agent, "go", config_for(&server), RunOptions::default()).await.unwrap();
    assert_eq!(result.output, "done");
}

/// Scenario 4: a handoff re-targets the Runner to the specialist agent,
/// resetting its turn counter but carrying usage across.
#[tokio::test]
async fn handoff_switches_agent_and_resets_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 4, "output_tokens": 2, "total_tokens": 6},
            "output": [{"type": "function_call", "call_id": "c1", "name": "handoff_to_spanish_agent", "arguments": "{\"input\":\"hola\"}"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "model": "gpt-4o",
            "created_at": 1701,
            "usage": {"input_tokens": 3, "output_tokens": 3, "total_tokens": 6},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "\u{a1}Hola!"}]}]
        })))
        .mount(&server)
        .await;

    let spanish_agent = Agent::builder("spanish_agent").instructions("reply in Spanish").build().unwrap();
    let triage = Agent::builder("triage_agent")
        .instructions("route to the right specialist")
        .handoff(Handoff::new(spanish_agent))
        .build()
        .unwrap();

    let result = run(triage, "hola, como estas?", config_for(&server), RunOptions::default()).await.unwrap();
    assert_eq!(result.output, "\u{a1}Hola!");
    assert_eq!(result.usage.total_tokens, 12);
}

/// An unconfigured `handoff_to_*` call name must abort the run with
/// `HandoffError` rather than fall through to the tool dispatcher.
#[tokio::test]
async fn unconfigured_handoff_call_aborts_run() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 4, "output_tokens": 2, "total_tokens": 6},
            "output": [{"type": "function_call", "call_id": "c1", "name": "handoff_to_ghost", "arguments": "{\"input\":\"hi\"}"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("triage_agent").instructions("route").build().unwrap();
    let err = run(agent, "hello", config_for(&server), RunOptions::default()).await.unwrap_err();

    assert!(matches!(err, AgentError::HandoffError { .. }));
}

/// A bare `handoff{target}` response item (as opposed to a
/// `handoff_to_*` function call) resolves against the agent's configured
/// handoffs the same way.
#[tokio::test]
async fn bare_handoff_item_switches_agent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 4, "output_tokens": 2, "total_tokens": 6},
            "output": [{"type": "handoff", "target": "spanish_agent"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "model": "gpt-4o",
            "created_at": 1701,
            "usage": {"input_tokens": 3, "output_tokens": 3, "total_tokens": 6},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "\u{a1}Hola!"}]}]
        })))
        .mount(&server)
        .await;

    let spanish_agent = Agent::builder("spanish_agent").instructions("reply in Spanish").build().unwrap();
    let triage = Agent::builder("triage_agent")
        .instructions("route")
        .handoff(Handoff::new(spanish_agent))
        .build()
        .unwrap();

    let result = run(triage, "hola", config_for(&server), RunOptions::default()).await.unwrap();
    assert_eq!(result.output, "\u{a1}Hola!");
}

struct MathOnly;

#[async_trait]
impl InputGuardrailCheck for MathOnly {
    async fn check(
        &self,
        _context: &RunContext,
        _agent_name: &str,
        input: &Conversation,
    ) -> machi::prelude::Result<GuardrailOutput> {
        let mentions_dogs = input.items().iter().any(|item| {
            matches!(item, Item::Message { content, .. } if content.contains("dogs"))
        });
        if mentions_dogs {
            Ok(GuardrailOutput::tripwire(json!({"reason": "off_topic"})))
        } else {
            Ok(GuardrailOutput::pass())
        }
    }
}

/// Scenario 5: an input guardrail trips before any model call is made.
#[tokio::test]
async fn input_guardrail_trip_makes_zero_model_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let agent = Agent::builder("math_tutor")
        .instructions("only answer math questions")
        .input_guardrail(InputGuardrail::new("math-only", MathOnly))
        .build()
        .unwrap();

    let err = run(agent, "tell me about dogs", config_for(&server), RunOptions::default())
        .await
        .unwrap_err();

    match err {
        AgentError::GuardrailTriggered { module, .. } => assert_eq!(module, "math-only"),
        other => panic!("expected GuardrailTriggered, got {other:?}"),
    }
}

/// Scenario 6: a streaming run delivers `ResponseCreated`, `TextDelta`,
/// `ResponseCompleted`, then `StreamComplete`, in that order.
#[tokio::test]
async fn streaming_transcript_delivers_events_in_order() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_1\",\"model\":\"gpt-4o\",\"created_at\":1700}}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"hi\",\"content_index\":0}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"usage\":{\"input_tokens\":2,\"output_tokens\":1,\"total_tokens\":3}}}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let agent = Agent::builder("greeter").instructions("say hi").build().unwrap();
    let mut handle = stream(agent, "say hi", config_for(&server), RunOptions::default());

    let mut events = Vec::new();
    while let Some(event) = handle.next(Duration::from_secs(5)).await {
        events.push(event);
    }

    assert!(matches!(events[0], Event::ResponseCreated { .. }));
    assert!(matches!(&events[1], Event::TextDelta { text, .. } if text == "hi"));
    assert!(matches!(events[2], Event::ResponseCompleted { .. }));
    assert!(matches!(events[3], Event::StreamComplete));

    let result = handle.join().await.unwrap();
    assert_eq!(result.output, "hi");
    assert_eq!(result.usage.total_tokens, 3);
}

/// `max_turns = 1` aborts on the second loop iteration rather than issuing
/// a further model call.
#[tokio::test]
async fn max_turns_one_aborts_after_a_single_tool_round() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o",
            "created_at": 1700,
            "usage": {"input_tokens": 1, "output_tokens": 1, "total_tokens": 2},
            "output": [{"type": "function_call", "call_id": "c1", "name": "add", "arguments": "{\"a\":1,\"b\":1}"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::builder("calculator").instructions("add things").tool(Add).build().unwrap();
    let options = RunOptions::default().with_max_turns(1).unwrap();
    let err = run(agent, "1 + 1?", config_for(&server), options).await.unwrap_err();

    assert!(matches!(err, AgentError::MaxTurnsExceeded { turns: 1 }));
}
