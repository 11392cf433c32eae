//! Tool dispatcher — runs the model's requested function calls concurrently.
//!
//! Each call in a turn is dispatched independently: a missing tool, a
//! malformed arguments string, a per-call timeout, or a panicking task all
//! become a `function_call_output` carrying an error payload rather than
//! aborting the run, so the model gets a chance to recover. Results are
//! returned in the same order the calls were requested in, regardless of
//! which finished first.

use std::time::Duration;

use futures::future::join_all;

use crate::context::RunContext;
use crate::item::Item;
use crate::tool::{ToolBox, ToolError};

/// Default per-call timeout, used when an agent does not override it.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// One function call the model requested, as decoded from the wire.
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// Name of the tool to invoke.
    pub name: String,
    /// Id correlating this call to its eventual output.
    pub call_id: String,
    /// Raw, JSON-encoded arguments string from the model.
    pub arguments: String,
}

/// Invoke every pending call against `tools` concurrently, honouring
/// `timeout` per call, and return one [`Item::FunctionCallOutput`] per
/// input call, in input order.
///
/// A call whose tool panics, times out, or fails decoding its arguments
/// never propagates: it is converted into an error payload inside the
/// corresponding output item, exactly like a tool returning `Err`.
pub async fn dispatch(
    calls: &[PendingCall],
    tools: &ToolBox,
    context: &RunContext,
    timeout: Duration,
) -> Vec<Item> {
    let futures = calls.iter().map(|call| run_one(call, tools, context, timeout));
    join_all(futures).await
}

async fn run_one(
    call: &PendingCall,
    tools: &ToolBox,
    context: &RunContext,
    timeout: Duration,
) -> Item {
    let output = match execute(call, tools, context, timeout).await {
        Ok(value) => value,
        Err(err) => serde_json::json!({"error": describe(tools, call, &err)}),
    };

    Item::FunctionCallOutput {
        call_id: call.call_id.clone(),
        output: output.to_string(),
    }
}

async fn execute(
    call: &PendingCall,
    tools: &ToolBox,
    context: &RunContext,
    timeout: Duration,
) -> Result<serde_json::Value, ToolError> {
    let tool = tools
        .get(&call.name)
        .ok_or_else(|| ToolError::NotFound(call.name.clone()))?
        .clone();

    let args: serde_json::Value = if call.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| serde_json::json!({}))
    };

    let context = context.clone();
    let task = tokio::spawn(async move { tool.execute(args, &context).await });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(ToolError::Panicked(panic_message(join_err)))
        }
        Ok(Err(join_err)) => Err(ToolError::Execution(join_err.to_string())),
        Err(_elapsed) => Err(ToolError::Timeout),
    }
}

fn panic_message(join_err: tokio::task::JoinError) -> String {
    join_err
        .try_into_panic()
        .ok()
        .and_then(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
        })
        .unwrap_or_else(|| "tool panicked".to_owned())
}

fn describe(tools: &ToolBox, call: &PendingCall, err: &ToolError) -> String {
    tools
        .get(&call.name)
        .map(|tool| tool.on_error(err))
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Adder;
    #[async_trait]
    impl crate::tool::Tool for Adder {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> String {
            "adds a and b".to_owned()
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(serde_json::json!(a + b))
        }
    }

    struct SlowTool;
    #[async_trait]
    impl crate::tool::Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> String {
            "never finishes in time".to_owned()
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Value::Null)
        }
    }

    struct PanicTool;
    #[async_trait]
    impl crate::tool::Tool for PanicTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> String {
            "always panics".to_owned()
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
            panic!("kaboom");
        }
    }

    fn toolbox() -> ToolBox {
        let mut tb = ToolBox::new();
        tb.add(Adder);
        tb.add(SlowTool);
        tb.add(PanicTool);
        tb
    }

    #[tokio::test]
    async fn dispatch_runs_calls_and_preserves_input_order() {
        let tools = toolbox();
        let ctx = RunContext::new();
        let calls = vec![
            PendingCall {
                name: "add".into(),
                call_id: "c1".into(),
                arguments: r#"{"a":1,"b":2}"#.into(),
            },
            PendingCall {
                name: "add".into(),
                call_id: "c2".into(),
                arguments: r#"{"a":10,"b":20}"#.into(),
            },
        ];
        let outputs = dispatch(&calls, &tools, &ctx, DEFAULT_TOOL_TIMEOUT).await;
        assert_eq!(outputs.len(), 2);
        match &outputs[0] {
            Item::FunctionCallOutput { call_id, output } => {
                assert_eq!(call_id, "c1");
                assert_eq!(output, "3");
            }
            _ => panic!("wrong item"),
        }
        match &outputs[1] {
            Item::FunctionCallOutput { call_id, output } => {
                assert_eq!(call_id, "c2");
                assert_eq!(output, "30");
            }
            _ => panic!("wrong item"),
        }
    }

    #[tokio::test]
    async fn missing_tool_becomes_error_output_not_panic() {
        let tools = toolbox();
        let ctx = RunContext::new();
        let calls = vec![PendingCall {
            name: "nope".into(),
            call_id: "c1".into(),
            arguments: "{}".into(),
        }];
        let outputs = dispatch(&calls, &tools, &ctx, DEFAULT_TOOL_TIMEOUT).await;
        match &outputs[0] {
            Item::FunctionCallOutput { output, .. } => assert!(output.contains("not found")),
            _ => panic!("wrong item"),
        }
    }

    #[tokio::test]
    async fn malformed_arguments_default_to_empty_object() {
        let tools = toolbox();
        let ctx = RunContext::new();
        let calls = vec![PendingCall {
            name: "add".into(),
            call_id: "c1".into(),
            arguments: "not json".into(),
        }];
        let outputs = dispatch(&calls, &tools, &ctx, DEFAULT_TOOL_TIMEOUT).await;
        match &outputs[0] {
            Item::FunctionCallOutput { output, .. } => assert_eq!(output, "0"),
            _ => panic!("wrong item"),
        }
    }

    #[tokio::test]
    async fn timeout_becomes_error_output() {
        let tools = toolbox();
        let ctx = RunContext::new();
        let calls = vec![PendingCall {
            name: "slow".into(),
            call_id: "c1".into(),
            arguments: "{}".into(),
        }];
        let outputs = dispatch(&calls, &tools, &ctx, Duration::from_millis(10)).await;
        match &outputs[0] {
            Item::FunctionCallOutput { output, .. } => assert!(output.contains("timeout")),
            _ => panic!("wrong item"),
        }
    }

    #[tokio::test]
    async fn panic_is_contained_and_reported_as_error_output() {
        let tools = toolbox();
        let ctx = RunContext::new();
        let calls = vec![PendingCall {
            name: "boom".into(),
            call_id: "c1".into(),
            arguments: "{}".into(),
        }];
        let outputs = dispatch(&calls, &tools, &ctx, DEFAULT_TOOL_TIMEOUT).await;
        match &outputs[0] {
            Item::FunctionCallOutput { output, .. } => assert!(output.contains("kaboom")),
            _ => panic!("wrong item"),
        }
    }
}
