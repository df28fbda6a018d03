//! Agent run loop tests.

mod helpers;

use helpers::{
    BlockingHook, BrokenHook, FailingTool, InputModifyingHook, TestTrackingHook, TrackingTool,
};

use super::{Agent, AgentEvent, RunContext, RunOptions};
use crate::Error;
use crate::hooks::{Hook, PostRunInput, PostRunOutcome, PostToolDecision, PreRunDecision};
use crate::llm::ScriptedLlm;
use crate::tools::{StreamingFunctionTool, ToolError, ToolEvent};
use crate::types::{Message, Role, ToolCallStatus, ToolReturn, Usage};

use futures::{StreamExt, stream};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_plain_text_run() {
    let llm = Arc::new(ScriptedLlm::new().text("Hello there"));
    let agent = Agent::builder(llm.clone())
        .instructions("Be brief.")
        .build()
        .unwrap();

    let result = agent.run("Hi", &RunContext::new()).await.unwrap();

    assert_eq!(result.content, "Hello there");
    assert_eq!(result.history.len(), 3);
    assert_eq!(result.history[0].role, Role::System);
    assert_eq!(result.history[1], Message::user("Hi"));
    assert_eq!(result.history[2].role, Role::Assistant);
    assert_eq!(result.usage.total_tokens, 15);
    assert_eq!(result.metrics.turns, 1);
    assert_eq!(result.metrics.model_calls, 1);
    assert_eq!(result.rerun_count(), 0);
    assert!(!result.retries_exhausted());
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_tool_round_trip() {
    let tool = TrackingTool::new("lookup", json!("42"));
    let calls = tool.calls();
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("lookup", json!({"q": "answer"}))
            .text("The answer is 42"),
    );
    let agent = Agent::builder(llm.clone()).tool(tool).build().unwrap();

    let result = agent.run("What is the answer?", &RunContext::new()).await.unwrap();

    assert_eq!(result.content, "The answer is 42");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Success);
    assert_eq!(result.tool_calls[0].result, json!("42"));
    assert_eq!(result.metrics.turns, 2);
    assert_eq!(result.usage.total_tokens, 30);

    let requests = llm.requests();
    let second = &requests[1];
    let tool_message = second
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(tool_message.content, "42");
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(second.tools.len(), 1);
}

#[tokio::test]
async fn test_unknown_tool_is_fed_back_to_model() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("missing", json!({}))
            .text("Sorry, I cannot do that"),
    );
    let agent = Agent::builder(llm.clone()).build().unwrap();

    let result = agent.run("Do it", &RunContext::new()).await.unwrap();

    assert_eq!(result.content, "Sorry, I cannot do that");
    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Error);
    assert!(result.tool_calls[0].content().contains("missing"));
    assert_eq!(result.metrics.errors, 1);
}

#[tokio::test]
async fn test_tool_failure_is_recoverable() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("write", json!({}))
            .text("The write failed"),
    );
    let agent = Agent::builder(llm)
        .tool(FailingTool {
            name: "write".into(),
        })
        .build()
        .unwrap();

    let result = agent.run("Write it", &RunContext::new()).await.unwrap();

    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Error);
    assert!(result.tool_calls[0].content().contains("disk on fire"));
}

#[tokio::test]
async fn test_pre_tool_deny_skips_tool() {
    let tool = TrackingTool::new("delete_file", json!("deleted"));
    let calls = tool.calls();
    let tracker = TestTrackingHook::new();
    let post_calls = Arc::clone(&tracker.call_count);
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("delete_file", json!({"path": "/etc/passwd"}))
            .text("I was not allowed to delete it"),
    );
    let agent = Agent::builder(llm)
        .tool(tool)
        .hook(Hook::pre_tool(
            "no-deletes",
            BlockingHook {
                reason: "deletion is disabled".into(),
            },
        ))
        .hook(Hook::post_tool("tracker", tracker))
        .build()
        .unwrap();

    let result = agent.run("Delete it", &RunContext::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(post_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Denied);
    assert_eq!(result.tool_calls[0].content(), "Denied: deletion is disabled");
    assert_eq!(result.metrics.denials, 1);
}

#[tokio::test]
async fn test_pre_tool_modify_replaces_arguments() {
    let tool = TrackingTool::new("read_file", json!("contents"));
    let seen = tool.arguments();
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("read_file", json!({"file_path": "/original"}))
            .text("done"),
    );
    let agent = Agent::builder(llm)
        .tool(tool)
        .hook(Hook::pre_tool("rewrite", InputModifyingHook))
        .build()
        .unwrap();

    let result = agent.run("Read", &RunContext::new()).await.unwrap();

    assert_eq!(seen.lock().unwrap()[0], json!({"file_path": "/modified/path"}));
    assert_eq!(
        result.tool_calls[0].arguments,
        json!({"file_path": "/modified/path"})
    );
}

#[tokio::test]
async fn test_post_tool_modify_replaces_result() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("secret", json!({}))
            .text("done"),
    );
    let agent = Agent::builder(llm.clone())
        .tool(TrackingTool::new("secret", json!("token=abc123")))
        .hook(Hook::post_tool("redact", |input: crate::hooks::PostToolInput| async move {
            let text = input.result.as_str().unwrap_or_default().replace("abc123", "***");
            Ok(PostToolDecision::Modify(json!(text)))
        }))
        .build()
        .unwrap();

    let result = agent.run("Show secret", &RunContext::new()).await.unwrap();

    assert_eq!(result.tool_calls[0].result, json!("token=***"));
    let tool_message = llm.requests()[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .cloned()
        .unwrap();
    assert_eq!(tool_message.content, "token=***");
}

#[tokio::test]
async fn test_pre_tool_hook_error_is_fatal() {
    let llm = Arc::new(ScriptedLlm::new().tool_call("lookup", json!({})).text("unused"));
    let agent = Agent::builder(llm)
        .tool(TrackingTool::new("lookup", json!("x")))
        .hook(Hook::pre_tool("broken", BrokenHook))
        .build()
        .unwrap();

    let err = agent.run("Go", &RunContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::HookFailed { ref hook, .. } if hook == "broken"));
}

#[tokio::test]
async fn test_post_tool_hook_error_is_skipped() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("agent_engine=debug")
        .with_test_writer()
        .try_init();

    let llm = Arc::new(ScriptedLlm::new().tool_call("lookup", json!({})).text("done"));
    let agent = Agent::builder(llm)
        .tool(TrackingTool::new("lookup", json!("raw")))
        .hook(Hook::post_tool("flaky", |_input: crate::hooks::PostToolInput| async {
            Err::<PostToolDecision, _>(Error::Config("audit sink offline".into()))
        }))
        .build()
        .unwrap();

    let result = agent.run("Go", &RunContext::new()).await.unwrap();

    assert_eq!(result.content, "done");
    assert_eq!(result.tool_calls[0].result, json!("raw"));
    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Success);
}

#[tokio::test]
async fn test_pre_run_replace_and_block() {
    let llm = Arc::new(ScriptedLlm::new().text("ok"));
    let agent = Agent::builder(llm.clone())
        .hook(Hook::pre_run("redact", |input: crate::hooks::PreRunInput| async move {
            Ok(PreRunDecision::Replace(input.input.replace("password", "[redacted]")))
        }))
        .build()
        .unwrap();

    let result = agent.run("my password is hunter2", &RunContext::new()).await.unwrap();
    assert_eq!(result.history[0], Message::user("my [redacted] is hunter2"));

    let blocked = Agent::builder(Arc::new(ScriptedLlm::new().text("never")))
        .hook(Hook::pre_run(
            "guard",
            BlockingHook {
                reason: "off-topic".into(),
            },
        ))
        .build()
        .unwrap();
    let err = blocked.run("anything", &RunContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::Blocked(ref reason) if reason == "off-topic"));
}

#[tokio::test]
async fn test_max_turns_bound() {
    let llm = Arc::new(ScriptedLlm::new().always_tool_call("lookup", json!({})));
    let agent = Agent::builder(llm.clone())
        .tool(TrackingTool::new("lookup", json!("more")))
        .max_turns(3)
        .build()
        .unwrap();

    let err = agent.run("Loop forever", &RunContext::new()).await.unwrap_err();

    assert!(matches!(err, Error::MaxTurnsExceeded { limit: 3 }));
    assert_eq!(llm.call_count(), 3);
}

#[tokio::test]
async fn test_run_options_override_max_turns() {
    let llm = Arc::new(ScriptedLlm::new().always_tool_call("lookup", json!({})));
    let agent = Agent::builder(llm.clone())
        .tool(TrackingTool::new("lookup", json!("more")))
        .build()
        .unwrap();

    let err = agent
        .run_with_options("Loop", &RunContext::new(), &RunOptions::new().max_turns(1))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MaxTurnsExceeded { limit: 1 }));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_prompt_token_limit() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("lookup", json!({}))
            .text("unused"),
    );
    let agent = Agent::builder(llm.clone())
        .tool(TrackingTool::new("lookup", json!("x")))
        .max_prompt_tokens(15)
        .build()
        .unwrap();

    let err = agent.run("Go", &RunContext::new()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::PromptTokensExceeded {
            used: 20,
            limit: 15
        }
    ));
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_next_prompt_over_limit_skips_model_call() {
    let llm = Arc::new(ScriptedLlm::new().text("unused"));
    let agent = Agent::builder(llm.clone())
        .max_total_tokens(5)
        .build()
        .unwrap();

    let err = agent
        .run("x".repeat(100), &RunContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NextPromptOverLimit { limit: 5, .. }));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_llm_failure_is_fatal() {
    let agent = Agent::builder(Arc::new(ScriptedLlm::new().failure("rate limited")))
        .build()
        .unwrap();
    let err = agent.run("Hi", &RunContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::Llm(ref m) if m.contains("rate limited")));
}

#[tokio::test]
async fn test_post_run_rerun_with_correction() {
    let llm = Arc::new(ScriptedLlm::new().text("A very long answer").text("Short"));
    let agent = Agent::builder(llm.clone())
        .hook(Hook::post_run("brevity", |input: PostRunInput| async move {
            if input.result.content.len() > 10 {
                Ok(PostRunOutcome::rerun(input.result, "Answer in one word."))
            } else {
                Ok(PostRunOutcome::accept(input.result))
            }
        }))
        .build()
        .unwrap();

    let result = agent.run("Describe Rust", &RunContext::new()).await.unwrap();

    assert_eq!(result.content, "Short");
    assert_eq!(result.rerun_count(), 1);
    assert!(!result.retries_exhausted());
    assert_eq!(result.metrics.reruns, 1);
    assert_eq!(result.metrics.turns, 2);
    let requests = llm.requests();
    let last_request = &requests[1];
    assert_eq!(
        last_request.messages.last(),
        Some(&Message::user("Answer in one word."))
    );
}

#[tokio::test]
async fn test_cancelled_context_stops_run() {
    let llm = Arc::new(ScriptedLlm::new().text("unused"));
    let agent = Agent::builder(llm.clone()).build().unwrap();
    let ctx = RunContext::new();
    ctx.cancellation_token().cancel();

    let err = agent.run("Hi", &ctx).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_run_with_history_continues_conversation() {
    let llm = Arc::new(ScriptedLlm::new().text("Nice to meet you, Ada").text("Your name is Ada"));
    let agent = Agent::builder(llm.clone())
        .instructions("Remember names.")
        .build()
        .unwrap();
    let ctx = RunContext::new();

    let first = agent.run("I am Ada", &ctx).await.unwrap();
    let second = agent
        .run_with_history("What is my name?", first.history.clone(), &ctx)
        .await
        .unwrap();

    assert_eq!(second.content, "Your name is Ada");
    assert_eq!(second.history.len(), first.history.len() + 2);
    let systems = second
        .history
        .iter()
        .filter(|m| m.role == Role::System)
        .count();
    assert_eq!(systems, 1);
    assert_eq!(llm.requests()[1].messages.len(), 4);
}

#[tokio::test]
async fn test_sub_agent_usage_is_folded() {
    let child_llm = Arc::new(ScriptedLlm::new().text("Paris is the capital"));
    let child = Agent::builder(child_llm)
        .name("researcher")
        .description("Finds facts")
        .build()
        .unwrap();
    let child_id = child.id().to_string();

    let parent_llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("researcher", json!({"input": "Capital of France?"}))
            .text("The capital is Paris"),
    );
    let parent = Agent::builder(parent_llm).sub_agent(child).build().unwrap();
    let ctx = RunContext::new();

    let result = parent.run("Capital of France?", &ctx).await.unwrap();

    assert_eq!(result.content, "The capital is Paris");
    assert_eq!(result.tool_calls[0].result, json!("Paris is the capital"));
    assert_eq!(result.usage.total_tokens, 45);
    assert_eq!(
        ctx.downstream_agents().get(&child_id).map(String::as_str),
        Some("researcher")
    );
}

#[derive(Deserialize, JsonSchema)]
struct CountArgs {
    to: u32,
}

fn counting_tool() -> StreamingFunctionTool {
    StreamingFunctionTool::new("count", "Counts up", |args: CountArgs, _ctx| {
        let mut events: Vec<_> = (1..=args.to)
            .map(|n| Ok::<_, ToolError>(ToolEvent::Progress(json!(n))))
            .collect();
        events.push(Ok(ToolEvent::Return(
            ToolReturn::new(json!(args.to)).with_usage(Usage::new(1, 1)),
        )));
        stream::iter(events)
    })
}

#[tokio::test]
async fn test_streaming_tool_progress_in_run_streaming() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("count", json!({"to": 3}))
            .text("Counted to three"),
    );
    let agent = Agent::builder(llm).tool(counting_tool()).build().unwrap();

    let mut stream = agent.run_streaming("Count", RunContext::new());
    let mut progress = Vec::new();
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event.unwrap() {
            AgentEvent::ToolProgress { value, tool_name, .. } => {
                assert_eq!(tool_name, "count");
                progress.push(value);
            }
            AgentEvent::Text(delta) => text.push_str(&delta),
            _ => {}
        }
    }

    assert_eq!(progress, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(text, "Counted to three");
    let result = stream.result().unwrap();
    assert_eq!(result.content, "Counted to three");
    assert_eq!(result.tool_calls[0].result, json!(3));
    assert_eq!(result.usage.total_tokens, 32);
}

#[tokio::test]
async fn test_streaming_tool_without_return_is_error() {
    let tool = StreamingFunctionTool::new("broken", "Never returns", |_args: CountArgs, _ctx| {
        stream::iter(vec![Ok::<_, ToolError>(ToolEvent::Progress(json!("working")))])
    });
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_call("broken", json!({"to": 1}))
            .text("It broke"),
    );
    let agent = Agent::builder(llm).tool(tool).build().unwrap();

    let result = agent.run("Go", &RunContext::new()).await.unwrap();

    assert_eq!(result.tool_calls[0].status, ToolCallStatus::Error);
    assert!(result.tool_calls[0].content().contains("without returning"));
}

#[tokio::test]
async fn test_streaming_error_ends_stream() {
    let llm = Arc::new(ScriptedLlm::new().always_tool_call("lookup", json!({})));
    let agent = Agent::builder(llm)
        .tool(TrackingTool::new("lookup", json!("x")))
        .max_turns(2)
        .build()
        .unwrap();

    let mut stream = agent.run_streaming("Loop", RunContext::new());
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item);
    }

    assert!(matches!(last, Some(Err(Error::MaxTurnsExceeded { limit: 2 }))));
    assert!(stream.result().is_none());
    assert!(stream.is_finished());
}

#[tokio::test]
async fn test_sequential_dispatch_keeps_order() {
    let llm = Arc::new(
        ScriptedLlm::new()
            .tool_calls([("first", json!({})), ("second", json!({}))])
            .text("done"),
    );
    let agent = Agent::builder(llm)
        .tool(TrackingTool::new("first", json!(1)))
        .tool(TrackingTool::new("second", json!(2)))
        .parallel_tool_calls(false)
        .build()
        .unwrap();

    let result = agent.run("Go", &RunContext::new()).await.unwrap();

    let names: Vec<_> = result.tool_calls.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(result.metrics.tool_stats["first"].calls, 1);
}

#[tokio::test]
async fn test_events_serialize_for_transport() {
    let llm = Arc::new(ScriptedLlm::new().text("hi"));
    let agent = Agent::builder(llm).build().unwrap();

    let events: Vec<_> = agent
        .run_streaming("Hi", RunContext::new())
        .filter_map(|e| async move { e.ok() })
        .collect()
        .await;

    let json = serde_json::to_value(&events).unwrap();
    let kinds: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["text", "usage"]);
}
