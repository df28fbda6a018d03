//! Tool trait definitions.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ToolError;
use crate::agent::{AgentEvent, RunContext};
use crate::types::{ToolDefinition, ToolReturn};

pub type ToolEventStream = Pin<Box<dyn Stream<Item = Result<ToolEvent, ToolError>> + Send>>;

/// Interim or terminal output of a streaming tool.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    /// Intermediate value, surfaced to stream consumers only.
    Progress(Value),
    /// Event produced by a nested agent run.
    Downstream {
        agent_id: String,
        agent_name: String,
        event: Box<AgentEvent>,
    },
    /// Final value. Ends the tool's output; later events are ignored.
    Return(ToolReturn),
}

/// What invoking a tool produced: a value right away, or a stream of events
/// that must end in [`ToolEvent::Return`].
pub enum ToolInvocation {
    Return(ToolReturn),
    Stream(ToolEventStream),
}

impl ToolInvocation {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Return(ToolReturn::new(value))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ToolEvent, ToolError>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }
}

impl fmt::Debug for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Return(value) => f.debug_tuple("Return").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Uniform contract every tool shape is adapted to at registration time.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;

    async fn invoke(
        &self,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Tool with typed arguments and a schema derived by schemars.
#[async_trait]
pub trait SchemaTool: Send + Sync {
    type Input: JsonSchema + DeserializeOwned + Send;
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    async fn handle(&self, input: Self::Input, ctx: &RunContext) -> Result<Value, ToolError>;
}

#[async_trait]
impl<T: SchemaTool + 'static> Tool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn parameters(&self) -> Value {
        schema_for::<T::Input>()
    }

    async fn invoke(
        &self,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError> {
        let typed = serde_json::from_value::<T::Input>(arguments)?;
        let value = SchemaTool::handle(self, typed, ctx).await?;
        Ok(ToolInvocation::value(value))
    }
}

/// JSON schema for a tool argument type, normalized to an object schema.
pub fn schema_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value =
        serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));

    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        if !obj.contains_key("properties") {
            obj.insert(
                "properties".to_string(),
                Value::Object(serde_json::Map::new()),
            );
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct WeatherArgs {
        /// City name
        location: String,
    }

    struct WeatherTool;

    #[async_trait]
    impl SchemaTool for WeatherTool {
        type Input = WeatherArgs;
        const NAME: &'static str = "get_weather";
        const DESCRIPTION: &'static str = "Current weather for a city";

        async fn handle(&self, input: WeatherArgs, _ctx: &RunContext) -> Result<Value, ToolError> {
            Ok(json!(format!("Sunny in {}", input.location)))
        }
    }

    #[test]
    fn test_schema_for_object() {
        let schema = schema_for::<WeatherArgs>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["location"].is_object());
        assert!(schema.get("$schema").is_none());
    }

    #[tokio::test]
    async fn test_schema_tool_invoke() {
        let ctx = RunContext::new();
        let out = WeatherTool
            .invoke(json!({"location": "Paris"}), &ctx)
            .await
            .unwrap();
        match out {
            ToolInvocation::Return(ret) => assert_eq!(ret.value, "Sunny in Paris"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_tool_bad_arguments() {
        let ctx = RunContext::new();
        let err = WeatherTool.invoke(json!({"city": 1}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
