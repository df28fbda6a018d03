//! Closure-backed tools.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::traits::{ToolEventStream, schema_for};
use super::{Tool, ToolError, ToolEvent, ToolInvocation};
use crate::agent::RunContext;
use crate::types::ToolReturn;

type Handler =
    Arc<dyn Fn(Value, RunContext) -> BoxFuture<'static, Result<ToolReturn, ToolError>> + Send + Sync>;

type StreamHandler =
    Arc<dyn Fn(Value, RunContext) -> Result<ToolEventStream, ToolError> + Send + Sync>;

/// A tool backed by an async closure.
///
/// ```rust,no_run
/// use agent_engine::FunctionTool;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs {
///     location: String,
/// }
///
/// let tool = FunctionTool::new(
///     "get_weather",
///     "Current weather for a city",
///     |args: WeatherArgs, _ctx| async move { Ok(format!("22C and sunny in {}", args.location)) },
/// );
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl FunctionTool {
    /// Typed tool; the parameter schema is derived from `A`.
    pub fn new<A, F, Fut, R>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(A, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        R: Serialize + 'static,
    {
        let f = Arc::new(f);
        let handler: Handler = Arc::new(move |arguments, ctx| {
            let f = Arc::clone(&f);
            async move {
                let args: A = serde_json::from_value(arguments)?;
                let output = f(args, ctx).await?;
                let value = serde_json::to_value(output)
                    .map_err(|e| ToolError::execution(format!("unserializable output: {}", e)))?;
                Ok(ToolReturn::new(value))
            }
            .boxed()
        });

        Self {
            name: name.into(),
            description: description.into(),
            parameters: schema_for::<A>(),
            handler,
        }
    }

    /// Tool taking raw JSON arguments against a hand-written schema.
    pub fn untyped<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        f: F,
    ) -> Self
    where
        F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolReturn, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |arguments, ctx| f(arguments, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(
        &self,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError> {
        let ret = (self.handler)(arguments, ctx.clone()).await?;
        Ok(ToolInvocation::Return(ret))
    }
}

/// A tool whose closure returns a stream of [`ToolEvent`]s.
///
/// The stream may yield any number of [`ToolEvent::Progress`] values and must
/// finish with a [`ToolEvent::Return`].
#[derive(Clone)]
pub struct StreamingFunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: StreamHandler,
}

impl StreamingFunctionTool {
    pub fn new<A, F, S>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        A: JsonSchema + DeserializeOwned + Send + 'static,
        F: Fn(A, RunContext) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<ToolEvent, ToolError>> + Send + 'static,
    {
        let handler: StreamHandler = Arc::new(move |arguments, ctx| {
            let args: A = serde_json::from_value(arguments)?;
            Ok(Box::pin(f(args, ctx)) as ToolEventStream)
        });

        Self {
            name: name.into(),
            description: description.into(),
            parameters: schema_for::<A>(),
            handler,
        }
    }
}

#[async_trait]
impl Tool for StreamingFunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(
        &self,
        arguments: Value,
        ctx: &RunContext,
    ) -> Result<ToolInvocation, ToolError> {
        let stream = (self.handler)(arguments, ctx.clone())?;
        Ok(ToolInvocation::Stream(stream))
    }
}
