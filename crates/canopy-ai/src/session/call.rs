//! The call mechanism: every tool or lambda invocation is logged as a
//! call message followed by exactly one result message.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use super::Session;
use crate::message::{ContentType, Message, MessageType, Role};
use crate::AiError;

/// The call and result messages of one finished invocation.
///
/// A failed handler still produces a result (with error content); the
/// failure is kept here rather than returned, so one bad tool call never
/// aborts the caller's flow.
#[derive(Debug)]
pub struct CallResult {
    pub call: Message,
    pub result: Message,
    output: Option<Value>,
    error: Option<AiError>,
}

impl CallResult {
    pub fn error(&self) -> Option<&AiError> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Turn a recorded failure back into an `Err`, keeping successes as-is.
    pub fn into_result(self) -> Result<CallResult, AiError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Decode the handler output, or return the handler's error.
    pub fn into_output<T: DeserializeOwned>(self) -> Result<T, AiError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let value = self.output.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            AiError::Serialization(format!("failed to decode {} result: {e}", self.call.tool))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Session {
    /// Record a call, run `handler` in the call's scope, and record its
    /// result. Returns `Err` only when the work was cancelled (no result
    /// is recorded then) or the arguments could not be encoded.
    pub(crate) async fn call<F, Fut>(
        &self,
        role: Role,
        name: &str,
        args: Option<Value>,
        handler: F,
    ) -> Result<CallResult, AiError>
    where
        F: FnOnce(Session) -> Fut + Send,
        Fut: Future<Output = Result<Value, AiError>> + Send,
    {
        let content = match &args {
            Some(args) => serde_json::to_string(args)?,
            None => String::new(),
        };
        let call = self.add_message(role, MessageType::Call, name, ContentType::Json, content);
        let scope = self.with_parent(call.id.clone());
        debug!(session_id = %self.id(), tool = name, call_id = %call.id, "call started");

        let handler_scope = scope.clone();
        let guarded = AssertUnwindSafe(async move { handler(handler_scope).await }).catch_unwind();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AiError::Cancelled),
            outcome = guarded => outcome,
        };

        let outcome = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("panic caught: {}", panic_message(&*payload));
                let backtrace = Backtrace::force_capture().to_string();
                error!(
                    session_id = %self.id(),
                    tool = name,
                    call_id = %call.id,
                    %backtrace,
                    "{message}"
                );
                Err(AiError::Internal { message, backtrace })
            }
        };

        if self.cancel.is_cancelled() || matches!(outcome, Err(AiError::Cancelled)) {
            debug!(tool = name, call_id = %call.id, "call cancelled");
            return Err(AiError::Cancelled);
        }

        let outcome = outcome.and_then(|value| {
            serde_json::to_string(&value)
                .map(|text| (value, text))
                .map_err(|e| AiError::Serialization(format!("failed to serialize result: {e}")))
        });

        let (result, output, error) = match outcome {
            Ok((value, text)) => {
                let result = scope.add_message(
                    Role::Tool,
                    MessageType::Result,
                    name,
                    ContentType::Json,
                    text,
                );
                (result, Some(value), None)
            }
            Err(err) => {
                let result = scope.add_message(
                    Role::Tool,
                    MessageType::Result,
                    name,
                    ContentType::Error,
                    err.to_string(),
                );
                debug!(tool = name, call_id = %call.id, "call failed: {err}");
                (result, None, Some(err))
            }
        };

        Ok(CallResult {
            call,
            result,
            output,
            error,
        })
    }

    /// Invoke a registered tool by name.
    ///
    /// Unknown tools, denied access, and malformed arguments are recorded
    /// as error results like any other handler failure.
    pub async fn call_tool<A>(&self, role: Role, name: &str, args: &A) -> Result<CallResult, AiError>
    where
        A: Serialize + Sync + ?Sized,
    {
        let args = match serde_json::to_value(args)? {
            Value::Null => None,
            value => Some(value),
        };
        let input = args.clone().unwrap_or(Value::Null);
        let tool = self.shared().registry.get(name).cloned();
        let tool_name = name.to_string();

        self.call(role, name, args, move |scope| async move {
            let tool = tool.ok_or_else(|| AiError::UnknownTool(tool_name.clone()))?;
            if !tool.check_access(scope.claims()) {
                return Err(AiError::AccessDenied(format!("tool {tool_name:?}")));
            }
            tool.invoke(scope, input).await
        })
        .await
    }

    /// Run an ad-hoc function through the call mechanism under `label`.
    pub async fn call_lambda<F, Fut, T>(&self, role: Role, label: &str, f: F) -> Result<CallResult, AiError>
    where
        F: FnOnce(Session) -> Fut + Send,
        Fut: Future<Output = Result<T, AiError>> + Send,
        T: Serialize + Send,
    {
        self.call(role, label, None, move |scope| async move {
            let value = f(scope).await?;
            serde_json::to_value(value)
                .map_err(|e| AiError::Serialization(format!("failed to serialize result: {e}")))
        })
        .await
    }
}
