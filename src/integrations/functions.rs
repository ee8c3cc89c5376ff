//! Named remote functions (payment orders, courier, email) invoked over HTTP.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("function {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("could not reach function {name}: {source}")]
    Transport { name: String, #[source] source: reqwest::Error },

    #[error("unexpected response from {name}: {message}")]
    InvalidResponse { name: String, message: String },
}

/// Invokes a named function with a JSON payload and awaits its JSON response.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, FunctionError>;
}

/// Typed wrapper around [`FunctionInvoker::invoke`].
pub async fn invoke_typed<T: DeserializeOwned>(
    functions: &dyn FunctionInvoker,
    name: &str,
    payload: &impl Serialize,
) -> Result<T, FunctionError> {
    let payload = serde_json::to_value(payload)
        .map_err(|e| FunctionError::InvalidResponse { name: name.to_string(), message: format!("payload: {e}") })?;
    let response = functions.invoke(name, payload).await?;
    serde_json::from_value(response)
        .map_err(|e| FunctionError::InvalidResponse { name: name.to_string(), message: e.to_string() })
}

/// `POST {base_url}/{name}` with an optional bearer key.
#[derive(Clone, Debug)]
pub struct HttpFunctions {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFunctions {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into().trim_end_matches('/').to_string(), api_key }
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctions {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, FunctionError> {
        let url = format!("{}/{}", self.base_url, name);
        debug!(function = name, "invoking remote function");
        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await
            .map_err(|source| FunctionError::Transport { name: name.to_string(), source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(function = name, %status, "remote function returned an error");
            return Err(FunctionError::Failed { name: name.to_string(), message: format!("{status}: {body}") });
        }
        response.json::<Value>().await
            .map_err(|e| FunctionError::InvalidResponse { name: name.to_string(), message: e.to_string() })
    }
}

/// Canned responses per function name, recording every call.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ScriptedFunctions {
    responses: std::sync::Mutex<std::collections::HashMap<String, Result<Value, String>>>,
    calls: std::sync::Mutex<Vec<(String, Value)>>,
}

#[cfg(test)]
impl ScriptedFunctions {
    pub(crate) fn respond(self, name: &str, response: Value) -> Self {
        self.responses.lock().unwrap().insert(name.to_string(), Ok(response));
        self
    }

    pub(crate) fn fail(self, name: &str, message: &str) -> Self {
        self.responses.lock().unwrap().insert(name.to_string(), Err(message.to_string()));
        self
    }

    pub(crate) fn calls_to(&self, name: &str) -> Vec<Value> {
        self.calls.lock().unwrap().iter().filter(|(n, _)| n == name).map(|(_, p)| p.clone()).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl FunctionInvoker for ScriptedFunctions {
    async fn invoke(&self, name: &str, payload: Value) -> Result<Value, FunctionError> {
        self.calls.lock().unwrap().push((name.to_string(), payload));
        match self.responses.lock().unwrap().get(name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(FunctionError::Failed { name: name.to_string(), message: message.clone() }),
            None => Ok(Value::Null),
        }
    }
}
