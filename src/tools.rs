//! MCP tool surface
//!
//! Projects the method descriptor table into tools and routes tool
//! calls into the pipeline. Two shapes are supported:
//! - flat: one tool per Bot API method;
//! - meta: `find_method` (ranked search over the table) plus
//!   `call_method` (dispatch by name).
//!
//! Every call returns the invocation envelope as a single JSON text
//! payload, success or failure alike.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::api::ApiResponse;
use crate::config::ToolMode;
use crate::methods;
use crate::pipeline::{InvokeOptions, Pipeline};

/// Tool definition for MCP `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// One `find_method` result row.
#[derive(Debug, Clone, Serialize)]
struct MethodMatch {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    required: Vec<&'static str>,
    optional: Vec<&'static str>,
}

/// Tool registry over the pipeline.
pub struct ToolSurface {
    mode: ToolMode,
    pipeline: Arc<Pipeline>,
}

impl ToolSurface {
    pub fn new(mode: ToolMode, pipeline: Arc<Pipeline>) -> Self {
        Self { mode, pipeline }
    }

    /// List all tool definitions for the configured shape.
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        match self.mode {
            ToolMode::Flat => {
                let mut defs: Vec<ToolDefinition> = methods::all()
                    .map(|d| ToolDefinition {
                        name: d.name.to_string(),
                        description: d.description.to_string(),
                        input_schema: d.input_schema(),
                    })
                    .collect();
                defs.sort_by(|a, b| a.name.cmp(&b.name));
                defs
            }
            ToolMode::Meta => vec![
                ToolDefinition {
                    name: "find_method".to_string(),
                    description: "Search the Bot API method catalog by name or description"
                        .to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "Search text; empty lists everything"
                            },
                            "category": {
                                "type": "string",
                                "description": "Optional category filter",
                                "enum": [
                                    "messaging", "chat_management", "stickers", "inline",
                                    "payments", "games", "updates", "forum", "business", "misc"
                                ]
                            },
                            "limit": {
                                "type": "integer",
                                "description": "Max results",
                                "default": 10
                            }
                        },
                        "required": ["query"]
                    }),
                },
                ToolDefinition {
                    name: "call_method".to_string(),
                    description: "Invoke a Bot API method by name with a JSON parameter object"
                        .to_string(),
                    input_schema: json!({
                        "type": "object",
                        "properties": {
                            "method": {
                                "type": "string",
                                "description": "Method name, e.g. sendMessage"
                            },
                            "params": {
                                "type": "object",
                                "description": "Method parameters"
                            }
                        },
                        "required": ["method"]
                    }),
                },
            ],
        }
    }

    /// Execute a tool call; the returned string is the envelope JSON.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<String> {
        debug!(tool = name, "tool call");

        let envelope = match self.mode {
            ToolMode::Flat => self.invoke(name, arguments).await,
            ToolMode::Meta => match name {
                "find_method" => self.find_method(&arguments),
                "call_method" => {
                    let method = arguments
                        .get("method")
                        .and_then(|v| v.as_str())
                        .map(str::to_string);
                    match method {
                        Some(method) => {
                            let params =
                                arguments.get("params").cloned().unwrap_or(json!({}));
                            self.invoke(&method, params).await
                        }
                        None => ApiResponse::failure(
                            None,
                            "Validation failed: method: required field missing",
                        ),
                    }
                }
                other => anyhow::bail!("Unknown tool: {}", other),
            },
        };

        Ok(serde_json::to_string(&envelope)?)
    }

    async fn invoke(&self, method: &str, params: Value) -> ApiResponse {
        self.pipeline
            .invoke(method, params, InvokeOptions::default())
            .await
    }

    fn find_method(&self, arguments: &Value) -> ApiResponse {
        let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
        let category = arguments.get("category").and_then(|v| v.as_str());
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(10) as usize;

        let matches: Vec<MethodMatch> = methods::search(query, category, limit)
            .into_iter()
            .map(|d| MethodMatch {
                name: d.name,
                description: d.description,
                category: d.category.as_str(),
                required: d.required_names(),
                optional: d.optional_names(),
            })
            .collect();

        ApiResponse::success(json!({ "methods": matches }))
    }
}
