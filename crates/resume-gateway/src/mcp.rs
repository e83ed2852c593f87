//! MCP Server - Model Context Protocol adapter
//!
//! Maps JSON-RPC 2.0 messages onto [`ResumeService`] operations. Transport
//! agnostic: the HTTP gateway and the CLI's stdio server both feed raw
//! messages into [`McpServer::handle_message`].
//!
//! Tool results use the MCP content shape: a single text block holding
//! pretty-printed JSON, with `isError` set when the operation failed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use resume_core::{ResumeError, ResumeService};

use crate::config::ServerInfo;

/// Protocol revision announced in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    pub id: Value,
}

impl McpResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Result of `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<TextContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ToolResult {
    fn json(payload: &Value, is_error: bool) -> Self {
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text,
            }],
            is_error,
        }
    }

    fn ok(payload: Value) -> Self {
        Self::json(&payload, false)
    }

    fn error(payload: Value) -> Self {
        Self::json(&payload, true)
    }

    /// Parse the text block back into JSON
    pub fn payload(&self) -> Option<Value> {
        self.content
            .first()
            .and_then(|block| serde_json::from_str(&block.text).ok())
    }
}

/// The tools this server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetResume,
    UpdateResume,
    PatchResume,
    ListVersions,
    RestoreVersion,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::GetResume,
        Tool::UpdateResume,
        Tool::PatchResume,
        Tool::ListVersions,
        Tool::RestoreVersion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::GetResume => "get_resume",
            Tool::UpdateResume => "update_resume",
            Tool::PatchResume => "patch_resume",
            Tool::ListVersions => "list_versions",
            Tool::RestoreVersion => "restore_version",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            Tool::GetResume => "Returns the current resume JSON",
            Tool::UpdateResume => {
                "Replace the entire resume. Requires { resume, apiKey } parameters."
            }
            Tool::PatchResume => {
                "Merge partial resume data with existing resume. Requires { partialResume, apiKey } parameters."
            }
            Tool::ListVersions => "List all snapshot filenames",
            Tool::RestoreVersion => {
                "Restore resume from a snapshot. Requires { filename, apiKey } parameters."
            }
        }
    }

    fn input_schema(&self) -> Value {
        let api_key = json!({ "type": "string", "description": "API key for authentication" });
        match self {
            Tool::GetResume | Tool::ListVersions => json!({ "type": "object", "properties": {} }),
            Tool::UpdateResume => json!({
                "type": "object",
                "properties": {
                    "resume": { "type": "object", "description": "The complete resume object" },
                    "apiKey": api_key
                },
                "required": ["resume", "apiKey"]
            }),
            Tool::PatchResume => json!({
                "type": "object",
                "properties": {
                    "partialResume": {
                        "type": "object",
                        "description": "Partial resume object with fields to update"
                    },
                    "apiKey": api_key
                },
                "required": ["partialResume", "apiKey"]
            }),
            Tool::RestoreVersion => json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "The snapshot filename to restore from"
                    },
                    "apiKey": api_key
                },
                "required": ["filename", "apiKey"]
            }),
        }
    }

    fn descriptor(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema()
        })
    }
}

/// JSON-RPC front end over a [`ResumeService`]
///
/// Calls into SQLite synchronously; async callers should run it on a
/// blocking thread.
#[derive(Debug, Clone)]
pub struct McpServer {
    service: ResumeService,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(service: ResumeService, info: ServerInfo) -> Self {
        Self { service, info }
    }

    pub fn service(&self) -> &ResumeService {
        &self.service
    }

    /// Handle one raw JSON-RPC message; `None` for notifications
    pub fn handle_message(&self, raw: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed JSON-RPC message");
                return Some(McpResponse::failure(
                    Value::Null,
                    McpError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };
        self.handle_value(value)
    }

    /// Handle one decoded JSON-RPC message
    pub fn handle_value(&self, value: Value) -> Option<McpResponse> {
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) if request.jsonrpc == "2.0" => self.handle(request),
            Ok(_) => Some(McpResponse::failure(
                id,
                McpError::new(INVALID_REQUEST, "Invalid Request: jsonrpc must be \"2.0\""),
            )),
            Err(e) => Some(McpResponse::failure(
                id,
                McpError::new(INVALID_REQUEST, format!("Invalid Request: {}", e)),
            )),
        }
    }

    pub fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({
                "tools": Tool::ALL.iter().map(Tool::descriptor).collect::<Vec<_>>()
            })),
            "tools/call" => self.tools_call(&request.params).and_then(|result| {
                serde_json::to_value(result).map_err(|e| McpError::new(INTERNAL_ERROR, e.to_string()))
            }),
            other => Err(McpError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => McpResponse::success(id, result),
            Err(error) => McpResponse::failure(id, error),
        })
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.info.name, "version": self.info.version }
        })
    }

    fn tools_call(&self, params: &Value) -> Result<ToolResult, McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::new(INVALID_PARAMS, "tools/call requires a tool name"))?;
        let tool = Tool::from_name(name)
            .ok_or_else(|| McpError::new(INVALID_PARAMS, format!("Unknown tool: {}", name)))?;
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        let span = tracing::info_span!("tool_call", tool = name, call_id = %uuid::Uuid::new_v4());
        let _enter = span.enter();
        Ok(self.call_tool(tool, &args))
    }

    /// Run one tool; failures become `isError` results, never JSON-RPC errors
    pub fn call_tool(&self, tool: Tool, args: &Value) -> ToolResult {
        let outcome = match tool {
            Tool::GetResume => self.service.get_resume(),
            Tool::ListVersions => self.service.list_versions().map(|versions| {
                json!({
                    "success": true,
                    "versions": versions.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
                    "details": versions
                })
            }),
            Tool::UpdateResume => object_arg(args, "resume").and_then(|resume| {
                self.service
                    .update_resume(&resume, api_key(args))
                    .and_then(|committed| {
                        Ok(json!({
                            "success": true,
                            "message": "Resume updated successfully",
                            "backup": committed.backup,
                            "resume": committed.document.to_value()?
                        }))
                    })
            }),
            Tool::PatchResume => object_arg(args, "partialResume").and_then(|partial| {
                self.service
                    .patch_resume(&partial, api_key(args))
                    .and_then(|committed| {
                        Ok(json!({
                            "success": true,
                            "message": "Resume patched successfully",
                            "backup": committed.backup,
                            "resume": committed.document.to_value()?
                        }))
                    })
            }),
            Tool::RestoreVersion => string_arg(args, "filename").and_then(|filename| {
                self.service
                    .restore_version(&filename, api_key(args))
                    .and_then(|restored| {
                        Ok(json!({
                            "success": true,
                            "message": format!("Resume restored from {}", filename),
                            "preRestoreBackup": restored.pre_restore,
                            "resume": restored.document.to_value()?
                        }))
                    })
            }),
        };

        match outcome {
            Ok(payload) => {
                tracing::info!(tool = tool.name(), "Tool call succeeded");
                ToolResult::ok(payload)
            }
            Err(e) => {
                if e.is_storage_failure() {
                    tracing::error!(tool = tool.name(), error = %e, "Tool call failed");
                } else {
                    tracing::warn!(tool = tool.name(), kind = %e.kind(), error = %e, "Tool call rejected");
                }
                ToolResult::error(error_payload(tool, &e))
            }
        }
    }
}

/// Structured error body returned inside a failed tool result
pub fn error_payload(tool: Tool, error: &ResumeError) -> Value {
    let message = match error {
        ResumeError::Validation(_) => "Validation error".to_string(),
        ResumeError::InvalidSnapshot { .. } => {
            "Version data is invalid and cannot be restored".to_string()
        }
        other => other.to_string(),
    };

    let mut payload = json!({
        "error": true,
        "kind": error.kind(),
        "message": message,
        "context": tool.name()
    });
    if let Some(issues) = error.issues() {
        payload["details"] = json!(issues);
    }
    payload
}

fn api_key(args: &Value) -> Option<&str> {
    args.get("apiKey").and_then(Value::as_str)
}

/// Fetch an object argument, accepting an object encoded as a JSON string
fn object_arg(args: &Value, key: &str) -> resume_core::Result<Value> {
    match args.get(key) {
        Some(Value::Object(map)) => Ok(Value::Object(map.clone())),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                tracing::debug!(argument = key, "Coerced stringified object argument");
                Ok(Value::Object(map))
            }
            _ => Err(ResumeError::invalid_field(key, "Expected object, received string")),
        },
        Some(_) => Err(ResumeError::invalid_field(key, "Expected object")),
        None => Err(ResumeError::invalid_field(key, "Required")),
    }
}

fn string_arg(args: &Value, key: &str) -> resume_core::Result<String> {
    match args.get(key).and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(ResumeError::invalid_field(key, "Must not be empty")),
        None => Err(ResumeError::invalid_field(key, "Required")),
    }
}
