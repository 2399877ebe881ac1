use serde_json::{Map, Value, json};

/// One string parameter of a function declaration.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ToolParam {
    /// Builds a required parameter.
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }
}

/// Tool declaration in the chat-completions function-calling format.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.clone(),
                json!({ "type": "string", "description": param.description }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Serializes the declaration to wire JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }
}

/// Tool call emitted by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Provider-generated call id.
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Raw argument text, as shown in traces.
    pub fn args_as_string(&self) -> String {
        match &self.args {
            Value::String(value) => value.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    /// Reads one string argument. Models sometimes send a bare string instead of
    /// an object; that string is accepted for any single-argument tool.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        match &self.args {
            Value::Object(map) => map.get(key).and_then(Value::as_str),
            Value::String(raw) => Some(raw.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.args_as_string(),
            }
        })
    }

    /// Parses the `tool_calls` array of an assistant wire message.
    pub fn parse_all(message: &Value) -> Vec<ToolCall> {
        let Some(calls) = message["tool_calls"].as_array() else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let name = call["function"]["name"].as_str().unwrap_or("");
                if name.is_empty() {
                    return None;
                }
                let args = match &call["function"]["arguments"] {
                    Value::String(raw) => {
                        serde_json::from_str(raw).unwrap_or(Value::String(raw.clone()))
                    }
                    other => other.clone(),
                };
                Some(ToolCall::new(
                    call["id"].as_str().unwrap_or(""),
                    name,
                    args,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ToolCall, ToolDefinition, ToolParam};
    use serde_json::json;

    #[test]
    fn definition_lists_required_params() {
        let tool = ToolDefinition::new("query_sql", "Run a query")
            .with_param(ToolParam::required("query", "SQL text"));
        let value = tool.to_json();
        assert_eq!(value["function"]["name"], "query_sql");
        assert_eq!(value["function"]["parameters"]["required"], json!(["query"]));
        assert_eq!(
            value["function"]["parameters"]["properties"]["query"]["type"],
            "string"
        );
    }

    #[test]
    fn parse_all_decodes_string_arguments_and_skips_nameless_calls() {
        let message = json!({
            "tool_calls": [
                {"id": "a", "function": {"name": "query_sql", "arguments": "{\"query\":\"SELECT 1\"}"}},
                {"id": "b", "function": {"name": "", "arguments": "{}"}},
                {"id": "c", "function": {"name": "list_tables", "arguments": "not json"}}
            ]
        });
        let calls = ToolCall::parse_all(&message);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].str_arg("query"), Some("SELECT 1"));
        assert_eq!(calls[1].args, json!("not json"));
    }

    #[test]
    fn missing_tool_calls_yield_empty_list() {
        assert!(ToolCall::parse_all(&json!({"content": "hi"})).is_empty());
    }
}
