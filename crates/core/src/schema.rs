// Parameter specs and the public schema shapes synthesized from them

use crate::declaration::Declaration;
use crate::error::RegistryError;
use crate::protocol::{PromptArgument, PromptSchema, ResourceDescriptor, ToolSchema};
use crate::signature::{self, FormalParameter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-level parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    Object,
}

impl SemanticType {
    /// Read a JSON Schema type name; `integer` narrows to number and `array`
    /// to object.
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" | "integer" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" | "array" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved description of one operation parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub semantic_type: SemanticType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

/// Resolve the parameter list for a declaration, in the order the handler
/// reads its arguments: signature parameters first, then names only the
/// explicit map declares. An explicit entry wins over the signature; the
/// signature only fills in what the entry leaves out.
pub fn resolve_parameters(
    declaration: &Declaration,
    signature: &[FormalParameter],
) -> Result<Vec<ParameterSpec>, RegistryError> {
    let inferred = signature::inspect(signature);
    if !declaration.has_explicit_parameters() {
        return Ok(inferred);
    }

    let Some(Value::Object(map)) = &declaration.parameters else {
        return Err(malformed(declaration, "*", "parameter map must be an object"));
    };

    let mut specs = inferred
        .iter()
        .map(|spec| match map.get(&spec.name) {
            Some(entry) => explicit_spec(declaration, &spec.name, entry, Some(spec)),
            None => Ok(spec.clone()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (name, entry) in map {
        if !inferred.iter().any(|spec| &spec.name == name) {
            specs.push(explicit_spec(declaration, name, entry, None)?);
        }
    }
    Ok(specs)
}

fn explicit_spec(
    declaration: &Declaration,
    name: &str,
    entry: &Value,
    from_signature: Option<&ParameterSpec>,
) -> Result<ParameterSpec, RegistryError> {
    let Value::Object(entry) = entry else {
        return Err(malformed(declaration, name, "entry must be an object"));
    };

    let semantic_type = match entry.get("type") {
        None => from_signature
            .map(|spec| spec.semantic_type)
            .unwrap_or(SemanticType::String),
        Some(Value::String(type_name)) => SemanticType::from_schema_name(type_name)
            .ok_or_else(|| malformed(declaration, name, &format!("unknown type '{}'", type_name)))?,
        Some(_) => return Err(malformed(declaration, name, "type must be a string")),
    };

    let description = match entry.get("description") {
        None => from_signature
            .map(|spec| spec.description.clone())
            .unwrap_or_default(),
        Some(Value::String(text)) => text.clone(),
        Some(_) => return Err(malformed(declaration, name, "description must be a string")),
    };

    let required = match entry.get("required") {
        None => from_signature.map(|spec| spec.required).unwrap_or(false),
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err(malformed(declaration, name, "required must be a boolean")),
    };

    let default = entry
        .get("default")
        .cloned()
        .or_else(|| from_signature.and_then(|spec| spec.default.clone()));

    Ok(ParameterSpec {
        name: name.to_string(),
        semantic_type,
        description,
        required,
        default,
    })
}

fn malformed(declaration: &Declaration, parameter: &str, reason: &str) -> RegistryError {
    RegistryError::MalformedParameter {
        kind: declaration.kind,
        operation: declaration.key().to_string(),
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}

/// Names of required parameters, in list order.
pub fn required_names(specs: &[ParameterSpec]) -> Vec<&str> {
    specs
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name.as_str())
        .collect()
}

pub fn tool_schema(declaration: &Declaration, specs: &[ParameterSpec]) -> ToolSchema {
    let explicit = explicit_map(declaration);
    let listed = listing_order(declaration, specs);

    let properties: Map<String, Value> = listed
        .iter()
        .map(|spec| {
            let property = match explicit.and_then(|map| map.get(&spec.name)) {
                Some(entry) => explicit_property(entry),
                None => inferred_property(spec),
            };
            (spec.name.clone(), property)
        })
        .collect();
    let required = listed
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name.as_str())
        .collect();

    ToolSchema {
        name: declaration.name.clone(),
        description: declaration.description.clone(),
        input_schema: json_schema_object(Value::Object(properties), required),
    }
}

fn explicit_map(declaration: &Declaration) -> Option<&Map<String, Value>> {
    match &declaration.parameters {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Public listing order: explicit entries as declared, then any signature
/// parameters the explicit map leaves out.
fn listing_order<'a>(
    declaration: &Declaration,
    specs: &'a [ParameterSpec],
) -> Vec<&'a ParameterSpec> {
    let mut listed: Vec<&ParameterSpec> = explicit_map(declaration)
        .map(|map| {
            map.keys()
                .filter_map(|name| specs.iter().find(|spec| &spec.name == name))
                .collect()
        })
        .unwrap_or_default();
    let rest: Vec<&ParameterSpec> = specs
        .iter()
        .filter(|spec| !listed.iter().any(|l| l.name == spec.name))
        .collect();
    listed.extend(rest);
    listed
}

// Explicit entries are copied as written; only the per-property `required`
// flag moves to the schema's top-level list.
fn explicit_property(entry: &Value) -> Value {
    let mut entry = entry.clone();
    if let Value::Object(fields) = &mut entry {
        fields.remove("required");
    }
    entry
}

fn inferred_property(spec: &ParameterSpec) -> Value {
    let mut property = json_schema_typed(spec.semantic_type, &spec.description);
    if let (Some(default), Value::Object(fields)) = (&spec.default, &mut property) {
        fields.insert("default".to_string(), default.clone());
    }
    property
}

pub fn prompt_schema(declaration: &Declaration, specs: &[ParameterSpec]) -> PromptSchema {
    PromptSchema {
        name: declaration.name.clone(),
        description: declaration.description.clone(),
        arguments: listing_order(declaration, specs)
            .into_iter()
            .map(|spec| PromptArgument {
                name: spec.name.clone(),
                description: spec.description.clone(),
                required: spec.required,
            })
            .collect(),
    }
}

pub fn resource_descriptor(declaration: &Declaration) -> ResourceDescriptor {
    ResourceDescriptor {
        uri: declaration.key().to_string(),
        name: declaration.name.clone(),
        description: declaration.description.clone(),
        mime_type: declaration.mime_type().to_string(),
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn json_schema_typed(semantic_type: SemanticType, description: &str) -> Value {
    if description.is_empty() {
        serde_json::json!({ "type": semantic_type.as_str() })
    } else {
        serde_json::json!({
            "type": semantic_type.as_str(),
            "description": description
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use serde_json::json;

    fn sum_signature() -> Vec<FormalParameter> {
        vec![
            FormalParameter::new::<i64>("num1"),
            FormalParameter::new::<i64>("num2").with_default(0),
        ]
    }

    #[test]
    fn test_inferred_tool_schema() {
        let decl = Declaration::tool("sum", "Add two numbers");
        let specs = resolve_parameters(&decl, &sum_signature()).unwrap();
        let schema = tool_schema(&decl, &specs);

        assert_eq!(schema.name, "sum");
        assert_eq!(schema.input_schema["type"], "object");
        assert_eq!(schema.input_schema["required"], json!(["num1"]));
        assert_eq!(schema.input_schema["properties"]["num1"], json!({"type": "number"}));
        assert_eq!(
            schema.input_schema["properties"]["num2"],
            json!({"type": "number", "default": 0})
        );
    }

    #[test]
    fn test_explicit_map_takes_precedence() {
        let decl = Declaration::tool("encode", "Encode text").with_parameters(json!({
            "text": {"type": "string", "description": "Text to encode", "required": true}
        }));
        // Signature disagrees on the type; the explicit entry wins.
        let signature = vec![FormalParameter::new::<i64>("text")];
        let specs = resolve_parameters(&decl, &signature).unwrap();

        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "text");
        assert_eq!(specs[0].semantic_type, SemanticType::String);
        assert!(specs[0].required);

        let schema = tool_schema(&decl, &specs);
        assert_eq!(
            schema.input_schema["properties"],
            json!({"text": {"type": "string", "description": "Text to encode"}})
        );
        assert_eq!(schema.input_schema["required"], json!(["text"]));
    }

    #[test]
    fn test_explicit_map_follows_handler_order() {
        let decl = Declaration::tool("div", "Divide").with_parameters(json!({
            "b": {"type": "number", "description": "divisor", "required": true},
            "a": {"type": "number", "description": "dividend", "required": true}
        }));
        let signature = vec![
            FormalParameter::new::<i64>("a"),
            FormalParameter::new::<i64>("b"),
            FormalParameter::new::<i64>("precision").with_default(2),
        ];
        let specs = resolve_parameters(&decl, &signature).unwrap();

        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "precision"]);
        assert_eq!(specs[0].description, "dividend");
        assert!(!specs[2].required);
        assert_eq!(specs[2].default, Some(json!(2)));

        // The listing keeps the declared order, then the signature-only parameter.
        let schema = tool_schema(&decl, &specs);
        let properties: Vec<_> = schema.input_schema["properties"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(properties, vec!["b", "a", "precision"]);
        assert_eq!(schema.input_schema["required"], json!(["b", "a"]));
        assert_eq!(
            schema.input_schema["properties"]["precision"],
            json!({"type": "number", "default": 2})
        );
    }

    #[test]
    fn test_explicit_only_names_come_after_signature() {
        let decl = Declaration::prompt("greet", "Greet").with_parameters(json!({
            "tone": {"type": "string"},
            "name": {"description": "Who to greet", "required": true}
        }));
        let signature = vec![
            FormalParameter::new::<String>("name"),
            FormalParameter::new::<String>("greeting").with_default("Hi"),
        ];
        let specs = resolve_parameters(&decl, &signature).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["name", "greeting", "tone"]);

        let arguments: Vec<_> = prompt_schema(&decl, &specs)
            .arguments
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(arguments, vec!["tone", "name", "greeting"]);
    }

    #[test]
    fn test_explicit_entry_inherits_from_signature() {
        let decl = Declaration::tool("sum", "Add").with_parameters(json!({
            "num1": {"description": "first"},
            "num2": {"description": "second"},
            "note": {"type": "string"}
        }));
        let specs = resolve_parameters(&decl, &sum_signature()).unwrap();

        assert_eq!(specs[0].semantic_type, SemanticType::Number);
        assert!(specs[0].required);
        assert!(!specs[1].required);
        assert_eq!(specs[1].default, Some(json!(0)));
        // Not in the signature and no flag: optional.
        assert!(!specs[2].required);
        assert_eq!(required_names(&specs), vec!["num1"]);
    }

    #[test]
    fn test_explicit_integer_and_array_types_narrow() {
        let decl = Declaration::tool("t", "").with_parameters(json!({
            "count": {"type": "integer"},
            "items": {"type": "array"}
        }));
        let specs = resolve_parameters(&decl, &[]).unwrap();
        assert_eq!(specs[0].semantic_type, SemanticType::Number);
        assert_eq!(specs[1].semantic_type, SemanticType::Object);
        // The schema keeps the declared names verbatim.
        let schema = tool_schema(&decl, &specs);
        assert_eq!(schema.input_schema["properties"]["count"]["type"], "integer");
    }

    #[test]
    fn test_malformed_explicit_maps() {
        let cases = [
            json!("not a map"),
            json!({"x": "string"}),
            json!({"x": {"type": "datetime"}}),
            json!({"x": {"required": "yes"}}),
            json!({"x": {"type": 3}}),
        ];
        for parameters in cases {
            let decl = Declaration::tool("bad", "").with_parameters(parameters.clone());
            let err = resolve_parameters(&decl, &[]).unwrap_err();
            assert!(
                matches!(err, RegistryError::MalformedParameter { ref operation, .. } if operation == "bad"),
                "{parameters} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_prompt_schema_from_explicit_arguments() {
        let decl = Declaration::prompt("greeting", "Build a greeting").with_parameters(json!({
            "name": {"description": "Who to greet", "required": true}
        }));
        let specs = resolve_parameters(&decl, &[FormalParameter::new::<String>("name")]).unwrap();
        let schema = prompt_schema(&decl, &specs);

        assert_eq!(
            schema.arguments,
            vec![PromptArgument {
                name: "name".into(),
                description: "Who to greet".into(),
                required: true,
            }]
        );
    }

    #[test]
    fn test_resource_descriptor() {
        let decl = Declaration::resource("example://greeting", "Greeting Text", "A greeting");
        let descriptor = resource_descriptor(&decl);
        assert_eq!(descriptor.uri, "example://greeting");
        assert_eq!(descriptor.name, "Greeting Text");
        assert_eq!(descriptor.mime_type, "text/plain");
    }

    #[test]
    fn test_required_is_subset_of_names() {
        let decl = Declaration::tool("t", "");
        let signature = vec![
            FormalParameter::new::<String>("a"),
            FormalParameter::new::<bool>("b").with_default(false),
            FormalParameter::new::<f64>("c"),
        ];
        let specs = resolve_parameters(&decl, &signature).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        let required = required_names(&specs);
        assert_eq!(required, vec!["a", "c"]);
        assert!(required.iter().all(|r| names.contains(r)));
    }
}
