use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// Check `arguments` against a tool's input schema, returning every
/// violation joined into one message.
pub fn validate_arguments(input_schema: &Value, arguments: &Value) -> Result<(), String> {
    let schema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(input_schema)
        .map_err(|e| format!("Invalid tool schema: {}", e))?;

    if let Err(errors) = schema.validate(arguments) {
        let error_messages: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        return Err(error_messages.join("; "));
    }

    Ok(())
}
