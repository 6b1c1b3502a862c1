use serde::Serialize;
use serde_json::Value;

/// Upper bound on a chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Checks a raw `POST /api/chat` body, collecting every violation.
pub fn validate_chat_request(body: &Value) -> ValidationResult {
    let mut errors = Vec::new();

    let Some(obj) = body.as_object() else {
        errors.push("Request body is required and must be a JSON object".to_string());
        return ValidationResult {
            is_valid: false,
            errors,
        };
    };

    match obj.get("message") {
        Some(Value::String(message)) => {
            if message.trim().is_empty() {
                errors.push("Message cannot be empty".to_string());
            } else if sanitize_input(message).is_empty() {
                errors.push("Message cannot consist only of markup characters".to_string());
            }
            if message.chars().count() > MAX_MESSAGE_CHARS {
                errors.push(format!(
                    "Message is too long (maximum {MAX_MESSAGE_CHARS} characters)"
                ));
            }
        }
        _ => errors.push("Message is required and must be a string".to_string()),
    }

    match obj.get("conversationHistory") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                let message_ok = entry.get("message").map(Value::is_string).unwrap_or(false);
                let is_user_ok = entry.get("isUser").map(Value::is_boolean).unwrap_or(false);
                if !message_ok {
                    errors.push(format!(
                        "Conversation history entry {i} must have a string 'message'"
                    ));
                }
                if !is_user_ok {
                    errors.push(format!(
                        "Conversation history entry {i} must have a boolean 'isUser'"
                    ));
                }
                if !matches!(entry.get("timestamp"), None | Some(Value::Null | Value::String(_))) {
                    errors.push(format!(
                        "Conversation history entry {i} has a non-string 'timestamp'"
                    ));
                }
            }
        }
        Some(_) => errors.push("Conversation history must be an array".to_string()),
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Strips markup brackets, trims, and caps the message length.
///
/// Brackets go first so that removing them can never expose new outer
/// whitespace; the result is a fixed point of this function.
pub fn sanitize_input(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let truncated: String = stripped.trim().chars().take(MAX_MESSAGE_CHARS).collect();
    truncated.trim_end().to_string()
}
