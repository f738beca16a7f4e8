use crate::types::ChatMessage;

pub const SYSTEM_PROMPT: &str = r#"You are a library classification expert specializing in the Dewey Decimal Classification (DDC) system. Your task is to analyze the provided text, which includes details about a book (title, author, and subject), and generate the appropriate DDC number based on the subject matter. Respond ONLY with a JSON object in the following exact format (no additional text, explanations, or deviations):
{
    "ddc_number": "000.0",
    "description": "Brief description"
}"#;

pub const TEMPERATURE: f64 = 0.1;
pub const MAX_TOKENS: u32 = 150;

/// System instruction followed by the caller's text.
pub fn build_messages(text: &str) -> [ChatMessage; 2] {
    [
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: format!("Classify this text: {text}"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_embeds_text_verbatim() {
        let [system, user] = build_messages(r#"Cosmos by "Carl Sagan""#);
        assert_eq!(system.role, "system");
        assert!(system.content.contains("Dewey Decimal Classification"));
        assert!(system.content.contains(r#""ddc_number""#));
        assert_eq!(user.role, "user");
        assert_eq!(user.content, r#"Classify this text: Cosmos by "Carl Sagan""#);
    }
}
