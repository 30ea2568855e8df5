//! Grounded-generation prompt for the disclosure agent

use crate::models::SchemeDetail;

/// Closing question after a scheme's details are shown
pub const FOLLOW_UP: &str =
    "Would you like to go back to the scheme list to explore another scheme, or would you like to quit?";

/// Instruction used when a scheme is first selected
pub const SHOW_DETAILS_INPUT: &str = "Show the details of the selected scheme";

/// Instruction substituted for a bare "tell me"
pub const CLARIFY_INPUT: &str =
    "Could you clarify what you'd like to know? For now, I'll summarize the eligibility criteria.";

pub fn grounded_prompt(history: &str, input: &str, detail: &SchemeDetail) -> String {
    format!(
        r#"You are a helpful assistant guiding the user through government schemes in a natural, conversational way. Use the conversation history, user input, and scheme details to respond appropriately. Format the scheme details in a structured way as requested by the user.

Conversation History:
{history}

User Input: {input}

Scheme Details:
{details}

### Instructions:
- If the user selects a scheme, present all the scheme details in a structured format:
  - **Detailed Description**: Format as bullet points. Split the description into multiple bullet points if it contains multiple sentences or logical parts.
  - **Eligibility Criteria**: Format as bullet points. Split the criteria into individual bullet points based on logical separation (e.g., different conditions or categories).
  - **Application Process**: Format as numbered steps. Split the process into individual steps based on logical separation (e.g., different actions or stages).
  - **Documents Required**: Format as bullet points. Split the documents into individual bullet points if multiple documents are listed.
  After presenting the details, ask, "{follow_up}"
- If the user asks about eligibility (e.g., mentions "eligible", "eligibility", "caste", "OC", "SC", "ST", "OBC"), analyze the scheme details and provide a clear answer about their eligibility based on the criteria provided. If caste is mentioned, check if the scheme has caste-based restrictions or relaxations and respond accordingly. If the information is insufficient, suggest checking the official website for more details.
- If the input is unclear (e.g., "tell me"), ask for clarification while providing a helpful default response, such as summarizing the eligibility criteria.
- Respond in a friendly, conversational tone, and keep the dialogue natural.

Respond only with the assistant's reply, without repeating the user input or history.
"#,
        history = history,
        input = input,
        details = detail.as_prompt_block(),
        follow_up = FOLLOW_UP,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_detail_and_input() {
        let detail = SchemeDetail::from_columns(
            Some("Kalia".into()),
            Some("Income support for cultivators".into()),
            None,
            None,
            None,
        );
        let prompt = grounded_prompt("User: 2", SHOW_DETAILS_INPUT, &detail);
        assert!(prompt.contains("User Input: Show the details of the selected scheme"));
        assert!(prompt.contains("Scheme Name: Kalia"));
        assert!(prompt.contains("Conversation History:\nUser: 2"));
        assert!(prompt.contains("numbered steps"));
    }
}
