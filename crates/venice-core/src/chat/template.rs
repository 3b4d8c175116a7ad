//! Prompt formatting.

use super::{Message, Role};

/// Renders a conversation into the single prompt string a model expects.
pub trait ChatTemplate {
    fn format(messages: &[Message]) -> String;
}

/// Mistral-style template:
///
/// `[SYSTEM_PROMPT]sys[/SYSTEM_PROMPT][INST]user[/INST]assistant</s>[INST]user[/INST]`
///
/// Nothing is appended after the final message.
pub struct Mistral;

impl Mistral {
    pub const SYSTEM_OPEN: &'static str = "[SYSTEM_PROMPT]";
    pub const SYSTEM_CLOSE: &'static str = "[/SYSTEM_PROMPT]";
    pub const INST_OPEN: &'static str = "[INST]";
    pub const INST_CLOSE: &'static str = "[/INST]";
    pub const EOS: &'static str = "</s>";
}

impl ChatTemplate for Mistral {
    fn format(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for message in messages {
            let content = message.content.as_str();
            match message.role {
                Role::System => {
                    prompt.push_str(Self::SYSTEM_OPEN);
                    prompt.push_str(content);
                    prompt.push_str(Self::SYSTEM_CLOSE);
                }
                Role::User => {
                    prompt.push_str(Self::INST_OPEN);
                    prompt.push_str(content);
                    prompt.push_str(Self::INST_CLOSE);
                }
                Role::Assistant => {
                    prompt.push_str(content);
                    prompt.push_str(Self::EOS);
                }
            }
        }
        prompt
    }
}

/// Format `messages` with the [`Mistral`] template.
pub fn format_prompt(messages: &[Message]) -> String {
    Mistral::format(messages)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_conversation_is_empty_prompt() {
        assert_eq!(format_prompt(&[]), "");
    }

    #[test]
    fn wraps_each_role() {
        let prompt = format_prompt(&[
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("bye"),
        ]);
        assert_eq!(
            prompt,
            "[SYSTEM_PROMPT]be brief[/SYSTEM_PROMPT][INST]hi[/INST]hello</s>[INST]bye[/INST]"
        );
    }

    #[test]
    fn preserves_message_order() {
        let prompt = format_prompt(&[
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ]);
        let first = prompt.find("first").unwrap();
        let second = prompt.find("second").unwrap();
        let third = prompt.find("third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn no_trailing_delimiter_after_last_message() {
        let prompt = format_prompt(&[Message::system("sys"), Message::user("question")]);
        assert!(prompt.ends_with("question[/INST]"));
        assert!(!prompt.ends_with(Mistral::EOS));
        assert!(!prompt.ends_with(Mistral::INST_OPEN));
    }

    #[test]
    fn assistant_turns_end_with_eos() {
        let prompt = format_prompt(&[Message::assistant("done")]);
        assert_eq!(prompt, "done</s>");
    }
}
