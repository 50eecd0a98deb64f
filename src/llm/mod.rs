//! src/llm/mod.rs

use crate::errors::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod catalog;
pub mod copilot;
pub mod http;
pub mod request;
pub mod session;

pub use copilot::CopilotClient;
pub use request::Conversation;

/// The `LLMClient` trait defines the interface for a chat model client.
#[async_trait]
pub trait LLMClient: Send {
    /// Returns the name of the LLM client.
    fn name(&self) -> &str;
    /// Sends `prompt` after `history`, appending the exchange to `history` on success.
    async fn ask(
        &mut self,
        cancel: &CancellationToken,
        prompt: &str,
        history: &mut Conversation,
    ) -> Result<String>;
}

const COMMIT_INSTRUCTIONS: &str = "Write a concise and informative commit message for the change with commitizen convention. \
If multiple files are changed, provide a summary of the changes without being too specific per-file changes. \
Ensure the message is readable and clearly conveys the purpose of the changes. \
Make sure the title has maximum 50 characters and message is wrapped at 72 characters. \
DON'T WRAP IN CODE BLOCK.";

const TITLE_ONLY_INSTRUCTION: &str = "\n\nGenerate only the commit title.";

/// Diff in a fenced block, the commit rules, then the optional extras.
pub fn build_commit_prompt(diff: &str, title_only: bool, style_prompt: &str) -> String {
    let mut prompt = format!("```diff\n{diff}\n```\n\n{COMMIT_INSTRUCTIONS}");
    if title_only {
        prompt.push_str(TITLE_ONLY_INSTRUCTION);
    }
    prompt.push_str(style_prompt);
    prompt
}

/// Drops a surrounding code fence and blank lines the model added anyway.
pub fn clean_commit_message(raw: &str) -> String {
    let mut message = raw.trim();
    if let Some(rest) = message.strip_prefix("```") {
        // 跳过语言标记，例如 ```text
        message = match rest.split_once('\n') {
            Some((info, body)) if !info.contains(' ') => body,
            _ => rest,
        };
    }
    if let Some(rest) = message.strip_suffix("```") {
        message = rest;
    }
    message.trim_matches('\n').trim().to_string()
}

pub async fn generate_commit_message(
    client: &mut dyn LLMClient,
    cancel: &CancellationToken,
    diff: &str,
    title_only: bool,
    style_prompt: &str,
) -> Result<String> {
    log::info!("Calling {} to generate commit message", client.name());

    let prompt = build_commit_prompt(diff, title_only, style_prompt);
    let mut history = Conversation::new();
    let raw = client.ask(cancel, &prompt, &mut history).await?;

    Ok(clean_commit_message(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedClient {
        reply: String,
        prompts: Vec<String>,
    }

    #[async_trait]
    impl LLMClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn ask(
            &mut self,
            _cancel: &CancellationToken,
            prompt: &str,
            history: &mut Conversation,
        ) -> Result<String> {
            self.prompts.push(prompt.to_string());
            history.record_exchange(prompt, &self.reply);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn prompt_wraps_diff_and_appends_extras_in_order() {
        let prompt = build_commit_prompt("+fn main() {}", true, "\n\nWriting style funny.");

        assert!(prompt.starts_with("```diff\n+fn main() {}\n```\n\n"));
        let title = prompt.find(TITLE_ONLY_INSTRUCTION.trim()).unwrap();
        let style = prompt.find("Writing style funny.").unwrap();
        assert!(title < style);
        assert!(prompt.ends_with("Writing style funny."));
    }

    #[test]
    fn fences_and_blank_lines_are_stripped() {
        assert_eq!(clean_commit_message("```\nfeat: add x\n\nbody\n```"), "feat: add x\n\nbody");
        assert_eq!(clean_commit_message("```text\nfix: y\n```\n"), "fix: y");
        assert_eq!(clean_commit_message("\n\nchore: z\n"), "chore: z");
    }

    #[tokio::test]
    async fn commit_message_uses_a_fresh_conversation() {
        let mut client = CannedClient {
            reply: "```\nfeat(auth): add device login\n```".to_string(),
            prompts: Vec::new(),
        };

        let message = generate_commit_message(
            &mut client,
            &CancellationToken::new(),
            "diff --git a/x b/x",
            false,
            "",
        )
        .await
        .unwrap();

        assert_eq!(message, "feat(auth): add device login");
        assert_eq!(client.prompts.len(), 1);
        assert!(client.prompts[0].contains("diff --git a/x b/x"));
        assert!(!client.prompts[0].contains(TITLE_ONLY_INSTRUCTION.trim()));
    }
}
