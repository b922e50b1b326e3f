//! 辩论提示词：轮次发言与赛后总结

use crate::session::{Participant, Side, Turn};

/// 转录行：`{model} ({side}): {content}`
fn render_transcript(transcript: &[Turn], separator: &str) -> String {
    transcript
        .iter()
        .map(|t| format!("{} ({}): {}", t.participant, t.role_label, t.content))
        .collect::<Vec<_>>()
        .join(separator)
}

/// 当前发言者的提示词：主题 + 完整转录（为空时省略）+ 立场指令
pub fn turn_prompt(subject: &str, transcript: &[Turn], actor: &Participant) -> String {
    let side = actor.side.unwrap_or(Side::Affirmative);
    let mut prompt = format!("Subject: {subject}");

    if !transcript.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&render_transcript(transcript, "\n"));
    }

    prompt.push_str(&format!(
        "\n\nYou are {}. Based on the conversation above, argue from the {} side: \
         rebut your opponent's claims or reinforce your own position.",
        actor.name, side
    ));
    prompt
}

/// 辩论结束后的总结提示词
pub fn summary_prompt(subject: &str, transcript: &[Turn]) -> String {
    format!(
        "Subject: {subject}\n\n\
         Debate transcript:\n{}\n\n\
         Summarize the debate above objectively, using this structure:\n\n\
         1. **Main points**: the key issues the debate covered\n\
         2. **Affirmative arguments**: the main claims and evidence of the affirmative side\n\
         3. **Negative arguments**: the main claims and evidence of the negative side\n\
         4. **Conclusion**: the overall flow of the debate and its outcome\n\n\
         Write the answer in markdown.",
        render_transcript(transcript, "\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript_omits_history() {
        let actor = Participant::debater("gpt-4o", Side::Affirmative);
        let prompt = turn_prompt("Remote work", &[], &actor);
        assert_eq!(
            prompt.split("\n\n").count(),
            2,
            "only subject and instruction expected: {prompt}"
        );
        assert!(prompt.starts_with("Subject: Remote work\n\nYou are gpt-4o."));
        assert!(prompt.contains("Affirmative side"));
    }

    #[test]
    fn test_transcript_rendered_in_order_verbatim() {
        let transcript = vec![
            Turn::new("a", "Affirmative", "First **claim**", None),
            Turn::new("b", "Negative", "Counter: no.", None),
        ];
        let actor = Participant::debater("a", Side::Affirmative);
        let prompt = turn_prompt("S", &transcript, &actor);
        let first = prompt.find("a (Affirmative): First **claim**").unwrap();
        let second = prompt.find("b (Negative): Counter: no.").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_negative_actor_side() {
        let actor = Participant::debater("claude", Side::Negative);
        assert!(turn_prompt("S", &[], &actor).contains("from the Negative side"));
    }

    #[test]
    fn test_summary_prompt_structure() {
        let transcript = vec![Turn::new("a", "Affirmative", "Yes.", None)];
        let prompt = summary_prompt("S", &transcript);
        assert!(prompt.contains("a (Affirmative): Yes."));
        assert!(prompt.contains("Negative arguments"));
    }
}
