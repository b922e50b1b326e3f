//! 结论模式提示词：分阶段讨论与最终结论
//!
//! 阶段 0 提出初始观点；最后一个讨论阶段（max_stages - 1）寻求共识；其余阶段回应他人观点。
//! 所有讨论阶段完成后，由指定的最终模型基于完整转录给出结构化结论。

use crate::session::{Participant, Turn};

/// 生成阶段提示词所需的全部输入
#[derive(Debug, Clone, Copy)]
pub struct StagePromptContext<'a> {
    pub subject: &'a str,
    pub stage: u32,
    pub max_stages: u32,
    pub actor: &'a Participant,
    pub transcript: &'a [Turn],
}

/// 转录行：`{model} ({role}): {content}`
fn render_transcript(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .map(|t| format!("{} ({}): {}", t.participant, t.role_label, t.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 阶段指令：stage 0 总是初始观点，优先于收敛指令（max_stages == 1 时也是如此）；
/// 之后最后一个讨论阶段（max_stages - 1）要求收敛，其余阶段要求回应。
fn stage_instruction(stage: u32, max_stages: u32, subject: &str) -> String {
    if stage == 0 {
        format!(
            "Give your initial opinion on the topic in three sentences or fewer. \
             Focus on a core perspective the other experts can discuss.\n\n\
             Current topic of discussion: {subject}"
        )
    } else if stage + 1 == max_stages {
        "Based on the discussion so far, propose the most reasonable direction for a conclusion \
         in three sentences or fewer. Mention what you agree with in the other experts' opinions \
         and point toward a shared final conclusion."
            .to_string()
    } else {
        "Give your reaction to the previous opinions in three sentences or fewer. \
         Briefly note what you agree with and any perspective you would add."
            .to_string()
    }
}

/// 讨论阶段提示词
pub fn stage_prompt(ctx: &StagePromptContext<'_>) -> String {
    let persona = ctx.actor.persona();
    let mut prompt = format!("Subject: {}\n\n{}\n\n", ctx.subject, persona.description());

    if !ctx.transcript.is_empty() {
        prompt.push_str(&format!(
            "Previous discussion:\n\n{}\n\n",
            render_transcript(ctx.transcript)
        ));
    }

    prompt.push_str(&format!(
        "You are the {} model, taking part in this discussion from the perspective of a {}.\n\n\
         {}\n\n\
         Answer in three sentences or fewer. Skip long explanations and greetings; state only the essentials.",
        ctx.actor.name,
        persona.role_name(),
        stage_instruction(ctx.stage, ctx.max_stages, ctx.subject)
    ));
    prompt
}

/// 最终结论提示词
pub fn synthesis_prompt(
    subject: &str,
    final_model: &str,
    transcript: &[Turn],
    require_evidence: bool,
) -> String {
    let mut prompt = format!("Subject: {subject}\n\n");
    if !transcript.is_empty() {
        prompt.push_str(&format!(
            "Expert discussion so far:\n\n{}\n\n",
            render_transcript(transcript)
        ));
    }
    prompt.push_str(&format!(
        "You are the {final_model} model. Based on the conversation between the experts above, \
         derive the final conclusion.\n\n"
    ));
    prompt.push_str(
        "Make sure the conclusion clearly includes:\n\
         1. A brief summary of the main viewpoints raised in the discussion\n\
         2. The most persuasive argument and why\n\
         3. The final conclusion, stated explicitly in the form \"In conclusion, ...\"\n",
    );
    if require_evidence {
        prompt.push_str("4. The key evidence supporting this conclusion\n");
    }
    prompt.push_str(
        "\nThe conclusion must be objective and clear, and settle on the single most valid conclusion. \
         Avoid listing several possibilities.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Persona;

    fn ctx<'a>(actor: &'a Participant, transcript: &'a [Turn], stage: u32) -> StagePromptContext<'a> {
        StagePromptContext {
            subject: "Universal basic income",
            stage,
            max_stages: 3,
            actor,
            transcript,
        }
    }

    #[test]
    fn test_stage_zero_initial_opinion_without_history() {
        let actor = Participant::expert("gpt-4o", Persona::Economist);
        let prompt = stage_prompt(&ctx(&actor, &[], 0));
        assert!(prompt.contains("initial opinion"));
        assert!(prompt.contains("Current topic of discussion: Universal basic income"));
        assert!(!prompt.contains("Previous discussion"));
        assert!(prompt.contains(&Persona::Economist.description()));
    }

    #[test]
    fn test_middle_and_final_stage_instructions() {
        let actor = Participant::expert("gpt-4o", Persona::Critic);
        let transcript = vec![Turn::new("claude", "Historian", "History repeats.", Some(0))];
        let middle = stage_prompt(&ctx(&actor, &transcript, 1));
        assert!(middle.contains("reaction to the previous opinions"));
        assert!(middle.contains("claude (Historian): History repeats."));

        let last = stage_prompt(&ctx(&actor, &transcript, 2));
        assert!(last.contains("shared final conclusion"));
    }

    #[test]
    fn test_custom_persona_interpolated() {
        let actor = Participant::expert("gpt-4o", Persona::Custom("labor market".into()));
        let prompt = stage_prompt(&ctx(&actor, &[], 0));
        assert!(prompt.contains("You are a labor market expert."));
        assert!(prompt.contains("perspective of a labor market Expert"));
    }

    #[test]
    fn test_missing_persona_uses_generic_expert() {
        let actor = Participant {
            name: "gpt-4o".into(),
            side: None,
            persona: None,
        };
        let prompt = stage_prompt(&ctx(&actor, &[], 0));
        assert!(prompt.contains(&Persona::Expert.description()));
    }

    #[test]
    fn test_synthesis_evidence_toggle() {
        let transcript = vec![Turn::new("a", "Critic", "Too costly.", Some(2))];
        let with = synthesis_prompt("S", "judge", &transcript, true);
        let without = synthesis_prompt("S", "judge", &transcript, false);
        assert!(with.contains("4. The key evidence"));
        assert!(!without.contains("4. The key evidence"));
        assert!(with.contains("You are the judge model"));
        assert!(with.contains("a (Critic): Too costly."));
        assert!(with.contains("In conclusion, ..."));
    }

    #[test]
    fn test_first_stage_is_initial_even_with_single_stage() {
        let only = stage_instruction(0, 1, "T");
        assert!(only.contains("initial opinion"));
        assert!(!only.contains("shared final conclusion"));
        assert!(stage_instruction(1, 2, "T").contains("shared final conclusion"));
        assert!(stage_instruction(1, 3, "T").contains("reaction"));
    }

}
