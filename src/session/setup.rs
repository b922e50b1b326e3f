//! 会话配置校验
//!
//! 调度器假定配置合法，所以所有检查都在这里完成：校验通过后得到 ValidatedSetup，
//! 再一次性写入 SessionStore。SessionPlan 是 CLI 使用的 TOML 会话文件。

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;
use crate::prompt::Persona;
use crate::session::{
    ConclusionSettings, Cursor, DebateSettings, Mode, ModeSettings, ModelId, Participant, Side,
    MAX_CONVERSATION_STAGES,
};

pub const DEFAULT_ANSWER_LIMIT: u32 = 3;

/// 校验通过的配置，可直接写入存储
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSetup {
    pub subject: String,
    pub settings: ModeSettings,
    pub roster: Vec<Participant>,
    pub cursor: Cursor,
}

fn validate_subject(subject: &str) -> Result<String, ConfigError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(ConfigError::EmptySubject);
    }
    Ok(subject.to_string())
}

fn validate_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let mut count = 0;
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateParticipant(name.to_string()));
        }
        count += 1;
    }
    if count < 2 {
        return Err(ConfigError::NotEnoughParticipants(count));
    }
    Ok(())
}

/// 非空且在名单内，返回下标
fn locate(model: Option<&str>, names: &[&str], missing: ConfigError) -> Result<usize, ConfigError> {
    let model = model.map(str::trim).filter(|m| !m.is_empty()).ok_or(missing)?;
    names
        .iter()
        .position(|n| *n == model)
        .ok_or_else(|| ConfigError::UnknownModel(model.to_string()))
}

#[derive(Clone, Debug, Default)]
pub struct DebateSetup {
    pub subject: String,
    pub roster: Vec<Participant>,
    pub start_model: Option<ModelId>,
    pub answer_limit: u32,
}

impl DebateSetup {
    pub fn new(subject: &str, roster: Vec<Participant>, start_model: Option<&str>, answer_limit: u32) -> Self {
        Self {
            subject: subject.to_string(),
            roster,
            start_model: start_model.map(str::to_string),
            answer_limit,
        }
    }

    pub fn validate(self) -> Result<ValidatedSetup, ConfigError> {
        let subject = validate_subject(&self.subject)?;
        validate_names(self.roster.iter().map(|p| p.name.as_str()))?;
        if let Some(p) = self.roster.iter().find(|p| p.side.is_none()) {
            return Err(ConfigError::MissingSide(p.name.clone()));
        }
        if self.answer_limit == 0 {
            return Err(ConfigError::InvalidAnswerLimit);
        }
        let names: Vec<&str> = self.roster.iter().map(|p| p.name.as_str()).collect();
        let start = locate(self.start_model.as_deref(), &names, ConfigError::MissingStartModel)?;
        let start_model = self.roster[start].name.clone();

        Ok(ValidatedSetup {
            subject,
            settings: ModeSettings::Debate(DebateSettings {
                start_model,
                answer_limit: self.answer_limit,
            }),
            roster: self.roster,
            cursor: Cursor {
                participant_index: start,
                stage: 0,
            },
        })
    }
}

#[derive(Clone, Debug)]
pub struct ConclusionSetup {
    pub subject: String,
    pub roster: Vec<ModelId>,
    pub final_model: Option<ModelId>,
    pub require_evidence: bool,
    /// 模型 → 角色 ID；未分配的模型使用通用专家
    pub role_assignments: HashMap<ModelId, String>,
    /// 模型 → 自定义角色描述（仅 custom_expert 使用）
    pub custom_role_descriptions: HashMap<ModelId, String>,
    pub max_stages: u32,
}

impl Default for ConclusionSetup {
    fn default() -> Self {
        Self {
            subject: String::new(),
            roster: Vec::new(),
            final_model: None,
            require_evidence: false,
            role_assignments: HashMap::new(),
            custom_role_descriptions: HashMap::new(),
            max_stages: MAX_CONVERSATION_STAGES,
        }
    }
}

impl ConclusionSetup {
    pub fn validate(self) -> Result<ValidatedSetup, ConfigError> {
        let subject = validate_subject(&self.subject)?;
        validate_names(self.roster.iter().map(String::as_str))?;
        if self.max_stages == 0 {
            return Err(ConfigError::InvalidStageCount);
        }
        let names: Vec<&str> = self.roster.iter().map(String::as_str).collect();
        let final_index = locate(self.final_model.as_deref(), &names, ConfigError::MissingFinalModel)?;
        let final_model = self.roster[final_index].clone();

        let mut roster = Vec::with_capacity(self.roster.len());
        for name in &self.roster {
            let role = self.role_assignments.get(name).map(String::as_str).unwrap_or("expert");
            let description = self.custom_role_descriptions.get(name).map(String::as_str);
            let persona = Persona::from_role(role, description)
                .ok_or_else(|| ConfigError::MissingCustomRoleDescription(name.clone()))?;
            roster.push(Participant::expert(name, persona));
        }

        Ok(ValidatedSetup {
            subject,
            settings: ModeSettings::Conclusion(ConclusionSettings {
                final_model,
                require_evidence: self.require_evidence,
                max_stages: self.max_stages,
            }),
            roster,
            cursor: Cursor::default(),
        })
    }
}

/// 会话文件中的参与者
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanParticipant {
    pub name: ModelId,
    #[serde(default)]
    pub side: Option<Side>,
    /// 角色 ID，如 `economist`、`custom_expert`
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// TOML 会话文件
///
/// ```toml
/// mode = "debate"
/// subject = "Remote work improves productivity"
/// start_model = "gpt-4o"
/// answer_limit = 2
///
/// [[participants]]
/// name = "gpt-4o"
/// side = "affirmative"
///
/// [[participants]]
/// name = "claude-3-5-haiku-latest"
/// side = "negative"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub mode: Mode,
    pub subject: String,
    pub participants: Vec<PlanParticipant>,
    #[serde(default)]
    pub start_model: Option<ModelId>,
    #[serde(default = "default_answer_limit")]
    pub answer_limit: u32,
    #[serde(default)]
    pub final_model: Option<ModelId>,
    #[serde(default)]
    pub require_evidence: bool,
    #[serde(default = "default_max_stages")]
    pub max_stages: u32,
}

fn default_answer_limit() -> u32 {
    DEFAULT_ANSWER_LIMIT
}

fn default_max_stages() -> u32 {
    MAX_CONVERSATION_STAGES
}

/// 按模式区分的待校验配置
#[derive(Clone, Debug)]
pub enum SessionSetup {
    Debate(DebateSetup),
    Conclusion(ConclusionSetup),
}

impl SessionSetup {
    pub fn validate(self) -> Result<ValidatedSetup, ConfigError> {
        match self {
            Self::Debate(setup) => setup.validate(),
            Self::Conclusion(setup) => setup.validate(),
        }
    }
}

impl SessionPlan {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidPlan(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidPlan(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn into_setup(self) -> SessionSetup {
        match self.mode {
            Mode::Debate => SessionSetup::Debate(DebateSetup {
                subject: self.subject,
                roster: self
                    .participants
                    .into_iter()
                    .map(|p| Participant {
                        name: p.name,
                        side: p.side,
                        persona: None,
                    })
                    .collect(),
                start_model: self.start_model,
                answer_limit: self.answer_limit,
            }),
            Mode::Conclusion => {
                let mut setup = ConclusionSetup {
                    subject: self.subject,
                    final_model: self.final_model,
                    require_evidence: self.require_evidence,
                    max_stages: self.max_stages,
                    ..Default::default()
                };
                for p in self.participants {
                    if let Some(role) = p.role {
                        setup.role_assignments.insert(p.name.clone(), role);
                    }
                    if let Some(description) = p.description {
                        setup.custom_role_descriptions.insert(p.name.clone(), description);
                    }
                    setup.roster.push(p.name);
                }
                SessionSetup::Conclusion(setup)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::CUSTOM_ROLE_ID;

    fn debaters() -> Vec<Participant> {
        vec![
            Participant::debater("gpt-4o", Side::Affirmative),
            Participant::debater("claude-3-5-haiku-latest", Side::Negative),
        ]
    }

    #[test]
    fn test_debate_cursor_starts_at_start_model() {
        let setup = DebateSetup::new("Topic", debaters(), Some("claude-3-5-haiku-latest"), 2)
            .validate()
            .unwrap();
        assert_eq!(setup.cursor, Cursor { participant_index: 1, stage: 0 });
    }

    #[test]
    fn test_debate_rejections() {
        assert_eq!(
            DebateSetup::new("  ", debaters(), Some("gpt-4o"), 2).validate().unwrap_err(),
            ConfigError::EmptySubject
        );
        assert_eq!(
            DebateSetup::new("T", debaters(), None, 2).validate().unwrap_err(),
            ConfigError::MissingStartModel
        );
        assert_eq!(
            DebateSetup::new("T", debaters(), Some("gemini"), 2).validate().unwrap_err(),
            ConfigError::UnknownModel("gemini".into())
        );
        assert_eq!(
            DebateSetup::new("T", debaters(), Some("gpt-4o"), 0).validate().unwrap_err(),
            ConfigError::InvalidAnswerLimit
        );
        let single = vec![Participant::debater("gpt-4o", Side::Affirmative)];
        assert_eq!(
            DebateSetup::new("T", single, Some("gpt-4o"), 1).validate().unwrap_err(),
            ConfigError::NotEnoughParticipants(1)
        );
        let sideless = vec![
            Participant::debater("a", Side::Affirmative),
            Participant { name: "b".into(), side: None, persona: None },
        ];
        assert_eq!(
            DebateSetup::new("T", sideless, Some("a"), 1).validate().unwrap_err(),
            ConfigError::MissingSide("b".into())
        );
    }

    #[test]
    fn test_duplicate_participants_rejected() {
        let setup = ConclusionSetup {
            subject: "T".into(),
            roster: vec!["a".into(), "a".into()],
            final_model: Some("a".into()),
            ..Default::default()
        };
        assert_eq!(setup.validate().unwrap_err(), ConfigError::DuplicateParticipant("a".into()));
    }

    #[test]
    fn test_conclusion_roles_resolved() {
        let mut setup = ConclusionSetup {
            subject: "Four-day week".into(),
            roster: vec!["a".into(), "b".into(), "c".into()],
            final_model: Some("b".into()),
            require_evidence: true,
            ..Default::default()
        };
        setup.role_assignments.insert("a".into(), "economist".into());
        setup.role_assignments.insert("b".into(), CUSTOM_ROLE_ID.into());
        setup.custom_role_descriptions.insert("b".into(), "labor law".into());

        let validated = setup.validate().unwrap();
        assert_eq!(validated.roster[0].persona(), Persona::Economist);
        assert_eq!(validated.roster[1].persona(), Persona::Custom("labor law".into()));
        assert_eq!(validated.roster[2].persona(), Persona::Expert);
        assert_eq!(validated.cursor, Cursor::default());
        match validated.settings {
            ModeSettings::Conclusion(c) => {
                assert_eq!(c.final_model, "b");
                assert_eq!(c.max_stages, MAX_CONVERSATION_STAGES);
                assert!(c.require_evidence);
            }
            other => panic!("unexpected settings: {other:?}"),
        }
    }

    #[test]
    fn test_custom_role_without_description_rejected() {
        let mut setup = ConclusionSetup {
            subject: "T".into(),
            roster: vec!["a".into(), "b".into()],
            final_model: Some("a".into()),
            ..Default::default()
        };
        setup.role_assignments.insert("b".into(), CUSTOM_ROLE_ID.into());
        assert_eq!(
            setup.validate().unwrap_err(),
            ConfigError::MissingCustomRoleDescription("b".into())
        );
    }

    #[test]
    fn test_missing_final_model() {
        let setup = ConclusionSetup {
            subject: "T".into(),
            roster: vec!["a".into(), "b".into()],
            final_model: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(setup.validate().unwrap_err(), ConfigError::MissingFinalModel);
    }

    #[test]
    fn test_plan_from_toml() {
        let plan = SessionPlan::from_toml_str(
            r#"
            mode = "conclusion"
            subject = "Should cities ban cars downtown?"
            final_model = "gpt-4o"
            require_evidence = true

            [[participants]]
            name = "gpt-4o"
            role = "strategist"

            [[participants]]
            name = "claude-3-7-sonnet-latest"
            role = "custom_expert"
            description = "urban planning"
            "#,
        )
        .unwrap();
        assert_eq!(plan.answer_limit, DEFAULT_ANSWER_LIMIT);
        let validated = plan.into_setup().validate().unwrap();
        assert_eq!(validated.roster.len(), 2);
        assert_eq!(validated.roster[1].persona().role_name(), "urban planning Expert");
        match validated.settings {
            ModeSettings::Conclusion(c) => {
                assert_eq!(c.final_model, "gpt-4o");
                assert!(c.require_evidence);
                assert_eq!(c.max_stages, MAX_CONVERSATION_STAGES);
            }
            other => panic!("expected conclusion settings, got {other:?}"),
        }
    }

    #[test]
    fn test_debate_plan_from_toml() {
        let plan = SessionPlan::from_toml_str(
            r#"
            mode = "debate"
            subject = "Remote work boosts productivity"
            start_model = "claude-3-5-haiku-latest"
            answer_limit = 2

            [[participants]]
            name = "gpt-4o"
            side = "affirmative"

            [[participants]]
            name = "claude-3-5-haiku-latest"
            side = "negative"
            "#,
        )
        .unwrap();
        assert!(matches!(plan.clone().into_setup(), SessionSetup::Debate(_)));
        let validated = plan.into_setup().validate().unwrap();
        assert_eq!(validated.cursor.participant_index, 1);
        assert!(matches!(
            validated.settings,
            ModeSettings::Debate(DebateSettings { answer_limit: 2, .. })
        ));
    }

    #[test]
    fn test_plan_parse_error() {
        let err = SessionPlan::from_toml_str("mode = \"quiz\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlan(_)));
    }
}
