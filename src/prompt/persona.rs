//! 专家人设
//!
//! 封闭枚举：每个变体对应一段人设描述与展示名；Custom 携带自由文本描述。
//! 外部以角色 ID（如 `fact_checker`、`custom_expert`）指定，未知 ID 回退为通用专家。

use serde::{Deserialize, Serialize};

pub const CUSTOM_ROLE_ID: &str = "custom_expert";

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "id", content = "description", rename_all = "snake_case")]
pub enum Persona {
    #[default]
    Expert,
    FactChecker,
    Philosopher,
    Scientist,
    Analyst,
    Economist,
    Strategist,
    Historian,
    Critic,
    TechExpert,
    LegalExpert,
    EthicalExpert,
    PsychologyExpert,
    EnvironmentalExpert,
    MedicalExpert,
    #[serde(rename = "custom_expert")]
    Custom(String),
}

impl Persona {
    /// 预置人设（不含 Custom），顺序即展示顺序
    pub const PRESETS: [Persona; 15] = [
        Persona::Expert,
        Persona::FactChecker,
        Persona::Philosopher,
        Persona::Scientist,
        Persona::Analyst,
        Persona::Economist,
        Persona::Strategist,
        Persona::Historian,
        Persona::Critic,
        Persona::TechExpert,
        Persona::LegalExpert,
        Persona::EthicalExpert,
        Persona::PsychologyExpert,
        Persona::EnvironmentalExpert,
        Persona::MedicalExpert,
    ];

    /// 由角色 ID 解析；`custom_expert` 缺少描述时返回 None
    pub fn from_role(role_id: &str, custom_description: Option<&str>) -> Option<Persona> {
        if role_id == CUSTOM_ROLE_ID {
            let description = custom_description.map(str::trim).filter(|d| !d.is_empty())?;
            return Some(Persona::Custom(description.to_string()));
        }
        Some(
            Self::PRESETS
                .iter()
                .find(|p| p.role_id() == role_id)
                .cloned()
                .unwrap_or_default(),
        )
    }

    pub fn role_id(&self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::FactChecker => "fact_checker",
            Self::Philosopher => "philosopher",
            Self::Scientist => "scientist",
            Self::Analyst => "analyst",
            Self::Economist => "economist",
            Self::Strategist => "strategist",
            Self::Historian => "historian",
            Self::Critic => "critic",
            Self::TechExpert => "tech_expert",
            Self::LegalExpert => "legal_expert",
            Self::EthicalExpert => "ethical_expert",
            Self::PsychologyExpert => "psychology_expert",
            Self::EnvironmentalExpert => "environmental_expert",
            Self::MedicalExpert => "medical_expert",
            Self::Custom(_) => CUSTOM_ROLE_ID,
        }
    }

    /// 展示名；自定义人设插入描述
    pub fn role_name(&self) -> String {
        let name = match self {
            Self::Expert => "Expert",
            Self::FactChecker => "Fact Checker",
            Self::Philosopher => "Philosopher",
            Self::Scientist => "Scientist",
            Self::Analyst => "Data Analyst",
            Self::Economist => "Economist",
            Self::Strategist => "Strategist",
            Self::Historian => "Historian",
            Self::Critic => "Critic",
            Self::TechExpert => "Technology Expert",
            Self::LegalExpert => "Legal Expert",
            Self::EthicalExpert => "Ethics Expert",
            Self::PsychologyExpert => "Psychology Expert",
            Self::EnvironmentalExpert => "Environmental Expert",
            Self::MedicalExpert => "Medical Expert",
            Self::Custom(description) => return format!("{description} Expert"),
        };
        name.to_string()
    }

    /// 写进提示词的人设描述
    pub fn description(&self) -> String {
        let text = match self {
            Self::Expert => "You are an expert on the given topic. Provide a concise professional analysis from several angles.",
            Self::FactChecker => "You are a fact checker. Verify the claims being made and give a concise, objective opinion.",
            Self::Philosopher => "You are a philosopher. Analyze the topic from ethical and philosophical perspectives and state your opinion concisely.",
            Self::Scientist => "You are a scientist. Analyze the topic with scientific method and data, and state your opinion concisely.",
            Self::Analyst => "You are a data analyst. Provide objective, statistics-based information grounded in quantitative data, concisely.",
            Self::Economist => "You are an economist. Analyze the topic through economic theory and market dynamics, and state your opinion concisely.",
            Self::Strategist => "You are a strategist. Analyze the long-term strategic implications of the topic and state your opinion concisely.",
            Self::Historian => "You are a historian. Analyze the topic through historical patterns and past cases, and state your opinion concisely.",
            Self::Critic => "You are a critic. Analyze the topic from a critical perspective and propose alternatives concisely.",
            Self::TechExpert => "You are a technology expert. Analyze the topic in terms of technology trends and innovation, and state your opinion concisely.",
            Self::LegalExpert => "You are a legal expert. Analyze the topic in terms of law and regulation, and state your opinion concisely.",
            Self::EthicalExpert => "You are an ethics expert. Analyze the topic in terms of ethics and social impact, and state your opinion concisely.",
            Self::PsychologyExpert => "You are a psychology expert. Analyze the topic in terms of human behavior and psychology, and state your opinion concisely.",
            Self::EnvironmentalExpert => "You are an environmental expert. Analyze the topic in terms of environmental impact and sustainability, and state your opinion concisely.",
            Self::MedicalExpert => "You are a medical expert. Analyze the topic from a medical and health perspective, and state your opinion concisely.",
            Self::Custom(description) => {
                return format!(
                    "You are a {description} expert. Analyze the topic from the perspective of your field and state your opinion concisely."
                )
            }
        };
        text.to_string()
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.role_name())
    }
}
