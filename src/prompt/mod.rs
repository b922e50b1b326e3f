//! 提示词构建：纯函数，给定会话状态与阶段/角色生成提示词，无副作用

pub mod conclusion;
pub mod debate;
pub mod persona;

pub use conclusion::{stage_prompt, synthesis_prompt, StagePromptContext};
pub use debate::{summary_prompt, turn_prompt};
pub use persona::{Persona, CUSTOM_ROLE_ID};
