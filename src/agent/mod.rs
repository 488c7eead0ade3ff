//! Agent/skill declarative data model and loader.

pub mod loader;
pub mod models;

pub use loader::{load_agents, load_skills};
pub use models::{
    AgentProfile, CliConfig, CliType, Interface, LaunchSpec, PromptInjectionMode, Skill,
    StdinPacing,
};
