mod blocks;
mod context;
mod critique;
pub mod evaluator;
mod prompts;
mod sections;

pub use blocks::{find_fenced_json, find_outer_object, find_tagged_block, TaggedBlock};
pub use context::DocumentContext;
pub use critique::{Critique, CritiqueParseError, Issue, Severity};
pub use evaluator::{AgentCritic, Critic, CriticError};
pub use prompts::CriticPrompts;
pub use sections::{find_missing_sections, SectionCheckingCritic};
