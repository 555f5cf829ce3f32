//! LLM engine implementations for agentrelay.
//!
//! All engines implement the `agentrelay_core::LlmEngine` trait.
//! The factory selects the correct engine based on configuration.

pub mod factory;
pub mod mock;
pub mod openai_compat;

pub use factory::build_engine;
pub use mock::ScriptedEngine;
pub use openai_compat::OpenAiCompatEngine;
