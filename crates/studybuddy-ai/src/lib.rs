pub mod answers;
pub mod llm_factory;
pub mod llm_provider;
pub mod pipeline;
pub mod prompts;
pub mod questions;

// Cloud LLM providers
pub mod gemini_provider;
pub mod openai_llm_provider;

pub use answers::{AnswerRetriever, VectorIndex};
pub use gemini_provider::{GeminiConfig, GeminiProvider};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use openai_llm_provider::{OpenAIConfig, OpenAIProvider};
pub use pipeline::*;
pub use questions::*;
