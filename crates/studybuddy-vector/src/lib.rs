pub mod embedding;
pub mod error;
#[cfg(feature = "faiss")]
pub mod faiss_store;
pub mod gemini_provider;
pub mod loader;
pub mod openai_provider;
pub mod prep;
pub mod providers;
pub mod store;
pub mod tokenizer;

pub use embedding::*;
pub use error::*;
#[cfg(feature = "faiss")]
pub use faiss_store::*;
pub use gemini_provider::*;
pub use loader::*;
pub use openai_provider::*;
pub use prep::*;
pub use providers::*;
pub use store::*;
pub use tokenizer::*;
