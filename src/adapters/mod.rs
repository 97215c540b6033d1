/// LLM adapters.
///
/// Implement the `LLMProvider` trait to add support for other models.

pub mod openai;

pub use openai::OpenAIAdapter;
