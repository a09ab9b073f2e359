pub mod llm_decode;
pub mod session;
pub mod story;
pub mod view;
