pub mod core;
pub mod llm;
pub mod mock;
pub mod observability;
pub mod onnx_model;
pub mod repositories;
pub mod scaler;

pub use onnx_model::OnnxModel;
pub use repositories::InMemoryFeedbackRepository;
pub use scaler::Scaler;
