// Startup wiring
pub mod bootstrap;

// Request input
pub mod parser;

// Model lookup and the shared inference path
pub mod model_registry;
pub mod pipeline;

// Explainability
pub mod explainer;
pub mod explanation;
