// Domain-specific error types
pub mod errors;

// Feedback records
pub mod feedback;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Time series value object
pub mod series;

// Signal transforms
pub mod transform;
