pub mod controller;
pub mod error;
pub mod validator;


// Re-export main types
pub use controller::{ControllerSettings, RotationController, RotationReport, RotationStep};
pub use error::RotationError;
pub use validator::{validate_document, validate_harvest, ValidationFailed, ValidationIssue};
