mod prompts;
mod protected;
mod refiner;
mod revision;

pub use prompts::RefinerPrompts;
pub use protected::{verify_protected_fields, ProtectedFieldViolation};
pub use refiner::{AgentRefiner, CorrectionRefiner, Refiner, RefinerError};
pub use revision::{extract_revision, RevisionParseError};
