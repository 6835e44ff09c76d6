pub mod config;
pub mod error;
pub mod geometry;
pub mod guidance;
pub mod inference;
pub mod intent;
pub mod pipeline;
pub mod remote_model;
pub mod replay;
pub mod session;
pub mod similarity;
pub mod vision;

pub use error::LocateError;
pub use guidance::{Guidance, GuidanceEngine, Instruction};
pub use inference::Query;
