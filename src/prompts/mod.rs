mod builder;
pub mod templates;

pub use builder::{ContextAssembler, Cue};
