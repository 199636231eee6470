pub mod index;
pub mod transcribe;

pub use index::*;
pub use transcribe::*;
