pub mod column;
pub mod field;
pub mod source;

pub use column::*;
pub use field::*;
pub use source::*;
