pub mod names;
pub mod normalize;
pub mod text;

pub use names::*;
pub use normalize::*;
pub use text::*;
