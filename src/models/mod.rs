pub mod analysis;
pub mod buffer;
pub mod reference;

pub use analysis::{FeatureTag, MatchResult, MatchStrength};
pub use buffer::{ImageBuffer, ImageSource};
pub use reference::{NewReference, ReferenceRecord};
