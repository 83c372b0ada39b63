pub mod still;

pub use still::{StillImageDevice, StillImageStream};
