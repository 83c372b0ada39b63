pub mod device;
pub mod devices;
pub mod session;
pub mod state;
pub mod upload;

pub use device::{CaptureDevice, DeviceConstraints, DeviceStream, FacingMode, Frame};
pub use session::{CaptureEvent, CaptureOptions, CaptureSession};
pub use state::{CapturePhase, CaptureState};
pub use upload::{accept_upload, load_upload, UploadedFile};
