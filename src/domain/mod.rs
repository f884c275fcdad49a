pub mod error;
pub mod model;

pub use error::{AppError, Result};
pub use model::{
    DownloadSession, ErrorInfo, PageContext, RequestedFormat, SessionOutcome, Stage,
    StreamContainer, StreamDescriptor, VideoIdentity, VideoPart,
};
