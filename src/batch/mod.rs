//! Record batching and the pinned HTTPS upload.

pub mod buffer;
pub mod fingerprint;
pub mod http;
pub mod uploader;

pub use buffer::BatchBuffer;
pub use fingerprint::{Fingerprint, TrustCheck};
pub use uploader::{BatchUploader, UploadOutcome, UploadSettings, UploadState};
