//! Canva Connect resource client
//!
//! Bearer-token calls the relay makes on a user's behalf: profile lookup,
//! folder listing, and asset upload with job polling. Responses are reshaped
//! into the small structures the frontend consumes.

pub mod client;
pub mod error;
pub mod folders;
pub mod profile;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod upload;

pub use client::{CanvaClient, DEFAULT_BASE_URL};
pub use error::{Error, INVALID_ACCESS_TOKEN, Result};
pub use folders::{AssetEntry, FolderEntry, FolderItem, FolderListing, ROOT_FOLDER};
pub use upload::{JobStatus, PollPolicy, UploadJob, UploadOutcome, upload_and_wait};
