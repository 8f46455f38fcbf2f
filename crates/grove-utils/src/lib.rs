pub mod cancel;
pub mod error;
pub mod lockfile;
pub mod signature;

pub use bstr::{BStr, BString, ByteSlice, ByteVec};
pub use cancel::{CancellationToken, Cancelled};
pub use error::{LockError, UtilError};
pub use lockfile::LockFile;
pub use signature::{Signature, Time};

pub type Result<T> = std::result::Result<T, UtilError>;
