pub mod driver;
pub mod error;
pub mod frame;
pub mod proto;
pub mod sse;

pub use driver::{drive, ClientIdentity, DriveResult};
pub use error::{Error, Result};
pub use sse::DriveOutput;
