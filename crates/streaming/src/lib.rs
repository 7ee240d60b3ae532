pub mod backoff;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod request;
pub mod synthetic;

pub use backoff::*;
pub use error::*;
pub use poller::*;
pub use protocol::*;
pub use request::*;
pub use synthetic::*;
