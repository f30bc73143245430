// eapilink-api: wire layer for the switch command API (transports + session)

pub mod error;
pub mod session;
pub mod transport;

pub use error::{CommandError, Error};
pub use session::{Batch, Command, Encoding, Session};
pub use transport::{Credentials, TransportConfig, TransportKind};
