mod cookies;
mod file;
mod store;

pub use cookies::{Credentials, ParseError};
pub use file::{SessionFile, SessionFileError};
pub use store::{AuthError, SessionError, SessionStore};
