//! Microblogging API on top of the HTTP dispatcher

mod session;

pub use session::{Credentials, DEFAULT_SERVER, SOURCE, Session, USER_AGENT};
