mod commands;
mod session;

pub use commands::ReaderCommand;
pub use session::{ReaderSession, SessionInfo, SmartPacerStatus};
