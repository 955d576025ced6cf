pub mod archive;
pub mod chat;
pub mod export;
pub mod onboard;
pub mod runtime;
pub mod status;
