//! Alert fan-out: subscriber notification over an email transport.

pub mod dispatcher;
pub mod mailer;

pub use dispatcher::{AlertDispatcher, SenderDirectory};
pub use mailer::{HttpMailer, Mailer, SenderIdentity};
