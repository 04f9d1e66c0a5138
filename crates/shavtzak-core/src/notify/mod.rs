//! Outgoing email: roster reports and registration verification codes.

pub mod mailer;

pub use mailer::{report_message, verification_message, Mailer, SmtpSettings};
