//! Alert delivery

pub mod alerts;
pub mod mailer;

pub use alerts::{dispatch_alerts, DeliveryReport};
pub use mailer::{parse_sender, LogMailer, Mailer, OutboxMailer, SmtpMailer};
