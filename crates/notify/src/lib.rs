//! Alarm notification delivery.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery channels
//! - SMTP email notifier and a disabled stand-in for unconfigured deployments
//! - Minijinja rendering of the alarm messages (triggered, stale, no data)

pub mod alert;
pub mod email;
pub mod templating;
pub mod traits;

pub use alert::{AlertContext, AlertKind};
pub use email::{DisabledNotifier, EmailNotifier};
pub use templating::TemplateRenderer;
pub use traits::{Notification, Notifier, NotifyError};
