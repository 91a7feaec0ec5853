//! Receipt email delivery
//!
//! The notification sink of the receipt pipeline: a decoded [`Receipt`] is
//! rendered to plain text and handed to an [`EmailProvider`].
//!
//! ## Components
//!
//! - **Processor**: [`ReceiptNotifier`], the `StreamProcessor<Receipt>` sink
//! - **Providers**: [`HttpMailProvider`] (JSON mail API) and [`MockEmailProvider`]
//! - **Config**: [`MailConfig`] loaded from `RECEIPT_MAIL_*`
//!
//! ## Usage
//!
//! ```ignore
//! use email::{HttpMailProvider, MailConfig, ReceiptNotifier};
//! use stream_worker::{StreamWorker, WorkerConfig};
//!
//! let mail = MailConfig::from_env()?;
//! let provider = Arc::new(HttpMailProvider::from_config(&mail)?);
//! let notifier = ReceiptNotifier::new(provider, &mail.from);
//! let mut worker = StreamWorker::new(reader, Arc::new(notifier), config);
//! worker.run(shutdown_rx).await?;
//! ```
//!
//! [`Receipt`]: domain_receipts::Receipt

pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod provider;

pub use config::{MailConfig, MailProviderKind};
pub use error::{NotificationError, NotificationResult};
pub use models::Email;
pub use processor::{ReceiptNotifier, receipt_subject};
pub use provider::{EmailProvider, HttpMailProvider, MockEmailProvider, SendResult};
