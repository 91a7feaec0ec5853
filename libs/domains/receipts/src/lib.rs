//! Receipts Domain
//!
//! Fiscal receipts from HTTP intake to the rendered email body.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← POST /v1/receipt
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Wire → domain, produce to the receipts topic
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Receipt, Product, Tax + totals
//! └─────────────┘
//! ```
//!
//! On the consumer side, [`template::render_text`] turns a decoded [`Receipt`]
//! into the plain text body sent to the customer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_receipts::{handlers, ReceiptService};
//!
//! let service = ReceiptService::new(producer, Duration::from_secs(3));
//! let router = handlers::router(Arc::new(service));
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod money;
pub mod service;
pub mod streams;
pub mod template;
pub mod wire;

pub use error::{ReceiptError, ReceiptResult};
pub use models::{Product, Receipt, Tax};
pub use service::ReceiptService;
pub use streams::ReceiptStream;
pub use wire::{ProductRequest, ReceiptRequest};
