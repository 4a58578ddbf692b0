//! ServiceExport Store Client
//!
//! Creates and deletes `ServiceExport` objects by the identity of the
//! Service they export, and classifies API failures into the outcomes the
//! controller cares about.
//!
//! # Example
//!
//! ```no_run
//! use export_client::{ExportKey, ExportStoreClient, KubeExportClient, StoreError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeExportClient::new(kube::Client::try_default().await?);
//! let key = ExportKey::new("shop", "checkout");
//!
//! match client.create(&key).await {
//!     Ok(()) | Err(StoreError::AlreadyExists) => println!("{key} exported"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeExportClient;
pub use error::StoreError;
pub use models::ExportKey;
pub use store_trait::ExportStoreClient;
#[cfg(feature = "test-util")]
pub use mock::{MockExportClient, StoreCall};
