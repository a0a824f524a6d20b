//! Client-side cart store and checkout for the storefront.
//!
//! Anonymous shoppers keep their cart in device storage; signed-in shoppers
//! use the server-side cart. [`CartStore`] hides the difference and keeps the
//! visible line list optimistically current.

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod storage;
pub mod store;

pub use backend::{CartBackend, CartMode, CartMutation};
pub use checkout::{Checkout, CheckoutRequest};
pub use config::{ClientConfig, InvalidBaseUrl};
pub use error::{CartError, CheckoutError};
pub use local::LocalCartBackend;
pub use remote::RemoteCartBackend;
pub use storage::{DeviceStorage, FileStorage, MemoryStorage};
pub use store::{CartStore, MergePolicy};
