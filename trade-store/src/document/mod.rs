//! Key-value/document backend.

mod adapter;
pub mod client;
pub mod layout;
mod memory;

pub use adapter::DocumentTradeAdapter;
pub use client::{Document, DocumentClient, DocumentCondition, DocumentFilter, FilterExpression, PutCondition};
pub use memory::MemoryDocumentClient;
