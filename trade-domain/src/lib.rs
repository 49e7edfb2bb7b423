//! Trade Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the trade aggregate, search criteria, and the DTO boundary.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod criteria;
pub mod dto;
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use criteria::{CriteriaField, SearchCriteria};
pub use dto::{PeriodDto, TradeDto};
pub use entities::{TradeAggregate, TradeHeader, TradePeriod};
pub use value_objects::{DomainError, TradeId};
