//! Criteria compilers, one per backend.
//!
//! Every compiler reads the same [`SearchCriteria`](trade_domain::SearchCriteria):
//! a set predicate is an equality (or a half-open range for the timestamp
//! bounds), an unset predicate constrains nothing.

pub mod columnar;
pub mod document;
pub mod sql;
