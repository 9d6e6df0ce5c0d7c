//! Eagerly started deferred values, and two ways of waiting on a group of
//! them: all at once, or one at a time in index order.

pub mod deferred;
pub mod demo;
pub mod error;
pub mod group;
pub mod timing;

pub use crate::{
    deferred::{DeferredValue, Settled, Settler},
    error::{GroupFailure, SettlementFailure},
    group::DeferredGroup,
};
