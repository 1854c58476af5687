//! Domain events emitted by the sales and catalog aggregates.

pub mod event;

pub use event::Event;
