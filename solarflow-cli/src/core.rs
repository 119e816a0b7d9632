pub mod aggregator;
pub mod combiner;
pub mod flow;
pub mod interval;
pub mod reconciler;
pub mod unit;
pub mod validation;
