pub mod integrator;
pub mod money;
pub mod rates;
