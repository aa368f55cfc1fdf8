//! Execution of client operations over the braided schema.

pub mod dispatcher;
mod executor;
pub mod values;

pub use executor::execute_operation;
