//! CEX scoring core: payload validation and the Comfort / Efficiency /
//! Aesthetics aggregation. Pure and stateless.

pub mod aggregate;
pub mod schema;
pub mod validation;

pub use aggregate::*;
pub use schema::*;
pub use validation::*;
