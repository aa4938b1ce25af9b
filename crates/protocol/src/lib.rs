//! Shared message types for hueport
//!
//! Defines the tagged `{tag, data}` envelope exchanged with the browser
//! application and the closed message sets for both directions.

pub mod envelope;
pub mod fields;
pub mod messages;

pub use envelope::*;
pub use fields::*;
pub use messages::*;
