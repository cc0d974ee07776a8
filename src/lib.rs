pub mod error;
pub mod request;
pub mod validate;
pub mod value;
pub mod connector;
pub mod identity;
pub mod sink;
pub mod relay;
pub mod executor;
pub mod bridge;
pub mod config;

pub use bridge::{Bridge, ScalarReply};
pub use error::{BridgeError, BridgeResult, Field};
pub use executor::{CommandMode, ExecutionOutcome};
pub use request::{CommandTimeout, ExecutionRequest};
pub use value::{Column, Row, Value};
