pub mod aggregate;
pub mod error;
pub mod parse;
pub mod redact;
pub mod safe_name;
pub mod substitute;
pub mod types;

pub use aggregate::{aggregate, aggregate_at};
pub use error::DriftError;
pub use parse::{parse_file, parse_line};
pub use redact::mask_secrets;
pub use safe_name::{find_collisions, safe_name};
pub use substitute::substitute_variables;
pub use types::*;
