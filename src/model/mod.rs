//! # Dataplane Resource Model
//!
//! Wire shapes for the configuration objects a transaction can edit.
//! Every field is optional and an unset field is omitted from the encoded
//! body, never sent as `null`: the server leaves omitted fields unchanged
//! on add and resets them to defaults on replace.
//!
//! Design rule: pure data. No I/O, no transport types, no async.

pub mod backend;
pub mod bind;
pub mod frontend;
pub mod keyword;
pub mod server;

pub use backend::{Backend, Balance};
pub use bind::Bind;
pub use frontend::Frontend;
pub use keyword::{BalanceAlgorithm, Mode, Toggle};
pub use server::Server;
