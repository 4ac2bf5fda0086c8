//! The tagged binary cell format used on every link in a veil overlay:
//! gateway to originator (in-process), originator to entry relay, relay
//! to relay, and relay/originator to directory.
//!
//! Every message is a single [`Cell`]: a type tag plus a small set of
//! optional fields, chosen by the tag, each explicitly length-prefixed.
//! The decoder rejects anything that doesn't fit this shape outright
//! rather than attempting to make sense of it; callers are expected to
//! close the connection on any [`CellError`].

mod cell;
mod codec;
pub mod directory;
mod err;
pub mod http_response;

pub use cell::{Cell, CellType, IV_LEN, MAX_CELL_PAYLOAD, MAX_SALT_LEN};
pub use codec::CellCodec;
pub use directory::DirectoryEntry;
pub use err::{CellError, Result};
pub use http_response::HttpResponse;
