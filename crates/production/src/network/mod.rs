//! Transport collaborator, wire codec and an in-process network.

mod codec;
mod in_memory;
mod transport;

pub use codec::{decode_message, encode_message, CodecError};
pub use in_memory::{pump_inbox, InMemoryNetwork, InMemoryTransport, Inbox};
pub use transport::{Transport, TransportError};
