//! Transport layer
//!
//! Messages are exchanged as newline-delimited JSON over a single
//! bidirectional byte stream, normally the process's stdin/stdout.
//!
//! Reading happens on the server loop. Writing is funnelled through one
//! writer task so that concurrent responses and notifications never
//! interleave within a line.

mod lines;

pub use lines::{MessageReader, MessageWriter, Outbound, spawn_writer};
