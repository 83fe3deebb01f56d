//! Wire-format type families: the public Responses API surface and the
//! upstream Chat Completions dialect it is translated to and from.

pub mod chat;
pub mod responses_api;
