//! Envelope cryptography for relay payloads.
//!
//! Everything a peer publishes on a topic is sealed with AES-256-CBC and
//! authenticated with HMAC-SHA256 under the shared session key. The relay
//! only ever sees the hex-encoded [`Envelope`](envelope::Envelope) triple.

pub mod envelope;

pub use envelope::Envelope;
