//! Integration tests for the room relay.
//!
//! Drives the real `RoomController` through an in-memory connection
//! registry, without sockets or a running host.

#[cfg(test)]
mod harness;
