//! GridCrack core — everything the controller and the workers share.
//!
//! The candidate enumerator ([`candidates`]) defines the search space and
//! the index↔password bijection that lets workers crack disjoint chunks
//! without talking to each other.  [`messages`] and [`wire`] define the
//! control-channel types and their byte-exact framing.  [`crypt`] wraps
//! the crypt(3)-style hash primitives behind a single entry point.

pub mod candidates;
pub mod crypt;
pub mod messages;
pub mod wire;
