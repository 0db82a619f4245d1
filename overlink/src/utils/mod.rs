//! Internal data structures.
//!
//! Exposes a [`Slab`] used for indexed storage with reuse of freed
//! slots.

mod slab;

pub(crate) use slab::Slab;
