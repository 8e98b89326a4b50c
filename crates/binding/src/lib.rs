//! Contract bindings for the Mantle withdrawal claim flow.

pub mod mantle;
