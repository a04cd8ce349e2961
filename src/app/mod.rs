//! Application core.
//!
//! [`ports`] defines the hardware boundary every component is written
//! against.  [`script`] and [`bindings`] are the surface the scripting
//! runtime calls into: loosely-typed values in, values or exceptions out.

pub mod bindings;
pub mod ports;
pub mod script;
