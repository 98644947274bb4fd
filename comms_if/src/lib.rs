//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the docking software: the network
//! abstractions and every message which crosses a transport.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for equipment (cameras, fiducials, the docking mechanism)
pub mod eqpt;

/// Network module
pub mod net;
