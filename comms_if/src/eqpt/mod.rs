//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to equipment servers/clients.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod dock;
pub mod fiducial;
