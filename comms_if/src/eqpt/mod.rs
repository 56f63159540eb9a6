//! # Equipment Interface
//!
//! This module defines the interface structures which will be sent to or received from equipment.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod drive;
pub mod mocap;
