//! Core traits for the Spectrum DDNS system
//!
//! This module defines the abstract interfaces the core is written against.
//!
//! - [`HostResolver`]: Resolve a hostname to its current address and TTL
//! - [`SpectrumRegistry`]: List, create and update Spectrum applications in a zone

pub mod registry;
pub mod resolver;

pub use registry::{SpectrumApplication, SpectrumDns, SpectrumRegistry};
pub use resolver::{AddressObservation, HostResolver};
