// # spectrum-ddns-core
//
// Core library for keeping a Cloudflare Spectrum application's origin in sync
// with the address behind a dynamic DNS hostname.
//
// ## Architecture Overview
//
// - **HostResolver**: Trait for resolving a hostname to an address and TTL
// - **SpectrumRegistry**: Trait for listing, creating and updating Spectrum applications
// - **IpPoller**: TTL-paced resolution loop producing an ordered stream of poll events
// - **SpectrumReconciler**: Idempotent create-or-update of the application for a domain
// - **SpectrumEngine**: Orchestrates poller → reconciler and applies the failure policy
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Wire protocols live in their own crates behind traits
// 2. **Single Ordered Stream**: Observations and failures share one tagged stream
// 3. **Idempotency**: The registry is written only when the origin actually differs
// 4. **Explicit Configuration**: No component reads process-wide state
// 5. **Cooperative Cancellation**: Every suspension point in the poller observes a token

pub mod config;
pub mod engine;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod reconciler;
pub mod traits;

// Re-export core types for convenience
pub use config::SpectrumDdnsConfig;
pub use engine::{EngineEvent, EngineExit, EngineSettings, ResolutionFailurePolicy, SpectrumEngine};
pub use error::{Error, Result};
pub use poller::{IpPoller, PollEvent, PollStream};
pub use protocol::{ApplicationIdentity, OriginAddress, SpectrumProtocol};
pub use reconciler::{ReconcileOutcome, SpectrumReconciler};
pub use traits::{AddressObservation, HostResolver, SpectrumApplication, SpectrumRegistry};
