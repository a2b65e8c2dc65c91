//! Application core — domain orchestration, zero direct I/O.
//!
//! The device loop, its shared context and the events it emits. All
//! interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod context;
pub mod device_loop;
pub mod events;
pub mod ports;

pub use device_loop::DeviceLoop;
