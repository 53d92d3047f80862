// Crate identity baked in at compile time

/// Version reported in the startup log.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, used alongside the device id for the MQTT client id.
pub const NAME: &str = env!("CARGO_PKG_NAME");
