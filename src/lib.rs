//! nativebridge - call dispatch and executable artifacts for a refcounted
//! object runtime
//!
//! Generated native code calls back into the runtime through the dispatcher
//! (`interop`) and the primitives published in the bridge table (`bridge`).
//! Artifacts produced by the external generator are mapped and wrapped as
//! invocable objects by `compiled`.

pub mod bridge;
pub mod compiled;
pub mod config;
pub mod error;
pub mod interop;
pub mod logging;
pub mod objects;
pub mod runtime;

// Re-export core types
pub use bridge::BridgeTable;
pub use compiled::{attach_artifact, CompiledCode};
pub use config::Config;
pub use error::{ErrorKind, RtResult, RuntimeError};
pub use interop::{dispatch_call, RawOutcome};
pub use objects::{ObjRef, Ref, Slot};
pub use runtime::call_object;

/// Install logging and runtime settings from `config`, then publish the
/// bridge table
pub fn init(config: &Config) -> &'static BridgeTable {
    logging::init_with_config(config.log_config());
    config.apply();
    bridge::publish()
}

/// Runtime initialization for hosts that link the library directly
///
/// Reads settings from the environment only; returns 0 on success and -1
/// when the environment holds an invalid setting.
#[no_mangle]
pub extern "C" fn nativebridge_init() -> i32 {
    match Config::default().with_env() {
        Ok(config) => {
            init(&config);
            0
        }
        Err(e) => {
            logging::init();
            tracing::error!(event = "init_failed", error = %e, "Invalid runtime settings");
            -1
        }
    }
}

/// Flush buffered log output
#[no_mangle]
pub extern "C" fn nativebridge_cleanup() {
    logging::flush();
}
