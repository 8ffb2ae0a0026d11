//! Centralized configuration for the Switchboard runtime.
//!
//! Fixed names and wire messages shared by the dispatcher, the introspection
//! service and the client proxy.

/// Runtime-level constants.
pub struct RpcConfig;

impl RpcConfig {
    /// Registry key of the built-in introspection service.
    pub const SYSTEM_KEY: &'static str = "system";

    /// Error text sent when the request envelope could not be parsed.
    pub const MALFORMED_REQUEST_MESSAGE: &'static str = "unable to read request";

    /// Message of a client-side error whose wire payload was structured.
    pub const STRUCTURED_ERROR_MESSAGE: &'static str = "error occurred, check payload";

    /// Separator between the registry key and the operation name.
    pub const METHOD_SEPARATOR: char = '.';

    /// Anchored pattern a method name must match: `identifier.identifier`.
    pub const METHOD_PATTERN: &'static str =
        r"^([_a-zA-Z][_a-zA-Z0-9]*)\.([_a-zA-Z][_a-zA-Z0-9]*)$";
}
