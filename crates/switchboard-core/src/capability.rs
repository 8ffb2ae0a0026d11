//! Capability descriptors: static operation tables.
//!
//! A capability is a Rust trait whose methods are callable over the wire. The
//! [`capability!`](crate::capability) macro declares the trait and, from the
//! same source, emits:
//!
//! - a `descriptor()` associated function returning a [`CapabilityDescriptor`]
//!   for any implementor, listing every operation with its wire name,
//!   parameter types, return type and a monomorphized invoker;
//! - an implementation of the trait for [`Proxy`](crate::Proxy), so a remote
//!   handler can be called through the same interface.

use crate::types::{is_allowed, TypeDesc};
use crate::{Result, RpcError};
use serde_json::Value;

/// Invoker for one operation: decodes positional params, calls the handler,
/// encodes the return value.
pub type Invoker<H> = fn(&H, Vec<Value>) -> Result<Value>;

/// One entry of a capability's operation table.
pub struct OperationDef<H> {
    /// Operation name as it appears on the wire.
    pub name: &'static str,
    pub params: Vec<TypeDesc>,
    pub returns: TypeDesc,
    pub invoke: Invoker<H>,
}

impl<H> OperationDef<H> {
    /// Check that every parameter and the return type are admissible.
    fn validate(&self) -> std::result::Result<(), String> {
        if !is_allowed(&self.returns) {
            return Err(format!(
                "unsupported return type '{}' for operation '{}'",
                self.returns, self.name
            ));
        }
        for param in &self.params {
            if !is_allowed(param) {
                return Err(format!(
                    "unsupported parameter type '{}' for operation '{}'",
                    param, self.name
                ));
            }
        }
        Ok(())
    }
}

/// Operation table of one capability, bound to a handler type `H`.
pub struct CapabilityDescriptor<H> {
    name: &'static str,
    operations: Vec<OperationDef<H>>,
}

impl<H> CapabilityDescriptor<H> {
    pub fn new(name: &'static str, operations: Vec<OperationDef<H>>) -> Self {
        Self { name, operations }
    }

    /// Capability (trait) name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[OperationDef<H>] {
        &self.operations
    }

    /// Fail with `InvalidCapability` if any operation uses an inadmissible type.
    pub fn validate(&self) -> Result<()> {
        for op in &self.operations {
            op.validate().map_err(|message| RpcError::InvalidCapability {
                capability: self.name.to_string(),
                message,
            })?;
        }
        Ok(())
    }

    pub(crate) fn into_operations(self) -> Vec<OperationDef<H>> {
        self.operations
    }
}

/// Declare a capability trait callable over JSON-RPC.
///
/// Methods take `&self` and owned arguments and return their declared type
/// wrapped in [`Result`](crate::Result). A method's wire name defaults to its
/// Rust name; `as "wireName"` overrides it.
///
/// ```rust,ignore
/// switchboard_core::capability! {
///     /// Integer arithmetic.
///     pub trait Calculator {
///         fn add(&self, a: i64, b: i64) -> i64;
///         fn divide(&self, a: f64, b: f64) -> f64;
///         fn reset(&self);
///         fn last_result(&self) -> i64 as "lastResult";
///     }
/// }
///
/// registry.register("calc", Arc::new(MyCalculator), vec![Calculator::descriptor()])?;
///
/// let calc = Proxy::new(transport, "calc");
/// assert_eq!(calc.add(2, 3)?, 5);
/// ```
#[macro_export]
macro_rules! capability {
    (@ret) => { () };
    (@ret $ret:ty) => { $ret };
    (@wire $method:ident) => { stringify!($method) };
    (@wire $method:ident $wire:literal) => { $wire };

    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident {
            $(
                $(#[$mmeta:meta])*
                fn $method:ident(&self $(, $arg:ident : $argty:ty)* $(,)?)
                    $(-> $ret:ty)? $(as $wire:literal)?;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name {
            $(
                $(#[$mmeta])*
                fn $method(&self $(, $arg: $argty)*)
                    -> $crate::Result<$crate::capability!(@ret $($ret)?)>;
            )*

            /// Operation table of this capability for the implementing type.
            fn descriptor() -> $crate::CapabilityDescriptor<Self>
            where
                Self: Sized,
            {
                $crate::CapabilityDescriptor::new(
                    stringify!($name),
                    vec![
                        $(
                            $crate::OperationDef {
                                name: $crate::capability!(@wire $method $($wire)?),
                                params: vec![
                                    $(<$argty as $crate::WireTyped>::type_desc()),*
                                ],
                                returns: <$crate::capability!(@ret $($ret)?)
                                    as $crate::WireTyped>::type_desc(),
                                invoke: {
                                    #[allow(unused_mut, unused_variables)]
                                    fn invoke<H: $name>(
                                        handler: &H,
                                        params: ::std::vec::Vec<$crate::Value>,
                                    ) -> $crate::Result<$crate::Value> {
                                        let mut params = params.into_iter();
                                        $(
                                            let $arg: $argty = $crate::protocol::from_wire(
                                                params.next().unwrap_or($crate::Value::Null),
                                            )?;
                                        )*
                                        let output = handler.$method($($arg),*)?;
                                        $crate::protocol::to_wire(&output)
                                    }
                                    invoke::<Self>
                                },
                            },
                        )*
                    ],
                )
            }
        }

        impl<T: $crate::ClientTransport> $name for $crate::Proxy<T> {
            $(
                fn $method(&self $(, $arg: $argty)*)
                    -> $crate::Result<$crate::capability!(@ret $($ret)?)>
                {
                    self.call_remote(
                        $crate::capability!(@wire $method $($wire)?),
                        vec![$($crate::protocol::to_wire(&$arg)?),*],
                    )
                }
            )*
        }
    };
}
