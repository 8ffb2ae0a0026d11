//! Handler registry.
//!
//! Binds registry keys to handler instances and the operations they expose.
//! The registry is populated during a setup phase through `&mut self` and is
//! then frozen into a [`Dispatcher`](crate::Dispatcher), which only reads it.

use crate::capability::{CapabilityDescriptor, OperationDef};
use crate::config::RpcConfig;
use crate::types::{classify, WireType};
use crate::{Result, RpcError};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::info;

static METHOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RpcConfig::METHOD_PATTERN).unwrap());

/// Split `"key.operation"` into its two identifiers.
pub fn parse_method_name(method: &str) -> Result<(&str, &str)> {
    let caps = METHOD_PATTERN
        .captures(method)
        .ok_or_else(|| RpcError::InvalidMethodName {
            method: method.to_string(),
        })?;
    match (caps.get(1), caps.get(2)) {
        (Some(key), Some(op)) => Ok((key.as_str(), op.as_str())),
        _ => Err(RpcError::InvalidMethodName {
            method: method.to_string(),
        }),
    }
}

/// Coarse description of one operation, derived at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub name: String,
    pub params: Vec<WireType>,
    pub returns: WireType,
}

impl OperationDescriptor {
    fn from_def<H>(def: &OperationDef<H>) -> Self {
        Self {
            name: def.name.to_string(),
            params: def.params.iter().map(classify).collect(),
            returns: classify(&def.returns),
        }
    }

    /// Signature string: return type followed by parameter types.
    ///
    /// `"array"` for a nullary operation returning a sequence, `"int,int,int"`
    /// for a binary integer operation.
    pub fn signature(&self) -> String {
        std::iter::once(self.returns)
            .chain(self.params.iter().copied())
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

type BoundInvoker = Box<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// An operation bound to its handler instance.
pub struct Operation {
    descriptor: OperationDescriptor,
    invoke: BoundInvoker,
}

impl Operation {
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Run the operation with already-positioned wire params.
    pub fn invoke(&self, params: Vec<Value>) -> Result<Value> {
        (self.invoke)(params)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A registry key bound to a handler and its pooled operations.
#[derive(Debug)]
pub struct HandlerEntry {
    name: String,
    operations: Vec<Operation>,
    signatures: BTreeMap<String, BTreeSet<String>>,
}

impl HandlerEntry {
    fn new<H>(name: &str, handler: Arc<H>, descriptors: Vec<CapabilityDescriptor<H>>) -> Self
    where
        H: Send + Sync + 'static,
    {
        let signatures = Registry::signatures_of(&descriptors);

        let mut operations = Vec::new();
        for def in descriptors.into_iter().flat_map(|d| d.into_operations()) {
            let handler = Arc::clone(&handler);
            let invoke = def.invoke;
            operations.push(Operation {
                descriptor: OperationDescriptor::from_def(&def),
                invoke: Box::new(move |params| invoke(&handler, params)),
            });
        }

        Self {
            name: name.to_string(),
            operations,
            signatures,
        }
    }

    /// Registry key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations in declaration order across all descriptors.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Operation name → sorted, deduplicated signature strings.
    pub fn signatures(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.signatures
    }

    /// First operation with this name taking exactly `arity` params.
    ///
    /// Resolution is by arity only; same-name, same-arity operations resolve
    /// to whichever was declared first.
    pub fn resolve(&self, operation: &str, arity: usize) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.descriptor.name == operation && op.descriptor.arity() == arity)
    }
}

/// Signature catalog: registry key → operation name → signatures.
pub type Catalog = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Mapping of registry keys to handler entries.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, HandlerEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `handler`, exposing the operations of every descriptor.
    ///
    /// Fails with `DuplicateHandler` if the key is taken (the introspection
    /// key is always taken) and with `InvalidCapability` if no descriptor is
    /// given or one of them uses an inadmissible type. A failed registration
    /// leaves the registry untouched.
    pub fn register<H>(
        &mut self,
        key: &str,
        handler: Arc<H>,
        descriptors: Vec<CapabilityDescriptor<H>>,
    ) -> Result<()>
    where
        H: Send + Sync + 'static,
    {
        if key == RpcConfig::SYSTEM_KEY || self.entries.contains_key(key) {
            return Err(RpcError::DuplicateHandler {
                key: key.to_string(),
            });
        }
        if descriptors.is_empty() {
            return Err(RpcError::InvalidCapability {
                capability: key.to_string(),
                message: "at least one capability has to be given".to_string(),
            });
        }
        for descriptor in &descriptors {
            descriptor.validate()?;
        }

        let names: Vec<&str> = descriptors.iter().map(|d| d.name()).collect();
        info!("Registered handler '{}' ({})", key, names.join(", "));

        self.bind(key, handler, descriptors);
        Ok(())
    }

    /// Insert an entry without the reserved-key and admissibility checks.
    pub(crate) fn bind<H>(&mut self, key: &str, handler: Arc<H>, descriptors: Vec<CapabilityDescriptor<H>>)
    where
        H: Send + Sync + 'static,
    {
        let entry = HandlerEntry::new(key, handler, descriptors);
        self.entries.insert(key.to_string(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&HandlerEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every entry's signatures, ordered by key.
    pub fn catalog(&self) -> Catalog {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.signatures.clone()))
            .collect()
    }

    /// Signature table a set of descriptors would produce, without binding.
    pub(crate) fn signatures_of<H>(
        descriptors: &[CapabilityDescriptor<H>],
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut signatures: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for def in descriptors.iter().flat_map(|d| d.operations()) {
            let op = OperationDescriptor::from_def(def);
            signatures
                .entry(op.name.clone())
                .or_default()
                .insert(op.signature());
        }
        signatures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    crate::capability! {
        trait Counter {
            fn add(&self, a: i64, b: i64) -> i64;
            fn add_all(&self, values: Vec<i64>) -> i64 as "add";
        }
    }

    crate::capability! {
        trait Scaler {
            fn add(&self, a: f64, b: f64) -> f64;
            fn scale(&self, factor: f64) -> f64;
        }
    }

    crate::capability! {
        trait Indexer {
            fn index(&self, words: std::collections::HashSet<String>) -> i64;
        }
    }

    crate::capability! {
        trait Histogram {
            fn bucket(&self, width: i64) -> std::collections::HashMap<String, i64>;
        }
    }

    struct Math;

    impl Counter for Math {
        fn add(&self, a: i64, b: i64) -> Result<i64> {
            Ok(a + b)
        }

        fn add_all(&self, values: Vec<i64>) -> Result<i64> {
            Ok(values.iter().sum())
        }
    }

    impl Scaler for Math {
        fn add(&self, a: f64, b: f64) -> Result<f64> {
            Ok(a + b + 0.5)
        }

        fn scale(&self, factor: f64) -> Result<f64> {
            Ok(factor * 2.0)
        }
    }

    impl Indexer for Math {
        fn index(&self, words: std::collections::HashSet<String>) -> Result<i64> {
            Ok(words.len() as i64)
        }
    }

    #[test]
    fn test_parse_method_name() {
        assert_eq!(parse_method_name("calc.add").unwrap(), ("calc", "add"));
        assert_eq!(parse_method_name("_a1.b_2").unwrap(), ("_a1", "b_2"));
        assert!(parse_method_name("nodots").is_err());
        assert!(parse_method_name("1calc.add").is_err());
        assert!(parse_method_name("calc.add.extra").is_err());
        assert!(parse_method_name("calc.").is_err());
    }

    #[test]
    fn test_signature_string() {
        let op = OperationDescriptor {
            name: "add".into(),
            params: vec![WireType::Int, WireType::Int],
            returns: WireType::Int,
        };
        assert_eq!(op.signature(), "int,int,int");

        let op = OperationDescriptor {
            name: "listMethods".into(),
            params: vec![],
            returns: WireType::Array,
        };
        assert_eq!(op.signature(), "array");
    }

    #[test]
    fn test_register_and_resolve_by_arity() {
        let mut registry = Registry::new();
        registry
            .register("math", Arc::new(Math), vec![Counter::descriptor()])
            .unwrap();

        let entry = registry.get("math").unwrap();
        let binary = entry.resolve("add", 2).unwrap();
        assert_eq!(binary.invoke(vec![json!(2), json!(3)]).unwrap(), json!(5));

        let unary = entry.resolve("add", 1).unwrap();
        assert_eq!(unary.invoke(vec![json!([1, 2, 3])]).unwrap(), json!(6));

        assert!(entry.resolve("add", 3).is_none());
        assert!(entry.resolve("sub", 2).is_none());
    }

    #[test]
    fn test_pooled_descriptors_first_declared_wins() {
        let mut registry = Registry::new();
        registry
            .register(
                "math",
                Arc::new(Math),
                vec![Counter::descriptor(), Scaler::descriptor()],
            )
            .unwrap();

        let entry = registry.get("math").unwrap();
        let add = entry.resolve("add", 2).unwrap();
        assert_eq!(add.descriptor().returns, WireType::Int);

        let sigs: Vec<&String> = entry.signatures()["add"].iter().collect();
        assert_eq!(sigs, vec!["double,double,double", "int,array", "int,int,int"]);
        assert!(entry.signatures().contains_key("scale"));
    }

    #[test]
    fn test_duplicate_key_rejected_and_first_kept() {
        let mut registry = Registry::new();
        registry
            .register("math", Arc::new(Math), vec![Counter::descriptor()])
            .unwrap();

        let err = registry
            .register("math", Arc::new(Math), vec![Scaler::descriptor()])
            .unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler { .. }));

        let entry = registry.get("math").unwrap();
        assert!(entry.resolve("scale", 1).is_none());
        assert!(entry.resolve("add", 2).is_some());
    }

    #[test]
    fn test_system_key_is_reserved() {
        let mut registry = Registry::new();
        let err = registry
            .register("system", Arc::new(Math), vec![Counter::descriptor()])
            .unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_capability_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        let err = registry
            .register(
                "math",
                Arc::new(Math),
                vec![Counter::descriptor(), Indexer::descriptor()],
            )
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidCapability { .. }));
        assert!(!registry.contains("math"));
    }

    impl Histogram for Math {
        fn bucket(&self, width: i64) -> Result<std::collections::HashMap<String, i64>> {
            Ok(std::collections::HashMap::from([("0".to_string(), width)]))
        }
    }

    #[test]
    fn test_inadmissible_return_type_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .register("hist", Arc::new(Math), vec![Histogram::descriptor()])
            .unwrap_err();

        match err {
            RpcError::InvalidCapability { capability, message } => {
                assert_eq!(capability, "Histogram");
                assert!(message.contains("return type"));
                assert!(message.contains("bucket"));
            }
            other => panic!("Expected InvalidCapability, got: {:?}", other),
        }
        assert!(!registry.contains("hist"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_requires_a_descriptor() {
        let mut registry = Registry::new();
        let err = registry
            .register::<Math>("math", Arc::new(Math), vec![])
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidCapability { .. }));
    }

    #[test]
    fn test_catalog_is_keyed_and_sorted() {
        let mut registry = Registry::new();
        registry
            .register("scale", Arc::new(Math), vec![Scaler::descriptor()])
            .unwrap();
        registry
            .register("count", Arc::new(Math), vec![Counter::descriptor()])
            .unwrap();

        let catalog = registry.catalog();
        let keys: Vec<&String> = catalog.keys().collect();
        assert_eq!(keys, vec!["count", "scale"]);
        assert_eq!(
            catalog["scale"]["scale"].iter().collect::<Vec<_>>(),
            vec!["double,double"]
        );
    }
}
