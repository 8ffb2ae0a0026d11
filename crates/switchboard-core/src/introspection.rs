//! Built-in introspection service, bound to the `system` registry key.

use crate::registry::{parse_method_name, Catalog};
use crate::{Result, RpcError};

crate::capability! {
    /// Queries over the dispatcher's method catalog.
    pub trait Introspection {
        /// Every `key.operation` name, sorted and deduplicated.
        fn list_methods(&self) -> Vec<String> as "listMethods";

        /// Signature strings (`"returnType,param1,..."`) of one method.
        fn method_signature(&self, method: String) -> Vec<String> as "methodSignature";

        /// Free-text help for one method. No help text is modeled.
        fn method_help(&self, method: String) -> String as "methodHelp";
    }
}

/// Introspection handler answering from a frozen catalog snapshot.
#[derive(Debug, Clone)]
pub struct CatalogIntrospection {
    catalog: Catalog,
}

impl CatalogIntrospection {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

impl Introspection for CatalogIntrospection {
    fn list_methods(&self) -> Result<Vec<String>> {
        // BTreeMap iteration is ordered on both levels, so the output is
        // already sorted and unique.
        Ok(self
            .catalog
            .iter()
            .flat_map(|(key, ops)| ops.keys().map(move |op| format!("{}.{}", key, op)))
            .collect())
    }

    fn method_signature(&self, method: String) -> Result<Vec<String>> {
        let (key, op) = parse_method_name(&method)?;
        let signatures = self
            .catalog
            .get(key)
            .and_then(|ops| ops.get(op))
            .filter(|sigs| !sigs.is_empty())
            .ok_or_else(|| RpcError::UnknownMethod {
                method: method.clone(),
            })?;
        Ok(signatures.iter().cloned().collect())
    }

    fn method_help(&self, _method: String) -> Result<String> {
        Ok(String::new())
    }
}
