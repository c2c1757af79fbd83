//! Sparse option records for registration and lookup, plus the field tag mini-language.
//!
//! All option fields are optional; absent fields mean "use the default / inherit from the
//! caller". Several partial records can be folded into one with [merge_options], where the first
//! record to set a field wins. The tag mini-language
//! (`"bare_bean_name,lazy,pkg=<namespace>,bean=<name>,type=<ImplName>"`) is parsed exactly once,
//! at declaration time, into a [FieldSpec].

use crate::error::TagParseError;
use crate::instance_provider::ConstructorArgs;
use std::any::type_name;
use std::str::FromStr;
use tracing::warn;

/// Default bean naming mode for injection sites without an explicit name.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum BeanMode {
    /// Dependencies are shared singletons keyed by `namespace:TypeName`.
    #[default]
    Singleton,
    /// Every injection site receives a fresh, uncached instance, named after the field itself.
    Multi,
}

/// Merging support for sparse option records: `self` wins per field, `fallback` fills the gaps.
pub trait OptionsMerge: Default {
    fn merge(self, fallback: Self) -> Self;
}

/// Folds several partial option records left to right, the first non-empty value winning per
/// field.
pub fn merge_options<T: OptionsMerge>(options: impl IntoIterator<Item = T>) -> T {
    options
        .into_iter()
        .fold(T::default(), |merged, next| merged.merge(next))
}

/// Registration-time options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegistrationOptions {
    /// Multi-instance mode: resolution always produces a fresh, uncached instance.
    pub multi: Option<bool>,
    /// Overrides the namespace derived from the type's module path.
    pub namespace: Option<String>,
    /// Priority for conflicting registrations on the same key; lower values win, no order loses
    /// to any order.
    pub order: Option<i32>,
}

impl RegistrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multi(mut self, multi: bool) -> Self {
        self.multi = Some(multi);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn is_multi(&self) -> bool {
        self.multi.unwrap_or(false)
    }
}

impl OptionsMerge for RegistrationOptions {
    fn merge(self, fallback: Self) -> Self {
        Self {
            multi: self.multi.or(fallback.multi),
            namespace: self.namespace.or(fallback.namespace),
            order: self.order.or(fallback.order),
        }
    }
}

/// Lookup-time options.
#[derive(Clone, Debug, Default)]
pub struct LookupOptions {
    /// Explicit bean name; pins the instance in the store under this exact name.
    pub bean_name: Option<String>,
    pub namespace: Option<String>,
    /// Declared type name (the registered type or interface).
    pub type_name: Option<String>,
    /// Implementation-variant name selecting a specific entry from a binding pool.
    pub variant: Option<String>,
    /// Defers injection and construction to a background task after a fixed delay.
    pub lazy: Option<bool>,
    /// Arguments handed to the construction hook; inherited by recursive resolutions.
    pub args: ConstructorArgs,
    /// Bean requesting this lookup, for diagnostics only.
    pub parent: Option<String>,
}

impl LookupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bean_name(mut self, name: impl Into<String>) -> Self {
        self.bean_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_lazy(mut self) -> Self {
        self.lazy = Some(true);
        self
    }

    pub fn with_args(mut self, args: ConstructorArgs) -> Self {
        self.args = args;
        self
    }

    pub(crate) fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy.unwrap_or(false)
    }

    /// Completes namespace and type name from a target type's key, keeping whatever was set
    /// explicitly.
    pub(crate) fn fill(&mut self, namespace: &str, type_name: &str) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        if self.type_name.is_none() {
            self.type_name = Some(type_name.to_string());
        }
    }
}

impl OptionsMerge for LookupOptions {
    fn merge(self, fallback: Self) -> Self {
        Self {
            bean_name: self.bean_name.or(fallback.bean_name),
            namespace: self.namespace.or(fallback.namespace),
            type_name: self.type_name.or(fallback.type_name),
            variant: self.variant.or(fallback.variant),
            lazy: self.lazy.or(fallback.lazy),
            args: if self.args.is_empty() {
                fallback.args
            } else {
                self.args
            },
            parent: self.parent.or(fallback.parent),
        }
    }
}

/// Per-field lookup spec, the parsed form of the tag mini-language.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldSpec {
    pub bean_name: Option<String>,
    pub namespace: Option<String>,
    pub variant: Option<String>,
    pub lazy: bool,
}

impl FieldSpec {
    /// Parses a comma-separated field tag. Directives are `lazy`, `pkg=<namespace>`,
    /// `bean=<name>`, `type=<ImplName>`; a bare token sets the explicit bean name. Later
    /// directives of the same kind override earlier ones; unknown `key=value` directives are
    /// ignored with a warning.
    pub fn parse(tag: &str) -> Result<Self, TagParseError> {
        let mut spec = Self::default();
        for token in tag.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            match token.split_once('=') {
                Some((key, value)) if matches!(key, "pkg" | "bean" | "type") => {
                    if value.is_empty() {
                        return Err(TagParseError::EmptyValue(key.to_string()));
                    }

                    let value = Some(value.to_string());
                    match key {
                        "pkg" => spec.namespace = value,
                        "bean" => spec.bean_name = value,
                        _ => spec.variant = value,
                    }
                }
                Some((key, _)) => warn!("Ignoring unknown field tag directive '{key}'."),
                None if token == "lazy" => spec.lazy = true,
                None => spec.bean_name = Some(token.to_string()),
            }
        }

        Ok(spec)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.bean_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

impl FromStr for FieldSpec {
    type Err = TagParseError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::parse(tag)
    }
}

/// Derives the (namespace, type name) key for a type: the module path and the last path segment
/// of [type_name], with any `dyn ` prefix stripped. Components and injectable traits are
/// expected to be non-generic, so the last `::` separates the two cleanly.
pub fn type_key<T: ?Sized + 'static>() -> (String, String) {
    let full = type_name::<T>();
    let full = full.strip_prefix("dyn ").unwrap_or(full);
    match full.rsplit_once("::") {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (String::new(), full.to_string()),
    }
}
