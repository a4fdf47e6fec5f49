use crate::ast::{ClassNode, ConfigTree, Property, Value};
use crate::error::ConfigError;
use crate::resolver::{ResolvedClass, Resolver};

/// Read-only traversal facade over a parsed tree.
///
/// This is the surface external consumers (validators, packagers, diff
/// tools) see; it never mutates the tree.
pub struct QueryEngine<'a> {
    tree: &'a ConfigTree,
    resolver: Resolver<'a>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(tree: &'a ConfigTree) -> Self {
        Self {
            tree,
            resolver: Resolver::new(tree),
        }
    }

    /// Top-level classes of the file.
    pub fn root_classes(&self) -> &'a [ClassNode] {
        self.tree.root_classes()
    }

    /// Walk a path of class names from the root.
    pub fn find_class(&self, path: &[&str]) -> Option<&'a ClassNode> {
        self.tree.find_class(path)
    }

    /// A property exactly as declared on `class`, ignoring inheritance.
    pub fn property(&self, class: &'a ClassNode, name: &str) -> Option<&'a Value> {
        class.property(name).map(|p| &p.value)
    }

    /// The post-merge value of a property, following the inheritance chain.
    pub fn resolved_property(
        &self,
        path: &[&str],
        name: &str,
    ) -> Result<Option<Property>, ConfigError> {
        self.resolver.resolved_property(path, name)
    }

    /// The class at `path` with inheritance fully applied.
    pub fn resolved_class(&self, path: &[&str]) -> Result<ResolvedClass, ConfigError> {
        self.resolver.resolved_class(path)
    }

    /// Every class anywhere in the tree whose declared parent is `parent`.
    pub fn classes_with_parent(&self, parent: &str) -> Vec<&'a ClassNode> {
        self.tree.root.find_classes(&|class| {
            class
                .parent
                .as_deref()
                .map(|p| p.eq_ignore_ascii_case(parent))
                .unwrap_or(false)
        })
    }
}
