use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric literal. Integers and floats are kept apart so `mass = 40`
/// survives a round-trip as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value}"),
        }
    }
}

/// A property value as written in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Number(Number),
    /// A bare identifier that survived preprocessing, usually a macro the
    /// file never defined (pulled in via an unresolvable `#include`).
    Ident(String),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// How an array property combines with an inherited value of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeMode {
    /// `=`: discard the inherited value.
    #[default]
    Replace,
    /// `+=`: inherited sequence first, local sequence after.
    Append,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Value,
    /// Whether the property was declared with `[]`.
    pub is_array: bool,
    pub mode: MergeMode,
}

impl Property {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            is_array: false,
            mode: MergeMode::Replace,
        }
    }

    pub fn array(name: impl Into<String>, items: Vec<Value>, mode: MergeMode) -> Self {
        Self {
            name: name.into(),
            value: Value::Array(items),
            is_array: true,
            mode,
        }
    }
}

/// Whether a class has a body yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassState {
    /// `class X;`: forward declaration, usable as an inheritance target.
    External,
    /// `class X { ... };`
    Defined,
}

/// A named node in the class tree.
///
/// Inheritance is recorded by parent name only; the resolver turns names
/// into lookups so ownership stays a strict tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub name: String,
    pub parent: Option<String>,
    pub state: ClassState,
    /// Property assignments in source order.
    pub properties: Vec<Property>,
    /// Nested class declarations in source order.
    pub classes: Vec<ClassNode>,
}

impl ClassNode {
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            state: ClassState::External,
            properties: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn defined(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent,
            state: ClassState::Defined,
            properties: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn is_external(&self) -> bool {
        self.state == ClassState::External
    }

    /// Case-insensitive child lookup, matching the dialect's name rules.
    pub fn find_child(&self, name: &str) -> Option<&ClassNode> {
        self.classes
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut ClassNode> {
        self.classes
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Locally declared property, before inheritance resolution.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Depth-first search over this node and all descendants.
    pub fn find_classes<'a>(&'a self, predicate: &dyn Fn(&ClassNode) -> bool) -> Vec<&'a ClassNode> {
        let mut results = Vec::new();
        if predicate(self) {
            results.push(self);
        }
        for class in &self.classes {
            results.extend(class.find_classes(predicate));
        }
        results
    }
}

/// A named constant from an `enum { ... };` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub value: i64,
}

/// The parsed form of one config file.
///
/// The root node is an unnamed scope holding the file's top-level classes
/// and properties. The tree is immutable once the parse call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTree {
    pub root: ClassNode,
    /// Enumerators declared at any level, in declaration order.
    pub enums: Vec<EnumConstant>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self {
            root: ClassNode::defined(String::new(), None),
            enums: Vec::new(),
        }
    }

    /// Top-level classes of the file.
    pub fn root_classes(&self) -> &[ClassNode] {
        &self.root.classes
    }

    /// Walk a path of class names from the root, case-insensitively.
    pub fn find_class(&self, path: &[&str]) -> Option<&ClassNode> {
        let mut current = &self.root;
        for name in path {
            current = current.find_child(name)?;
        }
        if std::ptr::eq(current, &self.root) {
            None
        } else {
            Some(current)
        }
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enums
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.value)
    }
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ConfigTree {
        let mut tree = ConfigTree::new();
        let mut weapons = ClassNode::defined("CfgWeapons", None);
        let mut uniform = ClassNode::defined("bw_uniform_combat_fleck", Some("Uniform_Base".into()));
        uniform.properties.push(Property::new(
            "displayName",
            Value::Str("Massif Combat Uniform (Flecktarn)".into()),
        ));
        weapons.classes.push(uniform);
        tree.root.classes.push(weapons);
        tree
    }

    #[test]
    fn find_class_walks_path() {
        let tree = sample_tree();
        let class = tree
            .find_class(&["CfgWeapons", "bw_uniform_combat_fleck"])
            .unwrap();
        assert_eq!(class.parent.as_deref(), Some("Uniform_Base"));
        assert!(tree.find_class(&["CfgWeapons", "missing"]).is_none());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let tree = sample_tree();
        assert!(tree.find_class(&["cfgweapons", "BW_UNIFORM_COMBAT_FLECK"]).is_some());
        let class = tree.find_class(&["CfgWeapons", "bw_uniform_combat_fleck"]).unwrap();
        assert!(class.property("DISPLAYNAME").is_some());
    }

    #[test]
    fn empty_path_is_not_a_class() {
        let tree = sample_tree();
        assert!(tree.find_class(&[]).is_none());
    }
}
