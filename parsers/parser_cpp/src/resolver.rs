use log::trace;

use crate::ast::{ClassNode, ConfigTree, MergeMode, Property, Value};
use crate::error::{ConfigError, ResolutionErrorKind};
use crate::merge::merge_arrays;

/// Resolves inheritance over a parsed tree.
///
/// Parent references are names, not structural edges, so lookup walks the
/// lexical scope chain from the class's own scope out to the file root.
/// Cycles are detected with a transient visited set; a cycle is fatal for
/// that subtree only, siblings still resolve.
pub struct Resolver<'a> {
    tree: &'a ConfigTree,
}

/// One class with its effective (post-merge) property set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClass {
    /// Names from the root down to this class.
    pub path: Vec<String>,
    pub name: String,
    pub parent: Option<String>,
    pub external: bool,
    pub properties: Vec<Property>,
}

/// Outcome of resolving a whole tree. Errors are aggregated so the caller
/// decides pass/fail for the batch.
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub classes: Vec<ResolvedClass>,
    pub errors: Vec<ConfigError>,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a ConfigTree) -> Self {
        Self { tree }
    }

    /// Effective property set of the class at `path`.
    ///
    /// A forward-declared class without a body resolves to an empty set;
    /// an unknown path or parent is an `UnknownParent` error.
    pub fn resolved_properties(&self, path: &[&str]) -> Result<Vec<Property>, ConfigError> {
        let mut scopes: Vec<&ClassNode> = vec![&self.tree.root];
        let mut current = &self.tree.root;
        for name in path {
            current = current.find_child(name).ok_or_else(|| {
                ConfigError::resolution(
                    ResolutionErrorKind::UnknownParent,
                    path.join("/"),
                    format!("class `{name}` not found"),
                )
            })?;
            scopes.push(current);
        }
        if path.is_empty() {
            return Ok(Vec::new());
        }
        scopes.pop();
        let mut visiting = Vec::new();
        self.resolve_node(current, &scopes, &mut visiting)
    }

    /// The class at `path` with its effective property set materialized.
    pub fn resolved_class(&self, path: &[&str]) -> Result<ResolvedClass, ConfigError> {
        let properties = self.resolved_properties(path)?;
        let node = self.tree.find_class(path).ok_or_else(|| {
            ConfigError::resolution(
                ResolutionErrorKind::UnknownParent,
                path.join("/"),
                "class not found",
            )
        })?;
        Ok(ResolvedClass {
            path: path.iter().map(|s| s.to_string()).collect(),
            name: node.name.clone(),
            parent: node.parent.clone(),
            external: node.is_external(),
            properties,
        })
    }

    /// Post-merge value of one property, `None` when the class does not
    /// carry it anywhere along its inheritance chain.
    pub fn resolved_property(
        &self,
        path: &[&str],
        name: &str,
    ) -> Result<Option<Property>, ConfigError> {
        let properties = self.resolved_properties(path)?;
        Ok(properties
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Resolve every class in the tree, collecting per-class failures
    /// without aborting the walk.
    pub fn resolve_tree(&self) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        let scopes = vec![&self.tree.root];
        for class in &self.tree.root.classes {
            self.walk(class, &scopes, &mut Vec::new(), &mut outcome);
        }
        outcome
    }

    fn walk(
        &self,
        node: &'a ClassNode,
        scopes: &[&'a ClassNode],
        path: &mut Vec<String>,
        outcome: &mut ResolutionOutcome,
    ) {
        path.push(node.name.clone());
        let mut visiting = Vec::new();
        match self.resolve_node(node, scopes, &mut visiting) {
            Ok(properties) => outcome.classes.push(ResolvedClass {
                path: path.clone(),
                name: node.name.clone(),
                parent: node.parent.clone(),
                external: node.is_external(),
                properties,
            }),
            Err(error) => outcome.errors.push(error),
        }

        let mut child_scopes = scopes.to_vec();
        child_scopes.push(node);
        for child in &node.classes {
            self.walk(child, &child_scopes, path, outcome);
        }
        path.pop();
    }

    /// Materialize the effective property set of `node`, whose enclosing
    /// scope chain (root first) is `scopes`.
    fn resolve_node(
        &self,
        node: &'a ClassNode,
        scopes: &[&'a ClassNode],
        visiting: &mut Vec<usize>,
    ) -> Result<Vec<Property>, ConfigError> {
        let key = node as *const ClassNode as usize;
        if visiting.contains(&key) {
            return Err(ConfigError::resolution(
                ResolutionErrorKind::CyclicInheritance,
                &node.name,
                format!("inheritance cycle through `{}`", node.name),
            ));
        }
        visiting.push(key);

        let mut properties = match &node.parent {
            Some(parent_name) => match lookup_in_scopes(parent_name, scopes) {
                Some((parent_node, depth)) => {
                    trace!("resolving parent {parent_name} of {}", node.name);
                    self.resolve_node(parent_node, &scopes[..=depth], visiting)?
                }
                None => {
                    visiting.pop();
                    return Err(ConfigError::resolution(
                        ResolutionErrorKind::UnknownParent,
                        &node.name,
                        format!("parent class `{parent_name}` not found in any enclosing scope"),
                    ));
                }
            },
            None => Vec::new(),
        };

        for local in &node.properties {
            apply_property(&mut properties, local);
        }

        visiting.pop();
        Ok(properties)
    }
}

/// Find `name` as a child of the innermost scope first, then outward to the
/// file root. Depth of the matching scope is returned so the parent can be
/// resolved within its own chain.
fn lookup_in_scopes<'t>(name: &str, scopes: &[&'t ClassNode]) -> Option<(&'t ClassNode, usize)> {
    for (depth, scope) in scopes.iter().enumerate().rev() {
        if let Some(found) = scope.find_child(name) {
            return Some((found, depth));
        }
    }
    None
}

/// Apply one local property over the inherited set.
///
/// Non-array values always replace. Array appends concatenate onto an
/// inherited array; `+=` without an inherited array degrades to replace.
fn apply_property(properties: &mut Vec<Property>, local: &Property) {
    let existing = properties
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(&local.name));

    match existing {
        Some(slot) => {
            let merged_value = match (local.mode, slot.value.as_array(), local.value.as_array()) {
                (MergeMode::Append, Some(inherited), Some(local_items)) => {
                    Value::Array(merge_arrays(inherited, local_items, MergeMode::Append))
                }
                _ => local.value.clone(),
            };
            slot.value = merged_value;
            slot.is_array = local.is_array || slot.is_array;
            slot.mode = MergeMode::Replace;
        }
        None => {
            let mut materialized = local.clone();
            // Nothing inherited to append to.
            materialized.mode = MergeMode::Replace;
            properties.push(materialized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Number;
    use crate::parser::Parser;
    use crate::preprocessor::{NoIncludes, Preprocessor};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ConfigTree {
        let mut pp = Preprocessor::new(&NoIncludes);
        let tokens = pp.process(source).unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    #[test]
    fn inherited_properties_are_copied() {
        let tree = parse(
            r#"class Base { displayName = "Base"; scope = 1; };
            class Child: Base { scope = 2; };"#,
        );
        let resolver = Resolver::new(&tree);
        let props = resolver.resolved_properties(&["Child"]).unwrap();
        assert_eq!(
            props.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["displayName", "scope"]
        );
        assert_eq!(
            resolver
                .resolved_property(&["Child"], "scope")
                .unwrap()
                .unwrap()
                .value,
            Value::Number(Number::Int(2))
        );
        assert_eq!(
            resolver
                .resolved_property(&["Child"], "displayName")
                .unwrap()
                .unwrap()
                .value,
            Value::Str("Base".into())
        );
    }

    #[test]
    fn append_concatenates_inherited_first() {
        let tree = parse(
            r#"class P { magazines[] = {"m1", "m2"}; };
            class C: P { magazines[] += {"m3"}; };"#,
        );
        let resolver = Resolver::new(&tree);
        let prop = resolver
            .resolved_property(&["C"], "magazines")
            .unwrap()
            .unwrap();
        assert_eq!(
            prop.value,
            Value::Array(vec![
                Value::Str("m1".into()),
                Value::Str("m2".into()),
                Value::Str("m3".into()),
            ])
        );
    }

    #[test]
    fn append_without_inherited_degrades_to_replace() {
        let tree = parse(r#"class C { magazines[] += {"m1"}; };"#);
        let resolver = Resolver::new(&tree);
        let prop = resolver
            .resolved_property(&["C"], "magazines")
            .unwrap()
            .unwrap();
        assert_eq!(prop.value, Value::Array(vec![Value::Str("m1".into())]));
        assert_eq!(prop.mode, MergeMode::Replace);
    }

    #[test]
    fn local_array_replace_discards_inherited() {
        let tree = parse(
            r#"class P { items[] = {"a"}; };
            class C: P { items[] = {"b"}; };"#,
        );
        let resolver = Resolver::new(&tree);
        let prop = resolver.resolved_property(&["C"], "items").unwrap().unwrap();
        assert_eq!(prop.value, Value::Array(vec![Value::Str("b".into())]));
    }

    #[test]
    fn parent_lookup_prefers_local_scope() {
        let tree = parse(
            r#"class Shadow { tag = 1; };
            class Outer {
                class Shadow { tag = 2; };
                class Child: Shadow { };
            };"#,
        );
        let resolver = Resolver::new(&tree);
        let prop = resolver
            .resolved_property(&["Outer", "Child"], "tag")
            .unwrap()
            .unwrap();
        assert_eq!(prop.value, Value::Number(Number::Int(2)));
    }

    #[test]
    fn parent_lookup_falls_back_to_global_scope() {
        let tree = parse(
            r#"class UniformItem { mass = 10; };
            class CfgWeapons {
                class ItemInfo: UniformItem { };
            };"#,
        );
        let resolver = Resolver::new(&tree);
        let prop = resolver
            .resolved_property(&["CfgWeapons", "ItemInfo"], "mass")
            .unwrap()
            .unwrap();
        assert_eq!(prop.value, Value::Number(Number::Int(10)));
    }

    #[test]
    fn unknown_parent_is_reported() {
        let tree = parse("class C: Missing { };");
        let resolver = Resolver::new(&tree);
        let err = resolver.resolved_properties(&["C"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Resolution {
                kind: ResolutionErrorKind::UnknownParent,
                ..
            }
        ));
    }

    #[test]
    fn cyclic_inheritance_is_detected() {
        let tree = parse("class A: B { };\nclass B: A { };");
        let resolver = Resolver::new(&tree);
        let err = resolver.resolved_properties(&["A"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Resolution {
                kind: ResolutionErrorKind::CyclicInheritance,
                ..
            }
        ));
    }

    #[test]
    fn self_inheritance_is_a_cycle() {
        let tree = parse("class A: A { };");
        let resolver = Resolver::new(&tree);
        let err = resolver.resolved_properties(&["A"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Resolution {
                kind: ResolutionErrorKind::CyclicInheritance,
                ..
            }
        ));
    }

    #[test]
    fn forward_only_parent_resolves_empty() {
        let tree = parse(
            r#"class I_Soldier_base_F;
            class MySoldier: I_Soldier_base_F { scope = 2; };"#,
        );
        let resolver = Resolver::new(&tree);
        let props = resolver.resolved_properties(&["MySoldier"]).unwrap();
        assert_eq!(props.len(), 1);
        assert!(resolver
            .resolved_property(&["I_Soldier_base_F"], "scope")
            .unwrap()
            .is_none());
    }

    #[test]
    fn resolved_class_carries_identity_and_properties() {
        let tree = parse(
            r#"class Base { scope = 1; };
            class CfgWeapons {
                class rifle: Base { displayName = "Rifle"; };
            };"#,
        );
        let resolved = Resolver::new(&tree)
            .resolved_class(&["CfgWeapons", "rifle"])
            .unwrap();
        assert_eq!(resolved.name, "rifle");
        assert_eq!(resolved.parent.as_deref(), Some("Base"));
        assert!(!resolved.external);
        assert_eq!(resolved.path, vec!["CfgWeapons", "rifle"]);
        assert_eq!(resolved.properties.len(), 2);
    }

    #[test]
    fn sibling_errors_do_not_stop_resolution() {
        let tree = parse(
            r#"class Good { x = 1; };
            class Bad: Missing { };
            class AlsoGood: Good { };"#,
        );
        let outcome = Resolver::new(&tree).resolve_tree();
        assert_eq!(outcome.errors.len(), 1);
        let names: Vec<_> = outcome.classes.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Good"));
        assert!(names.contains(&"AlsoGood"));
        assert!(!names.contains(&"Bad"));
    }

    #[test]
    fn grandparent_chain_merges_in_order() {
        let tree = parse(
            r#"class A { items[] = {"a"}; };
            class B: A { items[] += {"b"}; };
            class C: B { items[] += {"c"}; };"#,
        );
        let resolver = Resolver::new(&tree);
        let prop = resolver.resolved_property(&["C"], "items").unwrap().unwrap();
        assert_eq!(
            prop.value,
            Value::Array(vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into()),
            ])
        );
    }
}
