use std::path::Path;

use anyhow::{Context, Result};
use log::trace;
use parser_cpp::{ClassNode, ConfigTree, LocalIncludes, NoIncludes, Number, Value};

use crate::models::{FileParser, GameClass, PropertyValue};

/// Parses `config.cpp` style files into flattened [`GameClass`] records.
///
/// Includes are resolved relative to the file's own directory, which is how
/// derap output references its sibling headers.
pub struct CppFileParser;

impl FileParser for CppFileParser {
    fn parse_file(&self, file_path: &Path) -> Result<Vec<GameClass>> {
        let source = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;

        let tree = match file_path.parent() {
            Some(dir) => {
                let loader = LocalIncludes::new(dir);
                parser_cpp::parse_with_loader(&source, &loader)
            }
            None => parser_cpp::parse_with_loader(&source, &NoIncludes),
        }
        .with_context(|| format!("Failed to parse {}", file_path.display()))?;

        Ok(flatten_tree(&tree, file_path))
    }

    fn name(&self) -> &str {
        "cpp"
    }
}

/// Flatten the class tree into one record per class, nested classes included.
pub fn flatten_tree(tree: &ConfigTree, file_path: &Path) -> Vec<GameClass> {
    let mut classes = Vec::new();
    for node in tree.root_classes() {
        flatten_node(node, None, file_path, &mut classes);
    }
    trace!("Flattened {} classes from {}", classes.len(), file_path.display());
    classes
}

fn flatten_node(
    node: &ClassNode,
    container: Option<&str>,
    file_path: &Path,
    out: &mut Vec<GameClass>,
) {
    let mut class = GameClass::new(
        node.name.clone(),
        node.parent.clone(),
        file_path.to_path_buf(),
    );
    class.container_class = container.map(str::to_string);
    class.is_forward_declaration = node.is_external();

    for property in &node.properties {
        class.add_property(property.name.clone(), convert_value(&property.value));
    }
    out.push(class);

    for child in &node.classes {
        flatten_node(child, Some(&node.name), file_path, out);
    }
}

fn convert_value(value: &Value) -> PropertyValue {
    match value {
        Value::Str(s) => PropertyValue::String(s.clone()),
        Value::Ident(raw) => PropertyValue::String(raw.clone()),
        Value::Number(Number::Int(n)) => PropertyValue::Number(*n),
        Value::Number(Number::Float(f)) => PropertyValue::Float(*f),
        Value::Array(items) => PropertyValue::Array(items.iter().map(render_item).collect()),
    }
}

fn render_item(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Ident(raw) => raw.clone(),
        Value::Number(n) => n.to_string(),
        // Nested arrays keep their printed form.
        Value::Array(_) => {
            let mut out = String::new();
            render_nested(value, &mut out);
            out
        }
    }
}

fn render_nested(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_nested(item, out);
            }
            out.push('}');
        }
        Value::Str(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Value::Ident(raw) => out.push_str(raw),
        Value::Number(n) => {
            out.push_str(&n.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flatten_records_container_and_forward_flags() {
        let tree = parser_cpp::parse(
            r#"class CfgWeapons {
                class UniformItem;
                class bw_uniform: Uniform_Base {
                    scope = 2;
                    class ItemInfo: UniformItem { mass = 40; };
                };
            };"#,
        )
        .unwrap();
        let classes = flatten_tree(&tree, Path::new("config.cpp"));

        let names: Vec<_> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["CfgWeapons", "UniformItem", "bw_uniform", "ItemInfo"]);

        let forward = classes.iter().find(|c| c.name == "UniformItem").unwrap();
        assert!(forward.is_forward_declaration);
        assert_eq!(forward.container_class.as_deref(), Some("CfgWeapons"));

        let item_info = classes.iter().find(|c| c.name == "ItemInfo").unwrap();
        assert_eq!(item_info.container_class.as_deref(), Some("bw_uniform"));
        assert_eq!(item_info.property("mass"), Some(&PropertyValue::Number(40)));
    }

    #[test]
    fn array_items_render_as_strings() {
        let tree = parser_cpp::parse(
            r#"class A { mags[] = {"m1", 2, {"inner", 3}}; };"#,
        )
        .unwrap();
        let classes = flatten_tree(&tree, Path::new("config.cpp"));
        assert_eq!(
            classes[0].property("mags"),
            Some(&PropertyValue::Array(vec![
                "m1".to_string(),
                "2".to_string(),
                "{\"inner\",3}".to_string(),
            ]))
        );
    }
}
