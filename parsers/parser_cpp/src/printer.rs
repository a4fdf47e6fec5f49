use std::fmt::Write;

use crate::ast::{ClassNode, ConfigTree, MergeMode, Property, Value};

/// Render a tree back to dialect text.
///
/// Comments and preprocessor directives are gone by this point; the output
/// re-parses to an equivalent tree, which is what diff tooling needs.
pub fn render(tree: &ConfigTree) -> String {
    let mut out = String::new();

    if !tree.enums.is_empty() {
        out.push_str("enum {\n");
        for constant in &tree.enums {
            let _ = writeln!(out, "\t{} = {},", constant.name, constant.value);
        }
        out.push_str("};\n");
    }

    for property in &tree.root.properties {
        render_property(&mut out, property, 0);
    }
    for class in &tree.root.classes {
        render_class(&mut out, class, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn render_class(out: &mut String, class: &ClassNode, depth: usize) {
    indent(out, depth);
    out.push_str("class ");
    out.push_str(&class.name);
    if let Some(parent) = &class.parent {
        out.push_str(": ");
        out.push_str(parent);
    }
    if class.is_external() {
        out.push_str(";\n");
        return;
    }
    out.push_str("\n");
    indent(out, depth);
    out.push_str("{\n");
    for property in &class.properties {
        render_property(out, property, depth + 1);
    }
    for child in &class.classes {
        render_class(out, child, depth + 1);
    }
    indent(out, depth);
    out.push_str("};\n");
}

fn render_property(out: &mut String, property: &Property, depth: usize) {
    indent(out, depth);
    out.push_str(&property.name);
    if property.is_array {
        out.push_str("[]");
    }
    out.push_str(match property.mode {
        MergeMode::Replace => " = ",
        MergeMode::Append => " += ",
    });
    render_value(out, &property.value);
    out.push_str(";\n");
}

fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::Str(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\"\""));
            out.push('"');
        }
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Ident(raw) => out.push_str(raw),
        Value::Array(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_value(out, item);
            }
            out.push('}');
        }
    }
}
