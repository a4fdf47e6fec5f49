use log::trace;

use crate::ast::{
    ClassNode, ClassState, ConfigTree, EnumConstant, MergeMode, Number, Property, Value,
};
use crate::error::{ConfigError, Position, SyntaxErrorKind};
use crate::lexer::{Token, TokenKind};

/// Recursive-descent parser over the preprocessed token stream.
///
/// Grammar, informally:
/// ```text
/// file        := classbody
/// classbody   := (classdecl | enumdecl | propassign)*
/// classdecl   := "class" IDENT (":" IDENT)? ( ";" | "{" classbody "}" ";" )
/// propassign  := IDENT ("[" "]")? ("=" | "+=") value ";"
/// value       := scalar | "{" arraylist "}"
/// arraylist   := (value ("," value)*)?
/// ```
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    enums: Vec<EnumConstant>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            enums: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<ConfigTree, ConfigError> {
        let mut root = ClassNode::defined(String::new(), None);
        self.parse_class_body(&mut root, true)?;
        Ok(ConfigTree {
            root,
            enums: self.enums,
        })
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.index).cloned()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.index).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn last_position(&self) -> Position {
        if self.tokens.is_empty() {
            return Position::start();
        }
        let index = self.index.min(self.tokens.len() - 1);
        self.tokens[index].position
    }

    fn unexpected(&self, token: Option<&Token>, expected: &str) -> ConfigError {
        match token {
            Some(token) => ConfigError::syntax(
                SyntaxErrorKind::UnexpectedToken,
                format!("expected {expected}, found {}", token.kind.describe()),
                token.position,
            ),
            None => ConfigError::syntax(
                SyntaxErrorKind::UnexpectedToken,
                format!("expected {expected}, found end of input"),
                self.last_position(),
            ),
        }
    }

    fn expect_semicolon(&mut self, context: &str) -> Result<(), ConfigError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(ConfigError::syntax(
                SyntaxErrorKind::MissingSemicolon,
                format!("missing `;` after {context}"),
                token.position,
            )),
            None => Err(ConfigError::syntax(
                SyntaxErrorKind::MissingSemicolon,
                format!("missing `;` after {context} at end of input"),
                self.last_position(),
            )),
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(String, Position), ConfigError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Ident(name),
                position,
            }) => Ok((name, position)),
            other => Err(self.unexpected(other.as_ref(), expected)),
        }
    }

    /// Parse declarations until `}` (nested) or end of input (top level).
    fn parse_class_body(&mut self, node: &mut ClassNode, top_level: bool) -> Result<(), ConfigError> {
        loop {
            let token = match self.peek() {
                Some(token) => token,
                None => {
                    if top_level {
                        return Ok(());
                    }
                    return Err(ConfigError::syntax(
                        SyntaxErrorKind::UnterminatedBlock,
                        format!("class `{}` is never closed", node.name),
                        self.last_position(),
                    ));
                }
            };

            match token.kind {
                TokenKind::RBrace => {
                    if top_level {
                        return Err(self.unexpected(Some(&token), "declaration"));
                    }
                    return Ok(());
                }
                // Stray semicolons are left behind by macro-generated
                // statements; harmless.
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Ident(ref name) => match name.as_str() {
                    "class" => {
                        self.advance();
                        self.parse_class_decl(node)?;
                    }
                    "enum" => {
                        self.advance();
                        self.parse_enum_decl()?;
                    }
                    "delete" => {
                        self.advance();
                        let (deleted, _) = self.expect_ident("class name after `delete`")?;
                        trace!("ignoring delete statement for {deleted}");
                        self.expect_semicolon("delete statement")?;
                    }
                    _ => self.parse_statement(node)?,
                },
                _ => return Err(self.unexpected(Some(&token), "declaration")),
            }
        }
    }

    fn parse_class_decl(&mut self, parent_node: &mut ClassNode) -> Result<(), ConfigError> {
        let (name, name_pos) = self.expect_ident("class name")?;

        let parent = if self.peek_kind() == Some(TokenKind::Colon) {
            self.advance();
            let (parent_name, _) = self.expect_ident("parent class name")?;
            Some(parent_name)
        } else {
            None
        };

        match self.peek_kind() {
            // Forward declaration: just makes the name resolvable.
            Some(TokenKind::Semicolon) => {
                self.advance();
                if parent_node.find_child(&name).is_none() {
                    let mut node = ClassNode::external(&name);
                    node.parent = parent;
                    parent_node.classes.push(node);
                }
                Ok(())
            }
            Some(TokenKind::LBrace) => {
                self.advance();
                let mut class = ClassNode::defined(&name, parent);
                self.parse_class_body(&mut class, false)?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RBrace,
                        ..
                    }) => {}
                    other => return Err(self.unexpected(other.as_ref(), "`}`")),
                }
                self.expect_semicolon("class body")?;
                self.attach_class(parent_node, class, name_pos)
            }
            _ => {
                let token = self.peek();
                Err(self.unexpected(token.as_ref(), "`;` or `{` after class name"))
            }
        }
    }

    /// Bind a freshly parsed definition into its scope: fill in an earlier
    /// forward declaration, refine an identical re-opening, or add it new.
    fn attach_class(
        &mut self,
        parent_node: &mut ClassNode,
        class: ClassNode,
        position: Position,
    ) -> Result<(), ConfigError> {
        match parent_node.find_child_mut(&class.name) {
            None => {
                parent_node.classes.push(class);
                Ok(())
            }
            Some(existing) if existing.is_external() => {
                trace!("attaching body to forward-declared class {}", class.name);
                existing.state = ClassState::Defined;
                if class.parent.is_some() {
                    existing.parent = class.parent;
                }
                existing.properties = class.properties;
                existing.classes = class.classes;
                Ok(())
            }
            Some(existing) => {
                let same_parent = match (&existing.parent, &class.parent) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                    _ => false,
                };
                if !same_parent {
                    return Err(ConfigError::syntax(
                        SyntaxErrorKind::DuplicateDefinition,
                        format!(
                            "class `{}` is already defined with different inheritance",
                            class.name
                        ),
                        position,
                    ));
                }
                // Re-opening with identical inheritance refines the class.
                trace!("refining re-opened class {}", class.name);
                existing.properties.extend(class.properties);
                existing.classes.extend(class.classes);
                Ok(())
            }
        }
    }

    fn parse_enum_decl(&mut self) -> Result<(), ConfigError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::LBrace,
                ..
            }) => {}
            other => return Err(self.unexpected(other.as_ref(), "`{` after `enum`")),
        }

        let mut next_value = 0i64;
        loop {
            match self.advance() {
                Some(Token {
                    kind: TokenKind::RBrace,
                    ..
                }) => break,
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => {
                    let value = if self.peek_kind() == Some(TokenKind::Eq) {
                        self.advance();
                        match self.advance() {
                            Some(Token {
                                kind: TokenKind::Number(Number::Int(v)),
                                ..
                            }) => v,
                            other => {
                                return Err(self.unexpected(other.as_ref(), "integer enum value"))
                            }
                        }
                    } else {
                        next_value
                    };
                    next_value = value + 1;
                    self.enums.push(EnumConstant { name, value });
                    if self.peek_kind() == Some(TokenKind::Comma) {
                        self.advance();
                    }
                }
                other => return Err(self.unexpected(other.as_ref(), "enumerator name or `}`")),
            }
        }
        self.expect_semicolon("enum block")
    }

    /// A statement starting with a plain identifier: a property assignment,
    /// or residue of an undefined macro, which is skipped.
    fn parse_statement(&mut self, node: &mut ClassNode) -> Result<(), ConfigError> {
        let (name, _) = self.expect_ident("property name")?;

        let is_array = if self.peek_kind() == Some(TokenKind::LBracket) {
            self.advance();
            match self.advance() {
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => true,
                other => return Err(self.unexpected(other.as_ref(), "`]`")),
            }
        } else {
            false
        };

        let mode = match self.peek_kind() {
            Some(TokenKind::Eq) => {
                self.advance();
                MergeMode::Replace
            }
            Some(TokenKind::PlusEq) => {
                self.advance();
                MergeMode::Append
            }
            // `SOME_MACRO;` or `SOME_MACRO(args);` from an unresolvable
            // include: tolerated as a no-op, matching the original parser.
            Some(TokenKind::Semicolon) if !is_array => {
                trace!("skipping bare statement `{name}`");
                self.advance();
                return Ok(());
            }
            Some(TokenKind::LParen) if !is_array => {
                self.skip_balanced_parens()?;
                self.expect_semicolon("macro statement")?;
                trace!("skipping macro-call statement `{name}(...)`");
                return Ok(());
            }
            _ => {
                let token = self.peek();
                return Err(self.unexpected(token.as_ref(), "`=` or `+=`"));
            }
        };

        let value = self.parse_value()?;
        self.expect_semicolon("property assignment")?;
        node.properties.push(Property {
            name,
            value,
            is_array,
            mode,
        });
        Ok(())
    }

    fn parse_value(&mut self) -> Result<Value, ConfigError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            }) => Ok(Value::Str(s)),
            Some(Token {
                kind: TokenKind::Number(n),
                ..
            }) => Ok(Value::Number(n)),
            Some(Token {
                kind: TokenKind::LBrace,
                ..
            }) => self.parse_array_items(),
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => self.parse_ident_value(name),
            other => Err(self.unexpected(other.as_ref(), "value")),
        }
    }

    /// Items after a `{`, up to and including the matching `}`.
    fn parse_array_items(&mut self) -> Result<Value, ConfigError> {
        let mut items = Vec::new();
        if self.peek_kind() == Some(TokenKind::RBrace) {
            self.advance();
            return Ok(Value::Array(items));
        }

        loop {
            let value = self.parse_value()?;
            // LIST_n("x") duplicates its item n times, as derap emits for
            // repeated inventory entries.
            match expand_list_shorthand(&value) {
                Some(expanded) => items.extend(expanded),
                None => items.push(value),
            }
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RBrace,
                    ..
                }) => return Ok(Value::Array(items)),
                other => return Err(self.unexpected(other.as_ref(), "`,` or `}`")),
            }
        }
    }

    /// A bare identifier in value position: an enum constant, or an
    /// unexpanded macro reference kept as raw text.
    fn parse_ident_value(&mut self, name: String) -> Result<Value, ConfigError> {
        if let Some(value) = self.lookup_enum(&name) {
            return Ok(Value::Number(Number::Int(value)));
        }
        if self.peek_kind() == Some(TokenKind::LParen) {
            let args = self.collect_balanced_parens()?;
            return Ok(Value::Ident(format!("{name}({args})")));
        }
        Ok(Value::Ident(name))
    }

    fn lookup_enum(&self, name: &str) -> Option<i64> {
        self.enums
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.value)
    }

    fn skip_balanced_parens(&mut self) -> Result<(), ConfigError> {
        self.collect_balanced_parens().map(|_| ())
    }

    /// Consume a balanced `( ... )` group, rendering its content to text.
    fn collect_balanced_parens(&mut self) -> Result<String, ConfigError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::LParen,
                ..
            }) => {}
            other => return Err(self.unexpected(other.as_ref(), "`(`")),
        }
        let mut depth = 1usize;
        let mut pieces: Vec<String> = Vec::new();
        loop {
            match self.advance() {
                Some(Token {
                    kind: TokenKind::LParen,
                    ..
                }) => {
                    depth += 1;
                    pieces.push("(".to_string());
                }
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(render_pieces(&pieces));
                    }
                    pieces.push(")".to_string());
                }
                Some(token) => pieces.push(render_token(&token.kind)),
                None => {
                    return Err(ConfigError::syntax(
                        SyntaxErrorKind::UnterminatedBlock,
                        "unterminated parenthesized group",
                        self.last_position(),
                    ))
                }
            }
        }
    }
}

/// Expand `Value::Ident("LIST_2(\"x\")")` into two copies of `"x"`.
fn expand_list_shorthand(value: &Value) -> Option<Vec<Value>> {
    let text = match value {
        Value::Ident(text) => text,
        _ => return None,
    };
    let rest = text.strip_prefix("LIST_")?;
    let open = rest.find('(')?;
    let count: usize = rest[..open].parse().ok()?;
    let inner = rest[open + 1..].strip_suffix(')')?.trim();
    let item = inner.strip_prefix('"')?.strip_suffix('"')?;
    Some(vec![Value::Str(item.to_string()); count])
}

fn render_pieces(pieces: &[String]) -> String {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        let needs_space = i > 0
            && piece
                .chars()
                .next()
                .map(|c| c.is_ascii_alphanumeric() || c == '_' || c == '"')
                .unwrap_or(false)
            && pieces[i - 1]
                .chars()
                .last()
                .map(|c| c.is_ascii_alphanumeric() || c == '_' || c == '"')
                .unwrap_or(false);
        if needs_space {
            out.push(' ');
        }
        out.push_str(piece);
    }
    out
}

fn render_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => name.clone(),
        TokenKind::Str(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        TokenKind::Number(n) => n.to_string(),
        TokenKind::Directive { name, text } => format!("#{name} {text}"),
        TokenKind::Comment(text) => text.clone(),
        TokenKind::LBrace => "{".to_string(),
        TokenKind::RBrace => "}".to_string(),
        TokenKind::LBracket => "[".to_string(),
        TokenKind::RBracket => "]".to_string(),
        TokenKind::LParen => "(".to_string(),
        TokenKind::RParen => ")".to_string(),
        TokenKind::Semicolon => ";".to_string(),
        TokenKind::Comma => ",".to_string(),
        TokenKind::Colon => ":".to_string(),
        TokenKind::Eq => "=".to_string(),
        TokenKind::PlusEq => "+=".to_string(),
        TokenKind::Hash => "#".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::preprocessor::{NoIncludes, Preprocessor};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ConfigTree {
        let mut pp = Preprocessor::new(&NoIncludes);
        let tokens = pp.process(source).unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    fn parse_err(source: &str) -> ConfigError {
        let tokens = Lexer::tokenize(source).unwrap();
        let tokens: Vec<_> = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Comment(_) | TokenKind::Directive { .. }))
            .collect();
        Parser::new(tokens).parse().unwrap_err()
    }

    #[test]
    fn parses_properties_in_order() {
        let tree = parse(
            r#"class BaseMan {
                displayName = "Unarmed";
                uniform[] = {"uniform1", "uniform2"};
                mass = 40;
            };"#,
        );
        let class = tree.find_class(&["BaseMan"]).unwrap();
        let names: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["displayName", "uniform", "mass"]);
        assert_eq!(
            class.property("mass").unwrap().value,
            Value::Number(Number::Int(40))
        );
    }

    #[test]
    fn forward_declaration_then_definition_binds() {
        let tree = parse("class Man;\nclass Man { scope = 2; };");
        assert_eq!(tree.root_classes().len(), 1);
        let man = tree.find_class(&["Man"]).unwrap();
        assert_eq!(man.state, ClassState::Defined);
        assert!(man.property("scope").is_some());
    }

    #[test]
    fn forward_only_class_stays_external() {
        let tree = parse("class I_Soldier_base_F;");
        let class = tree.find_class(&["I_Soldier_base_F"]).unwrap();
        assert!(class.is_external());
        assert!(class.properties.is_empty());
    }

    #[test]
    fn nested_classes_become_children() {
        let tree = parse(
            r#"class CfgWeapons {
                class UniformItem;
                class bw_uniform_combat_fleck: Uniform_Base {
                    class ItemInfo: UniformItem {
                        uniformClass = "bw_combat_fleck";
                        mass = 40;
                    };
                };
            };"#,
        );
        let info = tree
            .find_class(&["CfgWeapons", "bw_uniform_combat_fleck", "ItemInfo"])
            .unwrap();
        assert_eq!(info.parent.as_deref(), Some("UniformItem"));
        assert_eq!(
            info.property("uniformClass").unwrap().value,
            Value::Str("bw_combat_fleck".into())
        );
    }

    #[test]
    fn append_mode_is_recorded() {
        let tree = parse("class A { magazines[] += {\"mag1\"}; };");
        let prop = tree.find_class(&["A"]).unwrap().property("magazines").unwrap();
        assert_eq!(prop.mode, MergeMode::Append);
        assert!(prop.is_array);
    }

    #[test]
    fn nested_arrays_parse() {
        let tree = parse("class A { grid[] = {{1, 2}, {3, 4}}; };");
        let prop = tree.find_class(&["A"]).unwrap().property("grid").unwrap();
        let items = prop.value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            Value::Array(vec![
                Value::Number(Number::Int(1)),
                Value::Number(Number::Int(2))
            ])
        );
    }

    #[test]
    fn list_shorthand_duplicates_items() {
        let tree = parse(r#"class T { uniform[] = {LIST_2("usp_g3c"), "other"}; };"#);
        let prop = tree.find_class(&["T"]).unwrap().property("uniform").unwrap();
        let items = prop.value.as_array().unwrap();
        assert_eq!(
            items,
            &[
                Value::Str("usp_g3c".into()),
                Value::Str("usp_g3c".into()),
                Value::Str("other".into()),
            ]
        );
    }

    #[test]
    fn enum_constants_resolve_in_value_position() {
        let tree = parse(
            r#"enum { DESTRUCTENGINE = 2, DESTRUCTDEFAULT };
            class Test { destrType = DESTRUCTDEFAULT; };"#,
        );
        assert_eq!(tree.enum_value("DESTRUCTENGINE"), Some(2));
        assert_eq!(
            tree.find_class(&["Test"]).unwrap().property("destrType").unwrap().value,
            Value::Number(Number::Int(3))
        );
    }

    #[test]
    fn reopened_class_with_same_parent_refines() {
        let tree = parse("class A: Base { x = 1; };\nclass A: Base { y = 2; };");
        let class = tree.find_class(&["A"]).unwrap();
        assert!(class.property("x").is_some());
        assert!(class.property("y").is_some());
    }

    #[test]
    fn reopened_class_with_different_parent_is_duplicate() {
        let err = parse_err("class A: Base { };\nclass A: Other { };");
        assert!(matches!(
            err,
            ConfigError::Syntax {
                kind: SyntaxErrorKind::DuplicateDefinition,
                ..
            }
        ));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let err = parse_err("class A { x = 1 }");
        assert!(matches!(
            err,
            ConfigError::Syntax {
                kind: SyntaxErrorKind::MissingSemicolon,
                ..
            }
        ));
    }

    #[test]
    fn unterminated_block_is_reported() {
        let err = parse_err("class A { x = 1;");
        assert!(matches!(
            err,
            ConfigError::Syntax {
                kind: SyntaxErrorKind::UnterminatedBlock,
                ..
            }
        ));
    }

    #[test]
    fn bare_macro_statements_are_skipped() {
        let tree = parse(
            r#"class ADDON {
                units[] = {};
                VERSION_CONFIG;
                MACRO_CALL(a, b);
            };"#,
        );
        let class = tree.find_class(&["ADDON"]).unwrap();
        assert_eq!(class.properties.len(), 1);
    }

    #[test]
    fn parsing_twice_is_deterministic() {
        let source = r#"class CfgWeapons {
            class A;
            class B: A { items[] = {"a", "b"}; count = 3; };
        };"#;
        assert_eq!(parse(source), parse(source));
    }
}
