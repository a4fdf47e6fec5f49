use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::error::{ConfigError, Position};
use crate::lexer::{Lexer, Token, TokenKind};

const MAX_EXPANSION_DEPTH: usize = 32;
const MAX_INCLUDE_DEPTH: usize = 16;

/// A recorded `#define`.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    /// `None` for object-like macros.
    pub params: Option<Vec<String>>,
    pub body: String,
}

/// Macro table scoped to a single parse call. Never shared between parses,
/// so concurrent files cannot interfere.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, macro_def: Macro) {
        trace!("defining macro {}", macro_def.name);
        self.macros.insert(macro_def.name.clone(), macro_def);
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// Collaborator that turns `#include` paths into file content.
///
/// Implementations must be safe to call from independent parse calls
/// running on different threads.
pub trait IncludeLoader: Sync {
    /// Return the content for `path`, or `None` when it cannot be resolved.
    fn load(&self, path: &str) -> Option<String>;
}

/// Ignores every include. Missing headers are routine in derapped addon
/// dumps, so skipping is the default rather than an error.
pub struct NoIncludes;

impl IncludeLoader for NoIncludes {
    fn load(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Resolves includes relative to a base directory, tolerating the
/// backslash-rooted paths the dialect uses.
pub struct LocalIncludes {
    base: PathBuf,
}

impl LocalIncludes {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl IncludeLoader for LocalIncludes {
    fn load(&self, path: &str) -> Option<String> {
        let normalized = path.trim_start_matches(['\\', '/']).replace('\\', "/");
        let candidate = self.base.join(normalized);
        match fs::read_to_string(&candidate) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!("include {} not readable: {}", candidate.display(), e);
                None
            }
        }
    }
}

/// Expands macros and includes, producing the token stream the structural
/// parser consumes. Comments are dropped here.
pub struct Preprocessor<'a> {
    table: MacroTable,
    loader: &'a dyn IncludeLoader,
}

impl<'a> Preprocessor<'a> {
    pub fn new(loader: &'a dyn IncludeLoader) -> Self {
        Self {
            table: MacroTable::new(),
            loader,
        }
    }

    /// Macro table built so far; useful for diagnostics.
    pub fn macros(&self) -> &MacroTable {
        &self.table
    }

    pub fn process(&mut self, source: &str) -> Result<Vec<Token>, ConfigError> {
        self.process_inner(source, 0)
    }

    fn process_inner(&mut self, source: &str, include_depth: usize) -> Result<Vec<Token>, ConfigError> {
        let tokens = Lexer::tokenize(source)?;
        let mut output = Vec::with_capacity(tokens.len());
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index];
            match &token.kind {
                TokenKind::Comment(_) => {
                    index += 1;
                }
                TokenKind::Directive { name, text } => {
                    self.handle_directive(name, text, token.position, include_depth, &mut output)?;
                    index += 1;
                }
                TokenKind::Ident(name) if self.table.get(name).is_some() => {
                    index = self.expand_occurrence(source, &tokens, index, &mut output)?;
                }
                _ => {
                    output.push(token.clone());
                    index += 1;
                }
            }
        }
        Ok(output)
    }

    fn handle_directive(
        &mut self,
        name: &str,
        text: &str,
        position: Position,
        include_depth: usize,
        output: &mut Vec<Token>,
    ) -> Result<(), ConfigError> {
        match name {
            "define" => self.handle_define(text, position),
            "undef" => {
                self.table.undefine(text.trim());
                Ok(())
            }
            "include" => {
                let path = text.trim().trim_matches(['"', '<', '>']);
                if include_depth >= MAX_INCLUDE_DEPTH {
                    return Err(ConfigError::macro_error(
                        format!("include depth limit reached at `{path}`"),
                        position,
                    ));
                }
                match self.loader.load(path) {
                    Some(content) => {
                        debug!("including {path}");
                        let included = self.process_inner(&content, include_depth + 1)?;
                        output.extend(included);
                        Ok(())
                    }
                    None => {
                        warn!("skipping unresolvable include `{path}`");
                        Ok(())
                    }
                }
            }
            other => {
                // Conditional compilation does not occur in derapped output.
                warn!("ignoring unsupported directive `#{other}`");
                Ok(())
            }
        }
    }

    fn handle_define(&mut self, text: &str, position: Position) -> Result<(), ConfigError> {
        let text = text.trim_start();
        let name_end = text
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(text.len());
        let name = &text[..name_end];
        if name.is_empty() {
            return Err(ConfigError::macro_error("malformed #define", position));
        }
        let rest = &text[name_end..];

        // A parameter list only counts when the paren hugs the name.
        let (params, body) = if let Some(after_paren) = rest.strip_prefix('(') {
            let close = after_paren.find(')').ok_or_else(|| {
                ConfigError::macro_error(
                    format!("unterminated parameter list in #define {name}"),
                    position,
                )
            })?;
            let params: Vec<String> = after_paren[..close]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            (Some(params), after_paren[close + 1..].trim().to_string())
        } else {
            (None, rest.trim().to_string())
        };

        self.table.define(Macro {
            name: name.to_string(),
            params,
            body,
        });
        Ok(())
    }

    /// Expand the macro occurrence starting at `tokens[index]` and append
    /// the resulting tokens to `output`. Returns the index of the first
    /// unconsumed token.
    fn expand_occurrence(
        &self,
        source: &str,
        tokens: &[Token],
        index: usize,
        output: &mut Vec<Token>,
    ) -> Result<usize, ConfigError> {
        let token = &tokens[index];
        let name = match &token.kind {
            TokenKind::Ident(name) => name.clone(),
            _ => unreachable!("expand_occurrence called on non-identifier"),
        };
        let macro_def = self.table.get(&name).expect("caller checked table");

        let (raw_args, next_index) = if macro_def.params.is_some() {
            match tokens.get(index + 1) {
                Some(Token {
                    kind: TokenKind::LParen,
                    ..
                }) => {
                    let open = index + 1;
                    let close = match_paren(tokens, open).ok_or_else(|| {
                        ConfigError::macro_error(
                            format!("unterminated invocation of macro {name}"),
                            token.position,
                        )
                    })?;
                    let inner =
                        &source[tokens[open].position.offset + 1..tokens[close].position.offset];
                    (Some(inner.to_string()), close + 1)
                }
                // A function-like macro name without arguments is left alone.
                _ => {
                    output.push(token.clone());
                    return Ok(index + 1);
                }
            }
        } else {
            (None, index + 1)
        };

        let mut stack = Vec::new();
        let expanded = self.expand_invocation(&name, raw_args.as_deref(), token.position, &mut stack)?;
        trace!("expanded {name} -> {expanded}");

        let mut expansion_tokens = Lexer::tokenize(&expanded)
            .map_err(|e| match e {
                ConfigError::Lex { message, .. } => ConfigError::macro_error(
                    format!("expansion of {name} did not tokenize: {message}"),
                    token.position,
                ),
                other => other,
            })?;
        // Errors inside an expansion point at the invocation site.
        for t in &mut expansion_tokens {
            t.position = token.position;
        }
        output.extend(
            expansion_tokens
                .into_iter()
                .filter(|t| !matches!(t.kind, TokenKind::Comment(_))),
        );
        Ok(next_index)
    }

    /// Fully expand one macro invocation to text.
    fn expand_invocation(
        &self,
        name: &str,
        raw_args: Option<&str>,
        position: Position,
        stack: &mut Vec<String>,
    ) -> Result<String, ConfigError> {
        if stack.len() >= MAX_EXPANSION_DEPTH {
            return Err(ConfigError::macro_error(
                format!("macro expansion depth limit reached in {name}"),
                position,
            ));
        }
        let macro_def = self
            .table
            .get(name)
            .expect("expand_invocation called for unknown macro");

        let substituted = match (&macro_def.params, raw_args) {
            (None, _) => macro_def.body.clone(),
            (Some(params), Some(raw)) => {
                let args = split_arguments(raw);
                if args.len() != params.len() && !(params.is_empty() && raw.trim().is_empty()) {
                    return Err(ConfigError::macro_error(
                        format!(
                            "macro {name} expects {} argument(s), got {}",
                            params.len(),
                            args.len()
                        ),
                        position,
                    ));
                }
                // Arguments are expanded before substitution, so chains like
                // QUOTE(FUNC(x)) stringify the fully expanded text.
                let mut expanded_args = Vec::with_capacity(args.len());
                for arg in &args {
                    let expanded = self.expand_text(arg, position, stack)?;
                    expanded_args.push(expanded.trim().to_string());
                }
                substitute_params(&macro_def.body, params, &expanded_args)
            }
            (Some(_), None) => macro_def.body.clone(),
        };

        stack.push(name.to_string());
        let result = self.expand_text(&substituted, position, stack)?;
        stack.pop();
        Ok(result)
    }

    /// Scan text for macro names and expand them, leaving string literals
    /// untouched. Names already on the expansion stack are left alone.
    fn expand_text(
        &self,
        text: &str,
        position: Position,
        stack: &mut Vec<String>,
    ) -> Result<String, ConfigError> {
        if stack.len() >= MAX_EXPANSION_DEPTH {
            return Err(ConfigError::macro_error(
                "macro expansion depth limit reached",
                position,
            ));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut result = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                let end = skip_string(&chars, i);
                result.extend(&chars[i..end]);
                i = end;
            } else if c.is_ascii_alphabetic() || c == '_' {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[i..j].iter().collect();
                let expandable = self
                    .table
                    .get(&word)
                    .filter(|_| !stack.iter().any(|n| n == &word));
                match expandable {
                    Some(macro_def) if macro_def.params.is_some() => {
                        // Function-like: needs an argument list right here.
                        let mut k = j;
                        while k < chars.len() && chars[k].is_whitespace() {
                            k += 1;
                        }
                        if k < chars.len() && chars[k] == '(' {
                            let close = match_paren_text(&chars, k).ok_or_else(|| {
                                ConfigError::macro_error(
                                    format!("unterminated invocation of macro {word}"),
                                    position,
                                )
                            })?;
                            let raw: String = chars[k + 1..close].iter().collect();
                            result.push_str(&self.expand_invocation(
                                &word,
                                Some(&raw),
                                position,
                                stack,
                            )?);
                            i = close + 1;
                        } else {
                            result.push_str(&word);
                            i = j;
                        }
                    }
                    Some(_) => {
                        result.push_str(&self.expand_invocation(&word, None, position, stack)?);
                        i = j;
                    }
                    None => {
                        result.push_str(&word);
                        i = j;
                    }
                }
            } else {
                result.push(c);
                i += 1;
            }
        }
        Ok(result)
    }
}

/// Substitute parameters into a macro body, handling `#param` stringify and
/// `##` token pasting. Text inside string literals is left untouched.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut result = String::with_capacity(body.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' {
            let end = skip_string(&chars, i);
            result.extend(&chars[i..end]);
            i = end;
        } else if c == '#' && i + 1 < chars.len() && chars[i + 1] == '#' {
            // Pasting: adjacent pieces simply join once the marker is gone.
            i += 2;
        } else if c == '#' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let word: String = chars[i + 1..j].iter().collect();
            if let Some(pos) = params.iter().position(|p| p == &word) {
                result.push_str(&stringify(&args[pos]));
                i = j;
            } else {
                result.push(c);
                i += 1;
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let word: String = chars[i..j].iter().collect();
            if let Some(pos) = params.iter().position(|p| p == &word) {
                result.push_str(&args[pos]);
            } else {
                result.push_str(&word);
            }
            i = j;
        } else {
            result.push(c);
            i += 1;
        }
    }
    result
}

/// Quote argument text. Arguments that already are a single string literal
/// pass through unchanged, matching how `QUOTE(CSTRING(x))` chains behave.
fn stringify(arg: &str) -> String {
    let trimmed = arg.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        return trimmed.to_string();
    }
    format!("\"{}\"", trimmed.replace('"', "\"\""))
}

/// Split macro arguments at top-level commas, respecting nested parens,
/// braces, brackets and string literals.
fn split_arguments(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = skip_string(&chars, i);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// Index just past the closing quote of the string starting at `start`.
fn skip_string(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '"' {
            if chars.get(i + 1) == Some(&'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index of the `)` matching the `(` at token index `open`.
fn match_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `)` matching the `(` at char index `open`.
fn match_paren_text(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                i = skip_string(chars, i);
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Number;
    use pretty_assertions::assert_eq;

    fn process(source: &str) -> Vec<TokenKind> {
        let mut pp = Preprocessor::new(&NoIncludes);
        pp.process(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn object_macro_substitutes() {
        let tokens = process("#define MASS 40\nmass = MASS;");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("mass".into()),
                TokenKind::Eq,
                TokenKind::Number(Number::Int(40)),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn function_macro_substitutes_positionally() {
        let tokens = process("#define PAIR(a,b) { a, b }\nitems[] = PAIR(1,2);");
        assert!(tokens.contains(&TokenKind::Number(Number::Int(1))));
        assert!(tokens.contains(&TokenKind::Number(Number::Int(2))));
        assert!(tokens.contains(&TokenKind::LBrace));
    }

    #[test]
    fn doubles_chain_expands() {
        let source = "#define GVAR(var1) DOUBLES(PREFIX,var1)\n\
                      #define DOUBLES(var1,var2) ##var1##_##var2\n\
                      #define PREFIX ace\n\
                      class GVAR(actions) {};";
        let tokens = process(source);
        assert!(tokens.contains(&TokenKind::Ident("ace_actions".into())));
    }

    #[test]
    fn quote_stringifies_expanded_argument() {
        let source = "#define QUOTE(var1) #var1\n\
                      #define FUNC(var1) DOUBLES(DOUBLES(PREFIX,fnc),var1)\n\
                      #define DOUBLES(var1,var2) ##var1##_##var2\n\
                      #define PREFIX ace\n\
                      onPlace = QUOTE(_this call FUNC(AddClacker);false);";
        let tokens = process(source);
        assert!(tokens.contains(&TokenKind::Str(
            "_this call ace_fnc_AddClacker;false".into()
        )));
    }

    #[test]
    fn cstring_resolves_through_string_macro() {
        let source = "#define CSTRING(var1) QUOTE(DOUBLES(STR,var1))\n\
                      #define DOUBLES(var1,var2) ##var1##_##var2\n\
                      #define QUOTE(var1) #var1\n\
                      #define STR_sortByWeightText \"Sort by Weight\"\n\
                      displayName = CSTRING(sortByWeightText);";
        let tokens = process(source);
        assert!(tokens.contains(&TokenKind::Str("Sort by Weight".into())));
    }

    #[test]
    fn argument_count_mismatch_is_an_error() {
        let mut pp = Preprocessor::new(&NoIncludes);
        let err = pp
            .process("#define PAIR(a,b) a b\nvalue = PAIR(1);")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Macro { .. }));
    }

    #[test]
    fn self_referential_macro_terminates() {
        let tokens = process("#define LOOP LOOP\nvalue = LOOP;");
        assert!(tokens.contains(&TokenKind::Ident("LOOP".into())));
    }

    #[test]
    fn undef_removes_macro() {
        let tokens = process("#define MASS 40\n#undef MASS\nmass = MASS;");
        assert!(tokens.contains(&TokenKind::Ident("MASS".into())));
    }

    #[test]
    fn unresolvable_include_is_skipped() {
        let tokens = process("#include \"script_component.hpp\"\nclass A {};");
        assert_eq!(tokens[0], TokenKind::Ident("class".into()));
    }

    #[test]
    fn function_macro_without_arguments_passes_through() {
        let tokens = process("#define F(x) x\nvalue = F;");
        assert!(tokens.contains(&TokenKind::Ident("F".into())));
    }

    #[test]
    fn comments_are_dropped() {
        let tokens = process("// banner\nclass A {}; /* trailing */");
        assert!(!tokens.iter().any(|t| matches!(t, TokenKind::Comment(_))));
    }

    #[test]
    fn split_arguments_respects_nesting() {
        assert_eq!(
            split_arguments("a, f(b, c), {d, e}"),
            vec!["a".to_string(), "f(b, c)".to_string(), "{d, e}".to_string()]
        );
        assert_eq!(split_arguments("\"a, b\""), vec!["\"a, b\"".to_string()]);
    }
}
