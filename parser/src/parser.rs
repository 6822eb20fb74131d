//! Recursive-descent parser for phil documents.
//!
//! The parser is collecting by default: syntax and type problems are
//! gathered into the [`ParseOutcome`] and parsing continues, so a single
//! pass reports every problem in a document. [`ParseOutcome::into_result`]
//! converts to fail-fast behavior.

use phil_core::{
    Definition, Diagnostic, FetchOptions, FormatOptions, Node, PhilError, PhilPath, PhilValue,
    Scope, SourceLocation, TypeRegistry, Word, as_str, fetch,
};
use tracing::debug;

use crate::lexer::{Token, TokenKind, tokenize};
use crate::source::{FileLoader, SourceLoader};

/// Everything a parse produced: the tree plus collected problems.
///
/// The tree is always present; on errors it holds whatever parsed
/// cleanly, which is useful for tooling that wants to report all problems
/// against a partial tree.
#[derive(Debug)]
pub struct ParseOutcome {
    /// The parsed document root.
    pub tree: Scope,
    /// Hard errors; a non-empty list means the document is not valid.
    pub errors: Vec<PhilError>,
    /// Soft problems such as unknown types or attributes.
    pub warnings: Vec<Diagnostic>,
}

impl ParseOutcome {
    /// Returns `true` when no hard errors were collected.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts to a result, failing when any hard error was collected.
    pub fn into_result(self) -> Result<Scope, Vec<PhilError>> {
        if self.errors.is_empty() {
            Ok(self.tree)
        } else {
            Err(self.errors)
        }
    }
}

/// A configured phil parser.
///
/// # Examples
///
/// ```
/// use phil_core::TypeRegistry;
/// use phil_parser::PhilParser;
///
/// let registry = TypeRegistry::with_builtins();
/// let outcome = PhilParser::new(&registry).parse_str(
///     "run {\n  cycles = 3\n    .type = int\n}\n",
///     "doc",
/// );
/// assert!(outcome.is_clean());
/// assert!(outcome.tree.get("run.cycles").next().is_some());
/// ```
pub struct PhilParser<'r> {
    registry: &'r TypeRegistry,
    loader: Box<dyn SourceLoader>,
}

impl<'r> PhilParser<'r> {
    /// Creates a parser resolving includes from the filesystem.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            loader: Box::new(FileLoader),
        }
    }

    /// Replaces the include loader (builder style).
    pub fn with_loader(mut self, loader: Box<dyn SourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Parses a document held in memory. `source` names the document in
    /// locations and resolves its relative includes.
    pub fn parse_str(&self, text: &str, source: &str) -> ParseOutcome {
        let mut include_stack = vec![source.to_string()];
        self.parse_internal(text, source, &mut include_stack)
    }

    /// Loads and parses a document through the include loader.
    pub fn parse_file(&self, reference: &str) -> ParseOutcome {
        match self.loader.load(reference, None) {
            Ok((text, id)) => {
                let mut include_stack = vec![id.clone()];
                self.parse_internal(&text, &id, &mut include_stack)
            }
            Err(err) => ParseOutcome {
                tree: Scope::root(),
                errors: vec![PhilError::syntax(
                    format!("cannot read {reference}: {err}"),
                    SourceLocation::unknown(),
                )],
                warnings: Vec::new(),
            },
        }
    }

    fn parse_internal(
        &self,
        text: &str,
        source: &str,
        include_stack: &mut Vec<String>,
    ) -> ParseOutcome {
        debug!(source, "parsing document");
        let (tokens, lex_errors) = tokenize(text, source);
        let mut parse = Parse {
            tokens,
            pos: 0,
            source,
            registry: self.registry,
            loader: self.loader.as_ref(),
            include_stack,
            path: PhilPath::root(),
            errors: lex_errors,
            warnings: Vec::new(),
        };
        let mut tree = Scope::root();
        parse.parse_statements(&mut tree, true);
        parse.check_duplicates(&tree, &PhilPath::root());
        ParseOutcome {
            tree,
            errors: parse.errors,
            warnings: parse.warnings,
        }
    }
}

/// Parses a document, failing when any problem is found.
///
/// Includes resolve from the filesystem relative to `source`.
pub fn parse(
    text: &str,
    source: &str,
    registry: &TypeRegistry,
) -> Result<Scope, Vec<PhilError>> {
    PhilParser::new(registry).parse_str(text, source).into_result()
}

/// Parses a document with a custom include loader, failing when any
/// problem is found.
pub fn parse_with_loader(
    text: &str,
    source: &str,
    registry: &TypeRegistry,
    loader: Box<dyn SourceLoader>,
) -> Result<Scope, Vec<PhilError>> {
    PhilParser::new(registry)
        .with_loader(loader)
        .parse_str(text, source)
        .into_result()
}

/// Rewrites a master document with new default values.
///
/// `new_defaults` is parsed as a working document and merged over the
/// master; the result is rendered back with attributes so it can replace
/// the original master text. Unrecognized or ill-typed defaults fail.
pub fn change_default_phil_values(
    master_text: &str,
    new_defaults: &str,
    registry: &TypeRegistry,
) -> Result<String, Vec<PhilError>> {
    let master = parse(master_text, "master", registry)?;
    let defaults = parse(new_defaults, "new_defaults", registry)?;
    let result = fetch(
        &master,
        &[&defaults],
        registry,
        &FetchOptions {
            strict: true,
            ..FetchOptions::default()
        },
    )
    .map_err(|e| vec![e])?;
    Ok(as_str(
        &result.merged,
        &FormatOptions {
            attributes_level: 2,
            expert_level: None,
        },
    ))
}

struct Parse<'a> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'a str,
    registry: &'a TypeRegistry,
    loader: &'a dyn SourceLoader,
    include_stack: &'a mut Vec<String>,
    path: PhilPath,
    errors: Vec<PhilError>,
    warnings: Vec<Diagnostic>,
}

impl Parse<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_newlines(&mut self) {
        while matches!(
            self.peek(),
            Some(Token {
                kind: TokenKind::Newline,
                ..
            })
        ) {
            self.pos += 1;
        }
    }

    fn here(&self) -> SourceLocation {
        self.peek()
            .map(|t| t.location.clone())
            .unwrap_or_else(|| SourceLocation::new(self.source, 0, 0))
    }

    fn error(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.errors.push(PhilError::syntax(message, location));
    }

    /// Parses statements into `scope` until `}` (or end of input at top
    /// level).
    fn parse_statements(&mut self, scope: &mut Scope, top_level: bool) {
        loop {
            self.skip_newlines();
            let Some(token) = self.peek().cloned() else {
                if !top_level {
                    let location = SourceLocation::new(self.source, 0, 0);
                    self.error(
                        format!("unexpected end of input; missing '}}' for scope {}", self.path),
                        location,
                    );
                }
                return;
            };
            match &token.kind {
                TokenKind::RBrace => {
                    self.pos += 1;
                    if top_level {
                        self.error("unmatched '}'", token.location);
                        continue;
                    }
                    return;
                }
                TokenKind::Word(word) if word == "include" => self.parse_include(scope),
                TokenKind::Word(word) if word.starts_with('.') && word.len() > 1 => {
                    self.parse_attribute_line(scope);
                }
                TokenKind::Word(_) => self.parse_object(scope),
                _ => {
                    self.pos += 1;
                    self.error(
                        format!("expected a name, found {}", describe(&token.kind)),
                        token.location,
                    );
                }
            }
        }
    }

    /// Flags sibling definitions that repeat a name without any instance
    /// declaring `.multiple`. Repeated scope blocks are left alone; their
    /// cardinality is settled against the master at fetch time.
    fn check_duplicates(&mut self, scope: &Scope, path: &PhilPath) {
        let multiple_names: Vec<&str> = scope
            .active_objects()
            .filter_map(|n| n.as_definition())
            .filter(|d| d.multiple)
            .map(|d| d.name.as_str())
            .collect();
        let mut seen: Vec<&str> = Vec::new();
        let mut reported: Vec<&str> = Vec::new();
        for def in scope.active_objects().filter_map(|n| n.as_definition()) {
            let name = def.name.as_str();
            if multiple_names.contains(&name) {
                continue;
            }
            if seen.contains(&name) {
                if !reported.contains(&name) {
                    self.errors.push(PhilError::Multiplicity {
                        path: path.push(name),
                        message: "defined more than once; declare .multiple to allow repeats"
                            .to_string(),
                        location: def.location.clone(),
                    });
                    reported.push(name);
                }
            } else {
                seen.push(name);
            }
        }
        for sub in scope.active_objects().filter_map(|n| n.as_scope()) {
            self.check_duplicates(sub, &path.push(&sub.name));
        }
    }

    /// Parses `name = values`, `name { ... }`, or the attribute-heavy
    /// `name\n .attr = ...\n{ ... }` form. A leading `!` disables the
    /// object.
    fn parse_object(&mut self, scope: &mut Scope) {
        let Some(token) = self.bump() else { return };
        let TokenKind::Word(raw_name) = token.kind else {
            return;
        };
        let location = token.location;
        let (name, disabled) = match raw_name.strip_prefix('!') {
            Some(rest) => (rest.to_string(), true),
            None => (raw_name, false),
        };
        if name.is_empty() {
            self.error("missing name after '!'", location);
            return;
        }

        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Equals) => {
                self.pos += 1;
                let words = self.parse_value_words();
                let leaf = name.rsplit('.').next().unwrap_or(&name).to_string();
                let mut def = Definition::new(&leaf, "", words);
                def.location = location;
                def.disabled = disabled;
                // Keep error paths full for dotted names.
                let saved = self.path.clone();
                if let Some((prefix, _)) = name.rsplit_once('.') {
                    for segment in prefix.split('.') {
                        self.path = self.path.push(segment);
                    }
                }
                self.parse_definition_values(&mut def);
                for attr in self.parse_pending_attributes() {
                    self.apply_definition_attribute(&mut def, attr);
                }
                if def.type_name.is_empty() && def.words.len() > 1 {
                    self.warnings.push(
                        Diagnostic::warning(
                            "type could not be determined; values are kept as a list of words",
                        )
                        .at_path(self.path.push(&def.name)),
                    );
                }
                self.path = saved;
                adopt_dotted(scope, &name, Node::Definition(def));
            }
            Some(TokenKind::LBrace) => {
                self.pos += 1;
                self.parse_scope_body(scope, &name, disabled, false, location, Vec::new());
            }
            // `name multiple { ... }` is shorthand for `.multiple = True`.
            Some(TokenKind::Word(marker)) if marker == "multiple" => {
                self.pos += 1;
                if matches!(
                    self.peek(),
                    Some(Token {
                        kind: TokenKind::LBrace,
                        ..
                    })
                ) {
                    self.pos += 1;
                    self.parse_scope_body(scope, &name, disabled, true, location, Vec::new());
                } else {
                    self.error(
                        format!("expected '{{' after \"{name} multiple\""),
                        location,
                    );
                }
            }
            Some(TokenKind::Newline) => {
                // Attributes may sit between the name and its opening
                // brace.
                let pending = self.parse_pending_attributes();
                if matches!(
                    self.peek(),
                    Some(Token {
                        kind: TokenKind::LBrace,
                        ..
                    })
                ) {
                    self.pos += 1;
                    self.parse_scope_body(scope, &name, disabled, false, location, pending);
                } else {
                    self.error(format!("expected '=' or '{{' after \"{name}\""), location);
                }
            }
            _ => {
                let here = self.here();
                self.error(format!("expected '=' or '{{' after \"{name}\""), here);
                self.pos += 1;
            }
        }
    }

    fn parse_scope_body(
        &mut self,
        parent: &mut Scope,
        name: &str,
        disabled: bool,
        multiple: bool,
        location: SourceLocation,
        pending: Vec<AttributeLine>,
    ) {
        let leaf = name.rsplit('.').next().unwrap_or(name);
        let mut sub = Scope::new(leaf);
        sub.location = location;
        sub.disabled = disabled;
        sub.multiple = multiple;
        for attr in pending {
            self.apply_scope_attribute(&mut sub, attr);
        }
        let saved = self.path.clone();
        self.path = self.path.push(name);
        self.parse_statements(&mut sub, false);
        self.path = saved;
        adopt_dotted(parent, name, Node::Scope(sub));
    }

    /// Reads value words up to the end of the line.
    fn parse_value_words(&mut self) -> Vec<Word> {
        let mut words = Vec::new();
        loop {
            let Some(token) = self.peek().cloned() else {
                return words;
            };
            match token.kind {
                TokenKind::Newline => {
                    self.pos += 1;
                    return words;
                }
                TokenKind::Word(text) => {
                    self.pos += 1;
                    words.push(Word::unquoted(&text).at(token.location));
                }
                TokenKind::Quoted(text, quote) => {
                    self.pos += 1;
                    words.push(Word::quoted(&text, quote).at(token.location));
                }
                // A closing brace ends the value line so one-line scopes
                // like `run { cycles = 5 }` work; it is left for the
                // enclosing scope to consume.
                TokenKind::RBrace => return words,
                TokenKind::LBrace | TokenKind::Equals => {
                    self.pos += 1;
                    self.error(
                        format!("{} is not allowed in a value", describe(&token.kind)),
                        token.location,
                    );
                }
            }
        }
    }

    /// Collects `.attr = ...` lines separated by newlines, for the form
    /// where scope attributes precede the opening brace.
    fn parse_pending_attributes(&mut self) -> Vec<AttributeLine> {
        let mut pending = Vec::new();
        loop {
            self.skip_newlines();
            let Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) = self.peek()
            else {
                return pending;
            };
            if !word.starts_with('.') || word.len() < 2 {
                return pending;
            }
            if let Some(attr) = self.read_attribute_line() {
                pending.push(attr);
            }
        }
    }

    /// Parses an attribute line and attaches it to the most recent object
    /// in `scope`, or to `scope` itself when it has none yet.
    fn parse_attribute_line(&mut self, scope: &mut Scope) {
        let Some(attr) = self.read_attribute_line() else {
            return;
        };
        match scope.objects.last_mut() {
            Some(Node::Definition(def)) => self.apply_definition_attribute(def, attr),
            Some(Node::Scope(sub)) => self.apply_scope_attribute(sub, attr),
            None => self.apply_scope_attribute(scope, attr),
        }
    }

    fn read_attribute_line(&mut self) -> Option<AttributeLine> {
        let token = self.bump()?;
        let TokenKind::Word(word) = token.kind else {
            return None;
        };
        let name = word[1..].to_string();
        if !matches!(
            self.peek(),
            Some(Token {
                kind: TokenKind::Equals,
                ..
            })
        ) {
            self.error(format!("expected '=' after .{name}"), token.location);
            return None;
        }
        self.pos += 1;
        let words = self.parse_value_words();
        Some(AttributeLine {
            name,
            words,
            location: token.location,
        })
    }

    fn apply_definition_attribute(&mut self, def: &mut Definition, attr: AttributeLine) {
        match attr.name.as_str() {
            "type" => {
                let Some(type_name) = single_word(&attr.words) else {
                    self.error("expected a single type name", attr.location);
                    return;
                };
                if self.registry.resolve(&type_name).is_none() {
                    self.warnings.push(
                        Diagnostic::warning(format!(
                            "unknown type \"{type_name}\"; values are kept as plain words"
                        ))
                        .at_path(self.path.push(&def.name)),
                    );
                }
                def.type_name = type_name;
                self.parse_definition_values(def);
            }
            "help" => def.help = joined_text(&attr.words),
            "caption" => def.caption = joined_text(&attr.words),
            "style" => def.style = joined_text(&attr.words),
            "multiple" => self.read_bool(&attr, &mut def.multiple),
            "optional" => self.read_bool(&attr, &mut def.optional),
            "deprecated" => self.read_bool(&attr, &mut def.deprecated),
            "expert_level" => self.read_level(&attr, &mut def.expert_level),
            other => {
                let message = format!("unknown attribute .{other}");
                self.error(message, attr.location);
            }
        }
    }

    fn apply_scope_attribute(&mut self, scope: &mut Scope, attr: AttributeLine) {
        match attr.name.as_str() {
            "help" => scope.help = joined_text(&attr.words),
            "caption" => scope.caption = joined_text(&attr.words),
            "style" => scope.style = joined_text(&attr.words),
            "multiple" => self.read_bool(&attr, &mut scope.multiple),
            "optional" => self.read_bool(&attr, &mut scope.optional),
            "expert_level" => self.read_level(&attr, &mut scope.expert_level),
            other => {
                let message = format!("attribute .{other} is not allowed on a scope");
                self.error(message, attr.location);
            }
        }
    }

    fn read_bool(&mut self, attr: &AttributeLine, slot: &mut bool) {
        match single_word(&attr.words).as_deref().map(str::to_ascii_lowercase) {
            Some(text) if matches!(text.as_str(), "true" | "yes" | "on" | "1") => *slot = true,
            Some(text) if matches!(text.as_str(), "false" | "no" | "off" | "0") => *slot = false,
            _ => self.error(
                format!(".{} expects True or False", attr.name),
                attr.location.clone(),
            ),
        }
    }

    fn read_level(&mut self, attr: &AttributeLine, slot: &mut Option<u32>) {
        match single_word(&attr.words).and_then(|w| w.parse::<u32>().ok()) {
            Some(level) => *slot = Some(level),
            None => self.error(
                format!(".{} expects a non-negative integer", attr.name),
                attr.location.clone(),
            ),
        }
    }

    /// Parses the definition's raw words through its current type handler.
    ///
    /// Runs again whenever `.type` changes. Definitions with no declared
    /// type, and definitions with an unknown type, keep one string value
    /// per word.
    fn parse_definition_values(&mut self, def: &mut Definition) {
        match self.registry.resolve(&def.type_name) {
            Some(handler) => match handler.parse(&def.words) {
                Ok(values) => def.values = values,
                Err(error) => {
                    self.errors
                        .push(error.with_path(self.path.push(&def.name)));
                    def.values = Vec::new();
                }
            },
            None => {
                def.values = def
                    .words
                    .iter()
                    .map(|w| PhilValue::String(w.value.clone()))
                    .collect();
            }
        }
    }

    /// Parses `include file <reference>` and splices the included
    /// document's objects in place.
    fn parse_include(&mut self, scope: &mut Scope) {
        let Some(include_token) = self.bump() else { return };
        let location = include_token.location;
        let keyword = self.bump();
        if keyword.as_ref().and_then(|t| t.word_text()) != Some("file") {
            self.error("expected \"file\" after include", location);
            return;
        }
        let Some(reference) = self.bump().and_then(|t| t.word_text().map(str::to_string)) else {
            self.error("expected a file name after include file", location);
            return;
        };

        let (text, id) = match self.loader.load(&reference, Some(self.source)) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.error(format!("cannot include {reference}: {err}"), location);
                return;
            }
        };
        if self.include_stack.contains(&id) {
            self.error(format!("circular include of {reference}"), location);
            return;
        }
        debug!(%reference, %id, "processing include");
        self.include_stack.push(id.clone());
        let (tokens, lex_errors) = tokenize(&text, &id);
        let mut nested = Parse {
            tokens,
            pos: 0,
            source: &id,
            registry: self.registry,
            loader: self.loader,
            include_stack: &mut *self.include_stack,
            path: self.path.clone(),
            errors: lex_errors,
            warnings: Vec::new(),
        };
        let mut included = Scope::root();
        nested.parse_statements(&mut included, true);
        self.errors.extend(nested.errors);
        self.warnings.extend(nested.warnings);
        self.include_stack.pop();

        for node in included.objects {
            scope.adopt(node);
        }
    }
}

/// Adopts `node` into `scope` under a possibly dotted name.
///
/// Working documents may write `run.cycles = 8` instead of spelling out
/// the enclosing blocks. Each dotted segment reuses an existing sibling
/// scope of that name when one is present, so `run.cycles` and
/// `run.damping` land in the same expanded block.
fn adopt_dotted(scope: &mut Scope, name: &str, node: Node) {
    let Some((head, rest)) = name.split_once('.') else {
        scope.adopt(node);
        return;
    };
    let existing = scope.objects.iter_mut().find_map(|n| match n {
        Node::Scope(sub) if sub.name == head && !sub.multiple => Some(sub),
        _ => None,
    });
    match existing {
        Some(sub) => adopt_dotted(sub, rest, node),
        None => {
            let mut wrapper = Scope::new(head);
            wrapper.location = node.location().clone();
            adopt_dotted(&mut wrapper, rest, node);
            scope.adopt(Node::Scope(wrapper));
        }
    }
}

struct AttributeLine {
    name: String,
    words: Vec<Word>,
    location: SourceLocation,
}

fn single_word(words: &[Word]) -> Option<String> {
    match words {
        [word] => Some(word.value.clone()),
        _ => None,
    }
}

fn joined_text(words: &[Word]) -> Option<String> {
    if words.is_empty() {
        return None;
    }
    Some(
        words
            .iter()
            .map(|w| w.value.clone())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn describe(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Word(_) => "a word",
        TokenKind::Quoted(..) => "a quoted string",
        TokenKind::LBrace => "'{'",
        TokenKind::RBrace => "'}'",
        TokenKind::Equals => "'='",
        TokenKind::Newline => "end of line",
    }
}
