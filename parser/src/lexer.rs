//! Hand-rolled lexer for phil source text.
//!
//! Phil is line-oriented: a definition's values run to the end of the
//! line, so newlines are tokens. `#` starts a comment that runs to the end
//! of the line. A backslash immediately before a newline continues the
//! line. Quoted words (single or double quotes, backslash escapes) keep
//! their quote character so formatting can round-trip them.

use std::iter::Peekable;
use std::str::Chars;

use phil_core::{PhilError, SourceLocation};

/// What a token is.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A bare word.
    Word(String),
    /// A quoted word with its quote character.
    Quoted(String, char),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `=`
    Equals,
    /// End of a logical line.
    Newline,
}

/// A lexed token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    /// The word text, for `Word` and `Quoted` tokens.
    pub fn word_text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(text) | TokenKind::Quoted(text, _) => Some(text),
            _ => None,
        }
    }
}

/// Splits `text` into tokens, collecting lexical errors instead of
/// stopping at the first one.
///
/// `source` is the identifier (usually a file name) recorded in every
/// token's location.
///
/// # Examples
///
/// ```
/// use phil_parser::{tokenize, TokenKind};
///
/// let (tokens, errors) = tokenize("cycles = 3 # default\n", "doc");
/// assert!(errors.is_empty());
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::Word("cycles".to_string()),
///         TokenKind::Equals,
///         TokenKind::Word("3".to_string()),
///         TokenKind::Newline,
///     ]
/// );
/// ```
pub fn tokenize(text: &str, source: &str) -> (Vec<Token>, Vec<PhilError>) {
    let mut lexer = Lexer {
        chars: text.chars().peekable(),
        source,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.errors)
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    source: &'a str,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<PhilError>,
}

impl Lexer<'_> {
    fn here(&self) -> SourceLocation {
        SourceLocation::new(self.source, self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn push(&mut self, kind: TokenKind, location: SourceLocation) {
        self.tokens.push(Token { kind, location });
    }

    fn run(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            let location = self.here();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    // Collapse runs of blank lines into one token.
                    if !matches!(
                        self.tokens.last(),
                        None | Some(Token {
                            kind: TokenKind::Newline,
                            ..
                        })
                    ) {
                        self.push(TokenKind::Newline, location);
                    }
                }
                '#' => self.skip_comment(),
                '{' => {
                    self.bump();
                    self.push(TokenKind::LBrace, location);
                }
                '}' => {
                    self.bump();
                    self.push(TokenKind::RBrace, location);
                }
                '=' => {
                    self.bump();
                    self.push(TokenKind::Equals, location);
                }
                '"' | '\'' => self.lex_quoted(),
                '\\' => {
                    self.bump();
                    match self.chars.peek() {
                        // Line continuation.
                        Some('\n') => {
                            self.bump();
                        }
                        Some('\r') => {
                            self.bump();
                            if self.chars.peek() == Some(&'\n') {
                                self.bump();
                            }
                        }
                        _ => self.errors.push(PhilError::syntax(
                            "stray backslash outside a quoted string",
                            location,
                        )),
                    }
                }
                _ => self.lex_word(),
            }
        }
        // A final line without a trailing newline still terminates.
        if !matches!(
            self.tokens.last(),
            None | Some(Token {
                kind: TokenKind::Newline,
                ..
            })
        ) {
            let location = self.here();
            self.push(TokenKind::Newline, location);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_word(&mut self) {
        let location = self.here();
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || matches!(ch, '{' | '}' | '=' | '#' | '"' | '\'' | '\\') {
                break;
            }
            text.push(ch);
            self.bump();
        }
        self.push(TokenKind::Word(text), location);
    }

    fn lex_quoted(&mut self) {
        let location = self.here();
        let Some(quote) = self.bump() else { return };
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    self.errors
                        .push(PhilError::syntax("unterminated quoted string", location));
                    return;
                }
                Some('\n') => {
                    self.errors
                        .push(PhilError::syntax("unterminated quoted string", location));
                    // The newline still counts as a line end.
                    self.push(TokenKind::Newline, self.here());
                    return;
                }
                Some('\\') => match self.bump() {
                    Some(escaped) => {
                        // Only the quote character and the backslash are
                        // unescaped here; `\$` must survive for variable
                        // substitution to see it.
                        if escaped != quote && escaped != '\\' {
                            text.push('\\');
                        }
                        text.push(escaped);
                    }
                    None => {
                        self.errors
                            .push(PhilError::syntax("unterminated quoted string", location));
                        return;
                    }
                },
                Some(ch) if ch == quote => break,
                Some(ch) => text.push(ch),
            }
        }
        self.push(TokenKind::Quoted(text, quote), location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let (tokens, errors) = tokenize(text, "test");
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_scope_and_definition_tokens() {
        assert_eq!(
            kinds("run {\n  cycles = 3\n}\n"),
            vec![
                TokenKind::Word("run".to_string()),
                TokenKind::LBrace,
                TokenKind::Newline,
                TokenKind::Word("cycles".to_string()),
                TokenKind::Equals,
                TokenKind::Word("3".to_string()),
                TokenKind::Newline,
                TokenKind::RBrace,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        assert_eq!(
            kinds("# heading\n\n\nx = 1 # trailing\n"),
            vec![
                TokenKind::Word("x".to_string()),
                TokenKind::Equals,
                TokenKind::Word("1".to_string()),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_quoted_words_keep_quote_and_unescape() {
        assert_eq!(
            kinds("title = \"say \\\"hi\\\"\"\n"),
            vec![
                TokenKind::Word("title".to_string()),
                TokenKind::Equals,
                TokenKind::Quoted("say \"hi\"".to_string(), '"'),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_escaped_dollar_survives_quoting() {
        assert_eq!(
            kinds("x = \"\\$HOME\"\n"),
            vec![
                TokenKind::Word("x".to_string()),
                TokenKind::Equals,
                TokenKind::Quoted("\\$HOME".to_string(), '"'),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_line_continuation_joins_lines() {
        assert_eq!(
            kinds("xs = 1 \\\n  2\n"),
            vec![
                TokenKind::Word("xs".to_string()),
                TokenKind::Equals,
                TokenKind::Word("1".to_string()),
                TokenKind::Word("2".to_string()),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let (_, errors) = tokenize("x = \"oops\n", "test");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("unterminated"));
    }

    #[test]
    fn test_missing_final_newline_is_tolerated() {
        assert_eq!(
            kinds("x = 1"),
            vec![
                TokenKind::Word("x".to_string()),
                TokenKind::Equals,
                TokenKind::Word("1".to_string()),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_locations_are_one_based() {
        let (tokens, _) = tokenize("a = 1\nb = 2\n", "test");
        assert_eq!(tokens[0].location, SourceLocation::new("test", 1, 1));
        assert_eq!(tokens[4].location.line, 2);
    }
}
