//! Logos-based lexer for condition expressions.
//!
//! Keywords are case-sensitive: `and` is a keyword, `AND` is an identifier.
//! Identifiers may contain `-` and digits so codec names such as `dts-hd` and
//! `h265` need no quoting.

use logos::Logos;
use std::fmt;

use crate::error::LexError;

/// Patterns recognized by the generated lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("true")]
    #[token("false")]
    Boolean,

    #[token("==")]
    Eq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Lte,
    #[token("<")]
    Lt,
    #[token(">=")]
    Gte,
    #[token(">")]
    Gt,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    String,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_\-]*")]
    Ident,

    /// Integer or decimal (`42`, `3.14`).
    #[regex(r"[0-9]+(\.[0-9]+)?", priority = 4)]
    Number,

    /// Byte size with binary unit (`15M`, `192k`, `1.5GB`, `2GiB`).
    #[regex(r"[0-9]+(\.[0-9]+)?[kKmMgGtT]([iI]?[bB])?", priority = 4)]
    Size,

    /// Duration made of hour/minute/second parts (`90s`, `2h`, `1h30min`).
    #[regex(r"([0-9]+(h|min|s))+", priority = 4)]
    Duration,

    /// Anything else that starts with a digit is a malformed literal.
    #[regex(r"[0-9][0-9a-zA-Z_.]*", priority = 1)]
    InvalidNumber,
}

/// Token categories seen by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    String,
    Number,
    Size,
    Duration,
    Boolean,
    And,
    Or,
    Not,
    In,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eof,
}

impl TokenKind {
    /// Whether this kind can follow an argument name or a call as a comparison.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Lt | Self::Lte | Self::Gt | Self::Gte | Self::In
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ident => "identifier",
            Self::String => "string",
            Self::Number => "number",
            Self::Size => "size literal",
            Self::Duration => "duration literal",
            Self::Boolean => "boolean",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Not => "'not'",
            Self::In => "'in'",
            Self::Eq => "'=='",
            Self::Neq => "'!='",
            Self::Lt => "'<'",
            Self::Lte => "'<='",
            Self::Gt => "'>'",
            Self::Gte => "'>='",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Comma => "','",
            Self::Eof => "end of expression",
        };
        f.write_str(name)
    }
}

/// A lexed token with its location in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text; string tokens exclude their quotes.
    pub text: String,
    /// 0-based byte offset.
    pub position: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

/// Compute the 1-based line and column of a byte offset.
pub(crate) fn line_column(source: &str, position: usize) -> (usize, usize) {
    let before = &source[..position.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

fn classify(raw: RawToken) -> TokenKind {
    match raw {
        RawToken::And => TokenKind::And,
        RawToken::Or => TokenKind::Or,
        RawToken::Not => TokenKind::Not,
        RawToken::In => TokenKind::In,
        RawToken::Boolean => TokenKind::Boolean,
        RawToken::Eq => TokenKind::Eq,
        RawToken::Neq => TokenKind::Neq,
        RawToken::Lte => TokenKind::Lte,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gte => TokenKind::Gte,
        RawToken::Gt => TokenKind::Gt,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::Comma => TokenKind::Comma,
        RawToken::String => TokenKind::String,
        RawToken::Ident => TokenKind::Ident,
        RawToken::Number => TokenKind::Number,
        RawToken::Size => TokenKind::Size,
        RawToken::Duration => TokenKind::Duration,
        // Rejected before classification.
        RawToken::InvalidNumber => TokenKind::Number,
    }
}

/// Tokenize expression source text.
///
/// The returned stream always ends with a [`TokenKind::Eof`] token, so empty or
/// whitespace-only input yields exactly one token.
///
/// # Errors
///
/// Returns a [`LexError`] for unterminated strings, malformed numeric, size or
/// duration literals, and characters outside the language.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();

        let raw = match result {
            Ok(RawToken::InvalidNumber) => {
                return Err(LexError::new(
                    span.start,
                    format!("Invalid numeric literal '{}'", slice),
                ));
            }
            Ok(raw) => raw,
            Err(()) => {
                let first = slice.chars().next().unwrap_or(' ');
                let message = if first == '"' || first == '\'' {
                    "Unterminated string".to_string()
                } else {
                    format!("Unexpected character '{}'", first)
                };
                return Err(LexError::new(span.start, message));
            }
        };

        let text = if raw == RawToken::String {
            slice[1..slice.len() - 1].to_string()
        } else {
            slice.to_string()
        };
        let (line, column) = line_column(source, span.start);
        tokens.push(Token {
            kind: classify(raw),
            text,
            position: span.start,
            line,
            column,
        });
    }

    let (line, column) = line_column(source, source.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        position: source.len(),
        line,
        column,
    });

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Eof)
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_empty_and_whitespace_yield_eof() {
        for source in ["", "   \t\n  "] {
            let tokens = tokenize(source).unwrap();
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].kind, TokenKind::Eof);
        }
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(kinds("audio"), vec![TokenKind::Ident]);
        assert_eq!(texts("not_commentary"), vec!["not_commentary"]);
        assert_eq!(texts("dts-hd"), vec!["dts-hd"]);
        assert_eq!(texts("h265"), vec!["h265"]);
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(kinds("and"), vec![TokenKind::And]);
        assert_eq!(kinds("or"), vec![TokenKind::Or]);
        assert_eq!(kinds("not"), vec![TokenKind::Not]);
        assert_eq!(kinds("in"), vec![TokenKind::In]);
        assert_eq!(kinds("true false"), vec![TokenKind::Boolean, TokenKind::Boolean]);
        assert_eq!(kinds("AND"), vec![TokenKind::Ident]);
        assert_eq!(kinds("True"), vec![TokenKind::Ident]);
        assert_eq!(kinds("android"), vec![TokenKind::Ident]);
    }

    #[test]
    fn test_numbers_sizes_durations() {
        assert_eq!(kinds("42 3.14 0"), vec![TokenKind::Number; 3]);
        assert_eq!(kinds("15M 192k 1GB 1.5GB 500MB"), vec![TokenKind::Size; 5]);
        assert_eq!(texts("1.5GB"), vec!["1.5GB"]);
        assert_eq!(kinds("90s 2h 1h30min"), vec![TokenKind::Duration; 3]);
    }

    #[test]
    fn test_invalid_numeric_literal() {
        let err = tokenize("count(audio) >= 12abc").unwrap_err();
        assert_eq!(err.position, 16);
        assert_eq!(err.message, "Invalid numeric literal '12abc'");

        let err = tokenize("1.2.3").unwrap_err();
        assert!(err.message.starts_with("Invalid numeric literal"));
    }

    #[test]
    fn test_strings() {
        assert_eq!(texts(r#""hello world""#), vec!["hello world"]);
        assert_eq!(texts("'dts-hd'"), vec!["dts-hd"]);
        assert_eq!(texts(r#""""#), vec![""]);
        assert_eq!(kinds("'x'"), vec![TokenKind::String]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize(r#"title == "hello"#).unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!(err.position, 9);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("exists(audio) @").unwrap_err();
        assert_eq!(err.message, "Unexpected character '@'");
        assert_eq!(err.position, 14);
    }

    #[test]
    fn test_operators_and_delimiters() {
        assert_eq!(
            kinds("== != < <= > >= in"),
            vec![
                TokenKind::Eq,
                TokenKind::Neq,
                TokenKind::Lt,
                TokenKind::Lte,
                TokenKind::Gt,
                TokenKind::Gte,
                TokenKind::In
            ]
        );
        assert_eq!(
            kinds("()[],"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a == b").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
        let columns: Vec<_> = tokens.iter().map(|t| t.column).collect();
        assert_eq!(positions, vec![0, 2, 5, 6]);
        assert_eq!(columns, vec![1, 3, 6, 7]);
        assert!(tokens.iter().all(|t| t.line == 1));
    }

    #[test]
    fn test_multiline_positions() {
        let tokens = tokenize("exists(audio)\n  and count(video) > 0").unwrap();
        let and = tokens.iter().find(|t| t.kind == TokenKind::And).unwrap();
        assert_eq!(and.line, 2);
        assert_eq!(and.column, 3);
        assert_eq!(and.position, 16);
    }

    #[test]
    fn test_call_stream() {
        assert_eq!(
            kinds("exists(audio, lang == eng)"),
            vec![
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::RParen
            ]
        );
    }
}
