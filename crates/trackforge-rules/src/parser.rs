//! Recursive-descent parser from expression text to [`Condition`].
//!
//! ```text
//! expression = or_expr
//! or_expr    = and_expr ("or" and_expr)*
//! and_expr   = not_expr ("and" not_expr)*
//! not_expr   = "not" not_expr | atom
//! atom       = "(" expression ")" | IDENT "(" args? ")" (op value)?
//! args       = arg ("," arg)*
//! arg        = IDENT op value | IDENT
//! op         = "==" | "!=" | "<" | "<=" | ">" | ">=" | "in"
//! value      = STRING | NUMBER | SIZE | DURATION | IDENT | BOOLEAN | list
//! list       = "[" value ("," value)* "]"
//! ```
//!
//! Function calls are collected generically and then handed to a builder per
//! [`Function`], which enforces that function's argument rules.

use trackforge_common::{parse_duration, parse_file_size, TrackType};

use crate::condition::{
    ClassificationCondition, Comparison, ComparisonOp, Condition, ContainerMetadataCondition,
    MetadataOp, MetadataValue, MultiLanguageCondition, NumericFilter, PluginMetadataCondition,
    StringMatch, TitleMatch, TrackFilters,
};
use crate::error::{ParseError, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::pattern::TitlePattern;

/// Maximum nesting of parentheses and `not`.
pub const MAX_DEPTH: usize = 50;

/// Filter names accepted inside `exists()` and `count()`, sorted.
const FILTER_NAMES: [&str; 11] = [
    "channels",
    "codec",
    "default",
    "forced",
    "height",
    "lang",
    "language",
    "not_commentary",
    "title",
    "title_regex",
    "width",
];

const TRACK_TYPE_NAMES: &str = "attachment, audio, subtitle, video";

/// Functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Exists,
    Count,
    MultiLanguage,
    Plugin,
    ContainerMeta,
    IsOriginal,
    IsDubbed,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "exists" => Some(Self::Exists),
            "count" => Some(Self::Count),
            "multi_language" => Some(Self::MultiLanguage),
            "plugin" => Some(Self::Plugin),
            "container_meta" => Some(Self::ContainerMeta),
            "is_original" => Some(Self::IsOriginal),
            "is_dubbed" => Some(Self::IsDubbed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Count => "count",
            Self::MultiLanguage => "multi_language",
            Self::Plugin => "plugin",
            Self::ContainerMeta => "container_meta",
            Self::IsOriginal => "is_original",
            Self::IsDubbed => "is_dubbed",
        }
    }
}

/// A literal on the right of an operator.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    /// Quoted string or bare identifier.
    Text(String),
    Integer(i64),
    Float(f64),
    Size { bytes: u64, text: String },
    Duration { seconds: f64, text: String },
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Size { text, .. } | Self::Duration { text, .. } => text.clone(),
            Self::Bool(b) => b.to_string(),
            Self::List(values) => values
                .iter()
                .map(Value::text)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

struct NamedArg {
    name: String,
    op: TokenKind,
    value: Value,
}

/// A parsed call before it is turned into a condition.
struct Call {
    function: Function,
    /// Token of the function name; builder errors point here.
    name_token: Token,
    positional: Vec<String>,
    named: Vec<NamedArg>,
    trailing: Option<(TokenKind, Value)>,
}

/// Parse expression text into a condition tree.
///
/// # Errors
///
/// Lexer failures, grammar violations, unknown functions or filters, bad
/// operators or values, and nesting deeper than [`MAX_DEPTH`].
///
/// # Example
///
/// ```
/// use trackforge_rules::{parse_expression, Condition};
///
/// let condition = parse_expression("exists(audio, lang == eng) and not exists(subtitle)").unwrap();
/// assert!(matches!(condition, Condition::And(ref c) if c.len() == 2));
/// ```
pub fn parse_expression(source: &str) -> Result<Condition> {
    if source.trim().is_empty() {
        return Err(ParseError {
            position: 0,
            line: 1,
            column: 1,
            message: "Empty expression".to_string(),
        }
        .into());
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let condition = parser.parse_or()?;

    let current = parser.current();
    if current.kind != TokenKind::Eof {
        return Err(parser
            .error(format!("Unexpected token '{}' after expression", current.text))
            .into());
    }

    Ok(condition)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn error_at(token: &Token, message: impl Into<String>) -> ParseError {
    ParseError {
        position: token.position,
        line: token.line,
        column: token.column,
        message: message.into(),
    }
}

fn describe(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        "end of expression".to_string()
    } else {
        format!("'{}'", token.text)
    }
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof and `advance`
        // never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> std::result::Result<Token, ParseError> {
        if self.current().kind != kind {
            let got = describe(self.current());
            return Err(self.error(format!("Expected {}, got {}", kind, got)));
        }
        Ok(self.advance())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        error_at(self.current(), message)
    }

    fn enter(&mut self) -> std::result::Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!(
                "Expression nesting exceeds maximum depth of {}",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> std::result::Result<Condition, ParseError> {
        let mut parts = vec![self.parse_and()?];
        while self.current().kind == TokenKind::Or {
            self.advance();
            parts.push(self.parse_and()?);
        }
        Ok(Condition::or(parts))
    }

    fn parse_and(&mut self) -> std::result::Result<Condition, ParseError> {
        let mut parts = vec![self.parse_not()?];
        while self.current().kind == TokenKind::And {
            self.advance();
            parts.push(self.parse_not()?);
        }
        Ok(Condition::and(parts))
    }

    fn parse_not(&mut self) -> std::result::Result<Condition, ParseError> {
        if self.current().kind == TokenKind::Not {
            self.enter()?;
            self.advance();
            let inner = self.parse_not()?;
            self.leave();
            return Ok(Condition::not(inner));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> std::result::Result<Condition, ParseError> {
        match self.current().kind {
            TokenKind::LParen => {
                self.enter()?;
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                self.leave();
                Ok(inner)
            }
            TokenKind::Ident => {
                let call = self.parse_call()?;
                build_condition(call)
            }
            _ => {
                let got = describe(self.current());
                Err(self.error(format!("Expected function call or '(', got {}", got)))
            }
        }
    }

    fn parse_call(&mut self) -> std::result::Result<Call, ParseError> {
        let name_token = self.advance();
        let function = Function::from_name(&name_token.text).ok_or_else(|| {
            error_at(
                &name_token,
                format!("Unknown function: '{}'", name_token.text.to_lowercase()),
            )
        })?;

        self.expect(TokenKind::LParen)?;

        let mut positional = Vec::new();
        let mut named = Vec::new();
        if self.current().kind != TokenKind::RParen {
            self.parse_arg(&mut positional, &mut named)?;
            while self.current().kind == TokenKind::Comma {
                self.advance();
                self.parse_arg(&mut positional, &mut named)?;
            }
        }
        self.expect(TokenKind::RParen)?;

        let trailing = if self.current().kind.is_operator() {
            let op = self.advance().kind;
            Some((op, self.parse_value()?))
        } else {
            None
        };

        Ok(Call {
            function,
            name_token,
            positional,
            named,
            trailing,
        })
    }

    fn parse_arg(
        &mut self,
        positional: &mut Vec<String>,
        named: &mut Vec<NamedArg>,
    ) -> std::result::Result<(), ParseError> {
        if self.current().kind != TokenKind::Ident {
            let got = describe(self.current());
            return Err(self.error(format!("Expected identifier, got {}", got)));
        }

        // An identifier followed by an operator is a named argument.
        if self.peek_kind(1).is_operator() {
            let name = self.advance().text.to_lowercase();
            let op = self.advance().kind;
            let value = self.parse_value()?;
            named.push(NamedArg { name, op, value });
        } else {
            positional.push(self.advance().text);
        }
        Ok(())
    }

    fn parse_value(&mut self) -> std::result::Result<Value, ParseError> {
        let token = self.current().clone();
        let value = match token.kind {
            TokenKind::String | TokenKind::Ident => Value::Text(token.text.clone()),
            TokenKind::Boolean => Value::Bool(token.text == "true"),
            TokenKind::Number if token.text.contains('.') => {
                let f = token
                    .text
                    .parse::<f64>()
                    .map_err(|_| error_at(&token, format!("Invalid number '{}'", token.text)))?;
                Value::Float(f)
            }
            TokenKind::Number => {
                let i = token
                    .text
                    .parse::<i64>()
                    .map_err(|_| error_at(&token, format!("Invalid number '{}'", token.text)))?;
                Value::Integer(i)
            }
            TokenKind::Size => {
                let bytes = parse_file_size(&token.text)
                    .map_err(|e| error_at(&token, format!("Invalid size '{}': {}", token.text, e)))?;
                Value::Size {
                    bytes,
                    text: token.text.clone(),
                }
            }
            TokenKind::Duration => {
                let seconds = parse_duration(&token.text).map_err(|e| {
                    error_at(&token, format!("Invalid duration '{}': {}", token.text, e))
                })?;
                Value::Duration {
                    seconds,
                    text: token.text.clone(),
                }
            }
            TokenKind::LBracket => return self.parse_list(),
            _ => {
                return Err(self.error(format!("Expected value, got {}", describe(&token))));
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_list(&mut self) -> std::result::Result<Value, ParseError> {
        self.expect(TokenKind::LBracket)?;
        let mut values = vec![self.parse_list_item()?];
        while self.current().kind == TokenKind::Comma {
            self.advance();
            values.push(self.parse_list_item()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Value::List(values))
    }

    fn parse_list_item(&mut self) -> std::result::Result<Value, ParseError> {
        if self.current().kind == TokenKind::LBracket {
            return Err(self.error("Nested lists are not supported"));
        }
        self.parse_value()
    }
}

fn comparison_op(kind: TokenKind) -> Option<ComparisonOp> {
    match kind {
        TokenKind::Eq => Some(ComparisonOp::Eq),
        TokenKind::Lt => Some(ComparisonOp::Lt),
        TokenKind::Lte => Some(ComparisonOp::Lte),
        TokenKind::Gt => Some(ComparisonOp::Gt),
        TokenKind::Gte => Some(ComparisonOp::Gte),
        _ => None,
    }
}

fn metadata_op(kind: TokenKind) -> Option<MetadataOp> {
    match kind {
        TokenKind::Eq => Some(MetadataOp::Eq),
        TokenKind::Neq => Some(MetadataOp::Neq),
        TokenKind::Lt => Some(MetadataOp::Lt),
        TokenKind::Lte => Some(MetadataOp::Lte),
        TokenKind::Gt => Some(MetadataOp::Gt),
        TokenKind::Gte => Some(MetadataOp::Gte),
        _ => None,
    }
}

fn build_condition(call: Call) -> std::result::Result<Condition, ParseError> {
    match call.function {
        Function::Exists => build_exists(call),
        Function::Count => build_count(call),
        Function::MultiLanguage => build_multi_language(call),
        Function::Plugin => build_plugin(call),
        Function::ContainerMeta => build_container_meta(call),
        Function::IsOriginal => build_classification(call).map(Condition::IsOriginal),
        Function::IsDubbed => build_classification(call).map(Condition::IsDubbed),
    }
}

fn track_type_arg(call: &Call) -> std::result::Result<TrackType, ParseError> {
    let name = call.function.name();
    let Some(first) = call.positional.first() else {
        return Err(error_at(
            &call.name_token,
            format!(
                "{}() requires a track type argument (video, audio, subtitle, attachment)",
                name
            ),
        ));
    };
    if call.positional.len() > 1 {
        return Err(error_at(
            &call.name_token,
            format!("{}() accepts a single track type argument", name),
        ));
    }
    first.parse::<TrackType>().map_err(|_| {
        error_at(
            &call.name_token,
            format!(
                "Invalid track type: '{}'. Expected one of: {}",
                first.to_lowercase(),
                TRACK_TYPE_NAMES
            ),
        )
    })
}

fn reject_trailing(call: &Call) -> std::result::Result<(), ParseError> {
    if call.trailing.is_some() {
        return Err(error_at(
            &call.name_token,
            format!(
                "{}() does not support trailing comparison operators",
                call.function.name()
            ),
        ));
    }
    Ok(())
}

fn reject_positional(call: &Call) -> std::result::Result<(), ParseError> {
    if let Some(arg) = call.positional.first() {
        return Err(error_at(
            &call.name_token,
            format!(
                "{}() takes only named arguments, got '{}'",
                call.function.name(),
                arg
            ),
        ));
    }
    Ok(())
}

fn build_exists(call: Call) -> std::result::Result<Condition, ParseError> {
    let track_type = track_type_arg(&call)?;
    reject_trailing(&call)?;
    let filters = build_track_filters(&call)?;
    Ok(Condition::exists(track_type, filters))
}

fn build_count(call: Call) -> std::result::Result<Condition, ParseError> {
    let track_type = track_type_arg(&call)?;
    let Some((op, value)) = &call.trailing else {
        return Err(error_at(
            &call.name_token,
            "count() requires a trailing comparison (e.g., count(audio) >= 2)",
        ));
    };
    let operator = comparison_op(*op).ok_or_else(|| {
        error_at(
            &call.name_token,
            format!("count() only supports ==, <, <=, >, >= operators (not {})", op),
        )
    })?;
    let Value::Integer(expected) = value else {
        return Err(error_at(
            &call.name_token,
            format!(
                "count() comparison value must be an integer, got '{}'",
                value.text()
            ),
        ));
    };
    let expected = *expected;
    let filters = build_track_filters(&call)?;
    Ok(Condition::count(track_type, filters, operator, expected))
}

fn build_multi_language(call: Call) -> std::result::Result<Condition, ParseError> {
    reject_positional(&call)?;
    reject_trailing(&call)?;

    let mut condition = MultiLanguageCondition::default();
    for arg in &call.named {
        if arg.op != TokenKind::Eq {
            return Err(error_at(
                &call.name_token,
                "multi_language() only supports == for named arguments",
            ));
        }
        match arg.name.as_str() {
            "threshold" => {
                condition.threshold = arg.value.as_f64().ok_or_else(|| {
                    error_at(
                        &call.name_token,
                        format!("Invalid threshold value: '{}'", arg.value.text()),
                    )
                })?;
            }
            "track_index" => {
                let index = match &arg.value {
                    Value::Integer(i) => u32::try_from(*i).ok(),
                    _ => None,
                };
                if index.is_none() {
                    return Err(error_at(
                        &call.name_token,
                        format!("Invalid track_index value: '{}'", arg.value.text()),
                    ));
                }
                condition.track_index = index;
            }
            "primary_language" => condition.primary_language = Some(arg.value.text()),
            other => {
                return Err(error_at(
                    &call.name_token,
                    format!("Unknown multi_language() argument: '{}'", other),
                ));
            }
        }
    }
    Ok(Condition::AudioMultiLanguage(condition))
}

fn metadata_comparison(
    call: &Call,
) -> std::result::Result<(MetadataOp, Option<MetadataValue>), ParseError> {
    let name = call.function.name();
    let Some((op, value)) = &call.trailing else {
        return Ok((MetadataOp::Exists, None));
    };
    let operator = metadata_op(*op).ok_or_else(|| {
        error_at(
            &call.name_token,
            format!("{}() does not support 'in' operator", name),
        )
    })?;
    let value = match value {
        Value::Text(s) => MetadataValue::String(s.clone()),
        Value::Integer(i) => MetadataValue::Integer(*i),
        Value::Float(f) => MetadataValue::Float(*f),
        Value::Size { bytes, text } => MetadataValue::Integer(i64::try_from(*bytes).map_err(
            |_| error_at(&call.name_token, format!("Size '{}' is too large", text)),
        )?),
        Value::Duration { seconds, .. } => MetadataValue::Float(*seconds),
        Value::Bool(b) => MetadataValue::Bool(*b),
        Value::List(_) => {
            return Err(error_at(
                &call.name_token,
                format!("{}() comparison value cannot be a list", name),
            ));
        }
    };
    Ok((operator, Some(value)))
}

fn build_plugin(call: Call) -> std::result::Result<Condition, ParseError> {
    if call.positional.len() != 2 {
        return Err(error_at(
            &call.name_token,
            "plugin() requires two positional arguments: plugin(name, field)",
        ));
    }
    let (operator, value) = metadata_comparison(&call)?;
    Ok(Condition::PluginMetadata(PluginMetadataCondition {
        plugin: call.positional[0].to_lowercase(),
        field: call.positional[1].to_lowercase(),
        operator,
        value,
    }))
}

fn build_container_meta(call: Call) -> std::result::Result<Condition, ParseError> {
    let [field] = call.positional.as_slice() else {
        return Err(error_at(
            &call.name_token,
            "container_meta() requires a field name argument",
        ));
    };
    let field = field.to_lowercase();
    let (operator, value) = metadata_comparison(&call)?;
    Ok(Condition::ContainerMetadata(ContainerMetadataCondition {
        field,
        operator,
        value,
    }))
}

fn build_classification(call: Call) -> std::result::Result<ClassificationCondition, ParseError> {
    reject_positional(&call)?;
    reject_trailing(&call)?;

    let name = call.function.name();
    let mut condition = ClassificationCondition::default();
    for arg in &call.named {
        if arg.op != TokenKind::Eq {
            return Err(error_at(
                &call.name_token,
                format!("{}() only supports == for named arguments", name),
            ));
        }
        match arg.name.as_str() {
            "lang" | "language" => condition.language = Some(arg.value.text()),
            "confidence" | "min_confidence" => {
                condition.min_confidence = arg.value.as_f64().ok_or_else(|| {
                    error_at(
                        &call.name_token,
                        format!("Invalid confidence value: '{}'", arg.value.text()),
                    )
                })?;
            }
            "value" => {
                condition.value = arg.value.as_bool().ok_or_else(|| {
                    error_at(
                        &call.name_token,
                        format!("Invalid value: '{}' (expected true or false)", arg.value.text()),
                    )
                })?;
            }
            other => {
                return Err(error_at(
                    &call.name_token,
                    format!("Unknown {}() argument: '{}'", name, other),
                ));
            }
        }
    }
    Ok(condition)
}

fn build_track_filters(call: &Call) -> std::result::Result<TrackFilters, ParseError> {
    let mut filters = TrackFilters::default();
    let at = |message: String| error_at(&call.name_token, message);

    for arg in &call.named {
        let name = arg.name.as_str();
        match name {
            "lang" | "language" | "codec" => {
                let matcher = match (arg.op, &arg.value) {
                    (TokenKind::In, Value::List(values)) => {
                        StringMatch::AnyOf(values.iter().map(Value::text).collect())
                    }
                    (TokenKind::In, value) => StringMatch::AnyOf(vec![value.text()]),
                    (TokenKind::Eq, Value::List(_)) => {
                        return Err(at(format!(
                            "Filter '{}' requires 'in' for a list of values",
                            name
                        )));
                    }
                    (TokenKind::Eq, value) => StringMatch::One(value.text()),
                    _ => {
                        return Err(at(format!(
                            "Filter '{}' only supports == and 'in' operators",
                            name
                        )));
                    }
                };
                if name == "codec" {
                    filters.codec = Some(matcher);
                } else {
                    filters.language = Some(matcher);
                }
            }
            "channels" | "width" | "height" => {
                let Value::Integer(expected) = arg.value else {
                    return Err(at(format!(
                        "Filter '{}' requires an integer value, got '{}'",
                        name,
                        arg.value.text()
                    )));
                };
                let filter = match comparison_op(arg.op) {
                    Some(ComparisonOp::Eq) => NumericFilter::Exact(expected),
                    Some(op) => NumericFilter::Compare(Comparison::new(op, expected)),
                    None => {
                        return Err(at(format!(
                            "Filter '{}' does not support operator {}",
                            name, arg.op
                        )));
                    }
                };
                match name {
                    "channels" => filters.channels = Some(filter),
                    "width" => filters.width = Some(filter),
                    _ => filters.height = Some(filter),
                }
            }
            "default" | "forced" | "not_commentary" => {
                if arg.op != TokenKind::Eq {
                    return Err(at(format!("Filter '{}' only supports == operator", name)));
                }
                let flag = arg.value.as_bool().ok_or_else(|| {
                    at(format!(
                        "Filter '{}' requires true or false, got '{}'",
                        name,
                        arg.value.text()
                    ))
                })?;
                match name {
                    "default" => filters.is_default = Some(flag),
                    "forced" => filters.is_forced = Some(flag),
                    _ => filters.not_commentary = Some(flag),
                }
            }
            "title" | "title_regex" => {
                if arg.op != TokenKind::Eq {
                    return Err(at(format!("Filter '{}' only supports == operator", name)));
                }
                let text = arg.value.text();
                filters.title = Some(if name == "title" {
                    TitleMatch::Contains(text)
                } else {
                    let pattern = TitlePattern::new(&text)
                        .map_err(|e| at(format!("Invalid title_regex pattern '{}': {}", text, e)))?;
                    TitleMatch::Regex(pattern)
                });
            }
            other => {
                return Err(at(format!(
                    "Unknown filter: '{}'. Expected one of: {}",
                    other,
                    FILTER_NAMES.join(", ")
                )));
            }
        }
    }

    Ok(filters)
}
