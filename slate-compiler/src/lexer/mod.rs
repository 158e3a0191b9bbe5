use std::fmt;

use tracing::debug;

use crate::diagnostics::ErrorSink;
use crate::source::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    /// One-based line number.
    pub line: usize,
    /// Zero-based column of the first character.
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            literal: None,
            line,
            column,
        }
    }

    fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// The lexeme as it should appear in a message; layout tokens have no text.
    pub fn display_lexeme(&self) -> String {
        match self.kind {
            TokenKind::Newline => "newline".to_string(),
            TokenKind::SoftNewline => "line break".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            _ => self.lexeme.clone(),
        }
    }
}

/// Value carried by literal tokens. Numbers keep their exact source text so that
/// no precision is lost before the runtime builds its arbitrary-precision value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Number(String),
    Text(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
    Question,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Arrow,
    Identifier,
    Number,
    Text,
    True,
    False,
    Null,
    Fn,
    /// Only ever produced by the parser's prelude step.
    Keyword(Keyword),
    Newline,
    SoftNewline,
    Indent,
    Dedent,
    Eof,
}

/// Words that act as keywords when they lead a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Var,
    Mut,
    Let,
    Call,
    If,
    Elif,
    Else,
    While,
    Break,
    Return,
}

impl Keyword {
    pub const ALL: [Keyword; 10] = [
        Keyword::Var,
        Keyword::Mut,
        Keyword::Let,
        Keyword::Call,
        Keyword::If,
        Keyword::Elif,
        Keyword::Else,
        Keyword::While,
        Keyword::Break,
        Keyword::Return,
    ];

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|keyword| keyword.as_str() == word)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Var => "var",
            Keyword::Mut => "mut",
            Keyword::Let => "let",
            Keyword::Call => "call",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Break => "break",
            Keyword::Return => "return",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan `source` into tokens, reporting lexical problems to `sink`.
pub fn scan(source: &str, sink: &mut dyn ErrorSink) -> Vec<Token> {
    Scanner::for_text(source).scan_tokens(sink)
}

/// Characters that may join two words of one identifier.
pub fn is_word_joiner(ch: char) -> bool {
    ch == ' ' || ch == '\u{a0}'
}

fn reserved_word(word: &str) -> Option<TokenKind> {
    match word {
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "null" => Some(TokenKind::Null),
        "fn" => Some(TokenKind::Fn),
        _ => None,
    }
}

pub struct Scanner<'a> {
    input: &'a str,
    position: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    brackets: Vec<(char, usize, usize)>,
    indents: Vec<usize>,
    indent_char: Option<char>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self::for_text(&source.contents)
    }

    pub fn for_text(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            brackets: Vec::new(),
            indents: vec![0],
            indent_char: None,
        }
    }

    /// Scan the whole input. Problems are reported to `sink` and scanning carries
    /// on, so one pass surfaces every lexical error; callers must check
    /// `sink.had_error()` before handing the tokens to the parser.
    pub fn scan_tokens(mut self, sink: &mut dyn ErrorSink) -> Vec<Token> {
        self.measure_indentation(sink);

        while let Some(ch) = self.peek_char() {
            match ch {
                ' ' | '\t' | '\r' | '\u{a0}' => {
                    self.advance_char();
                }
                '\n' => self.line_break(sink),
                '#' => self.skip_comment(),
                '\'' => self.lex_string(sink),
                '0'..='9' => self.lex_number(sink),
                '(' | '[' | '{' => self.open_bracket(ch),
                ')' | ']' | '}' => self.close_bracket(ch, sink),
                ',' => self.simple_token(TokenKind::Comma),
                '.' => self.simple_token(TokenKind::Dot),
                ':' => self.simple_token(TokenKind::Colon),
                '?' => self.simple_token(TokenKind::Question),
                '!' => self.simple_token(TokenKind::Bang),
                '+' => self.simple_token(TokenKind::Plus),
                '*' => self.simple_token(TokenKind::Star),
                '/' => self.simple_token(TokenKind::Slash),
                '%' => self.simple_token(TokenKind::Percent),
                '=' => self.simple_token(TokenKind::Equal),
                '≠' => self.simple_token(TokenKind::NotEqual),
                '≤' => self.simple_token(TokenKind::LessEqual),
                '≥' => self.simple_token(TokenKind::GreaterEqual),
                '∧' => self.simple_token(TokenKind::And),
                '∨' => self.simple_token(TokenKind::Or),
                '→' => self.simple_token(TokenKind::Arrow),
                '-' => self.lex_two_char('>', TokenKind::Arrow, TokenKind::Minus),
                '<' => self.lex_two_char('=', TokenKind::LessEqual, TokenKind::Less),
                '>' => self.lex_two_char('=', TokenKind::GreaterEqual, TokenKind::Greater),
                other if other.is_alphabetic() => self.lex_identifier(),
                other => {
                    self.error_here(sink, &format!("unexpected character '{other}'"));
                    self.advance_char();
                }
            }
        }

        self.finish(sink);
        debug!(tokens = self.tokens.len(), lines = self.line, "scanned source");
        self.tokens
    }

    fn finish(&mut self, sink: &mut dyn ErrorSink) {
        for (bracket, line, column) in std::mem::take(&mut self.brackets).into_iter().rev() {
            let line_text = self.text_of_line(line).to_string();
            sink.lexical_error(
                &line_text,
                line,
                column,
                &format!("unclosed '{bracket}'"),
            );
        }

        if self
            .tokens
            .last()
            .is_some_and(|token| !matches!(token.kind, TokenKind::Newline | TokenKind::Dedent))
        {
            self.push(TokenKind::Newline, "\n", self.line, self.column);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line, 0);
        }
        self.push(TokenKind::Eof, "", self.line, self.column);
    }

    fn line_break(&mut self, sink: &mut dyn ErrorSink) {
        let line = self.line;
        let column = self.column;
        self.advance_char();

        if !self.brackets.is_empty() {
            if self
                .tokens
                .last()
                .is_some_and(|token| token.kind != TokenKind::SoftNewline)
            {
                self.push(TokenKind::SoftNewline, "\n", line, column);
            }
            return;
        }

        if self
            .tokens
            .last()
            .is_some_and(|token| token.kind != TokenKind::Newline)
        {
            self.push(TokenKind::Newline, "\n", line, column);
        }
        self.measure_indentation(sink);
    }

    /// Measure the indentation run at the start of a line and emit INDENT/DEDENT
    /// tokens. Blank and comment-only lines are skipped entirely.
    fn measure_indentation(&mut self, sink: &mut dyn ErrorSink) {
        loop {
            let mut width = 0usize;
            let mut saw_space = false;
            let mut saw_tab = false;
            while let Some(ch) = self.peek_char() {
                match ch {
                    ' ' => saw_space = true,
                    '\t' => saw_tab = true,
                    _ => break,
                }
                width += 1;
                self.advance_char();
            }

            match self.peek_char() {
                None => return,
                Some('\n') => {
                    self.advance_char();
                    continue;
                }
                Some('\r') if self.peek_next_char() == Some('\n') => {
                    self.advance_char();
                    self.advance_char();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    if self.peek_char() == Some('\n') {
                        self.advance_char();
                    }
                    continue;
                }
                Some(_) => {}
            }

            let run_char = match (saw_space, saw_tab) {
                (true, false) => Some(' '),
                (false, true) => Some('\t'),
                _ => None,
            };
            let mixed = match run_char {
                Some(ch) => *self.indent_char.get_or_insert(ch) != ch,
                None => saw_space && saw_tab,
            };
            if mixed {
                self.error_at(sink, self.line, 0, "indentation mixes spaces and tabs");
            }
            self.apply_indentation(width, !mixed, sink);
            return;
        }
    }

    /// A mixed run has no meaningful width, so it settles on the nearest
    /// outer level without a second report.
    fn apply_indentation(&mut self, width: usize, check_level: bool, sink: &mut dyn ErrorSink) {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, "", self.line, width);
            return;
        }

        while self.indents.last().is_some_and(|level| *level > width) {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line, width);
        }

        if check_level && self.indents.last().is_some_and(|level| *level != width) {
            self.error_at(
                sink,
                self.line,
                width,
                "dedent does not match any outer indentation level",
            );
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn lex_string(&mut self, sink: &mut dyn ErrorSink) {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;
        self.advance_char(); // consume opening quote

        let mut value = String::new();
        loop {
            match self.peek_char() {
                Some('\'') => {
                    self.advance_char();
                    let lexeme = self.slice(start, self.position).to_string();
                    let token = Token::new(TokenKind::Text, lexeme, start_line, start_column)
                        .with_literal(Literal::Text(value));
                    self.tokens.push(token);
                    return;
                }
                Some('\\') => {
                    let escape_column = self.column;
                    self.advance_char();
                    match self.peek_char() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('\n') | None => continue,
                        Some(other) => {
                            self.error_at(
                                sink,
                                self.line,
                                escape_column,
                                &format!("invalid escape sequence '\\{other}'"),
                            );
                        }
                    }
                    self.advance_char();
                }
                Some('\n') | None => {
                    self.error_at(sink, start_line, start_column, "unterminated string");
                    return;
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance_char();
                }
            }
        }
    }

    fn lex_number(&mut self, sink: &mut dyn ErrorSink) {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        self.consume_digits();

        if self.peek_char() == Some('.') {
            if self.peek_next_char().is_some_and(|ch| ch.is_ascii_digit()) {
                self.advance_char(); // consume '.'
                self.consume_digits();
            } else {
                self.error_here(sink, "expected a digit after the decimal point");
                self.advance_char();
            }
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mut lookahead = self.input[self.position..].chars().skip(1);
            let exponent_follows = match lookahead.next() {
                Some(ch) if ch.is_ascii_digit() => true,
                Some('+' | '-') => lookahead.next().is_some_and(|ch| ch.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                self.advance_char(); // consume 'e'
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.advance_char();
                }
                self.consume_digits();
            }
        }

        let lexeme = self.slice(start, self.position).trim_end_matches('.').to_string();
        let token = Token::new(TokenKind::Number, lexeme.clone(), start_line, start_column)
            .with_literal(Literal::Number(lexeme));
        self.tokens.push(token);
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance_char();
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        self.consume_word();
        let first_word = self.slice(start, self.position);
        if let Some(kind) = reserved_word(first_word) {
            let lexeme = first_word.to_string();
            let literal = match kind {
                TokenKind::True => Some(Literal::Boolean(true)),
                TokenKind::False => Some(Literal::Boolean(false)),
                TokenKind::Null => Some(Literal::Null),
                _ => None,
            };
            let mut token = Token::new(kind, lexeme, start_line, start_column);
            token.literal = literal;
            self.tokens.push(token);
            return;
        }

        while self.joiner_continues_identifier() {
            self.advance_char(); // consume the joiner
            self.consume_word();
        }

        if self.peek_char() == Some('?') {
            self.advance_char();
        }

        // Both joiners spell the same name.
        let lexeme = self.slice(start, self.position).replace('\u{a0}', " ");
        self.tokens.push(Token::new(
            TokenKind::Identifier,
            lexeme,
            start_line,
            start_column,
        ));
    }

    fn consume_word(&mut self) {
        while self.peek_char().is_some_and(char::is_alphanumeric) {
            self.advance_char();
        }
    }

    /// A joiner continues the identifier only when a letter follows it and the
    /// word it introduces is not lexically reserved.
    fn joiner_continues_identifier(&self) -> bool {
        let mut rest = self.input[self.position..].chars();
        if !rest.next().is_some_and(is_word_joiner) {
            return false;
        }
        let word: String = rest.take_while(|ch| ch.is_alphanumeric()).collect();
        word.chars().next().is_some_and(char::is_alphabetic) && reserved_word(&word).is_none()
    }

    fn open_bracket(&mut self, ch: char) {
        self.brackets.push((ch, self.line, self.column));
        let kind = match ch {
            '(' => TokenKind::LeftParen,
            '[' => TokenKind::LeftBracket,
            _ => TokenKind::LeftBrace,
        };
        self.simple_token(kind);
    }

    fn close_bracket(&mut self, ch: char, sink: &mut dyn ErrorSink) {
        let expected_open = match ch {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.last() {
            Some((open, _, _)) if *open == expected_open => {
                self.brackets.pop();
            }
            _ => self.error_here(sink, &format!("unmatched '{ch}'")),
        }
        let kind = match ch {
            ')' => TokenKind::RightParen,
            ']' => TokenKind::RightBracket,
            _ => TokenKind::RightBrace,
        };
        self.simple_token(kind);
    }

    fn lex_two_char(&mut self, second: char, paired: TokenKind, single: TokenKind) {
        let start = self.position;
        let start_column = self.column;
        self.advance_char();
        let kind = if self.peek_char() == Some(second) {
            self.advance_char();
            paired
        } else {
            single
        };
        let lexeme = self.slice(start, self.position).to_string();
        self.push(kind, lexeme, self.line, start_column);
    }

    fn simple_token(&mut self, kind: TokenKind) {
        let start = self.position;
        let start_column = self.column;
        self.advance_char();
        let lexeme = self.slice(start, self.position).to_string();
        self.push(kind, lexeme, self.line, start_column);
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, lexeme, line, column));
    }

    fn error_here(&self, sink: &mut dyn ErrorSink, message: &str) {
        self.error_at(sink, self.line, self.column, message);
    }

    fn error_at(&self, sink: &mut dyn ErrorSink, line: usize, column: usize, message: &str) {
        sink.lexical_error(self.text_of_line(line), line, column, message);
    }

    fn text_of_line(&self, line: usize) -> &str {
        self.input
            .split('\n')
            .nth(line.saturating_sub(1))
            .map(|text| text.trim_end_matches('\r'))
            .unwrap_or("")
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.input[self.position..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.input[start..end]
    }
}
