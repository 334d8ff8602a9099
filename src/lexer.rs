//! 谓词文本的词法分析器

use crate::token::{Span, Token, TokenKind};
use std::borrow::Cow;

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 当前字符等于 `expected` 时消费它
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
    }

    /// 读取数字字面量：整数、小数以及可选的指数部分
    /// 只保留源文本，由语法分析器决定是整数还是浮点数
    fn read_number(&mut self, start: usize) -> Token<'a> {
        self.eat_digits();

        // 小数点后必须紧跟数字，否则 `.` 属于成员访问（如 `5.Length`）
        if self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            self.eat_digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_follows = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.input[self.position..]
                    .chars()
                    .nth(2)
                    .is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exponent_follows {
                self.bump(); // 消费 'e'
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.eat_digits();
            }
        }

        let text = &self.input[start..self.position];
        self.token(TokenKind::Number(text), start)
    }

    /// 读取双引号包围的字符串内容并处理转义
    /// 注意：开始的引号已经被调用者消费
    fn read_string_content(&mut self) -> Result<Cow<'a, str>, TokenKind<'a>> {
        let content_start = self.position;
        let mut unescaped: Option<String> = None;

        loop {
            let Some(c) = self.bump() else {
                return Err(TokenKind::UnterminatedString);
            };
            match c {
                '"' => break,
                '\\' => {
                    // 第一次遇到转义时，复制之前的内容
                    let buffer = unescaped.get_or_insert_with(|| {
                        self.input[content_start..self.position - 1].to_string()
                    });
                    let escaped = match self.bump() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('u') => self.read_unicode_escape().ok_or(TokenKind::Illegal)?,
                        Some(_) => return Err(TokenKind::Illegal),
                        None => return Err(TokenKind::UnterminatedString),
                    };
                    buffer.push(escaped);
                }
                c => {
                    if let Some(buffer) = unescaped.as_mut() {
                        buffer.push(c);
                    }
                }
            }
        }

        Ok(match unescaped {
            Some(buffer) => Cow::Owned(buffer),
            // 不含结束引号
            None => Cow::Borrowed(&self.input[content_start..self.position - 1]),
        })
    }

    /// 读取 `\u{XXXX}` 中 `u` 之后的部分
    fn read_unicode_escape(&mut self) -> Option<char> {
        if !self.eat('{') {
            return None;
        }
        let hex_start = self.position;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.bump();
        }
        let hex = &self.input[hex_start..self.position];
        if !self.eat('}') {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    }

    fn read_string(&mut self, start: usize) -> Token<'a> {
        match self.read_string_content() {
            Ok(content) => self.token(TokenKind::String(content), start),
            Err(kind) => self.token(kind, start),
        }
    }

    /// 读取 `@"..."` 形式的日期时间字面量；`@` 已被消费
    fn read_datetime(&mut self, start: usize) -> Token<'a> {
        if !self.eat('"') {
            return self.token(TokenKind::Illegal, start);
        }
        match self.read_string_content() {
            Ok(content) => self.token(TokenKind::DateTime(content), start),
            Err(kind) => self.token(kind, start),
        }
    }

    /// 读取标识符或关键字
    /// 标识符可以包含字母、数字和下划线
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }
}

/// 关键字区分大小写，`r.Null` 仍然是普通标识符
fn match_keyword(s: &str) -> TokenKind<'_> {
    match s {
        "null" => TokenKind::Null,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nullable" => TokenKind::Nullable,
        "cast" => TokenKind::Cast,
        "enum" => TokenKind::Enum,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '^' => TokenKind::Caret,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => {
                if self.eat('=') {
                    TokenKind::Eq
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Lte
                } else if self.eat('<') {
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Gte
                } else if self.eat('>') {
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::OrOr
                } else {
                    TokenKind::Pipe
                }
            }
            '"' => return Some(self.read_string(start)),
            '@' => return Some(self.read_datetime(start)),
            c if c.is_ascii_digit() => return Some(self.read_number(start)),
            c if c.is_alphabetic() || c == '_' => return Some(self.read_identifier(start)),
            _ => TokenKind::Illegal,
        };
        Some(self.token(kind, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_predicate() {
        let input = r#"r => r.Name == "a""#;
        let mut lexer = Lexer::new(input);

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("r"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Arrow);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("r"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Dot);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Identifier("Name"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Eq);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::String(Cow::Borrowed("a")));
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "== != > < >= <= && || ! & | ^ << >> + - * / % = => ( ) [ ] , . ; ? :";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Eq, TokenKind::NotEq, TokenKind::Gt, TokenKind::Lt,
                TokenKind::Gte, TokenKind::Lte, TokenKind::AndAnd, TokenKind::OrOr,
                TokenKind::Bang, TokenKind::Amp, TokenKind::Pipe, TokenKind::Caret,
                TokenKind::Shl, TokenKind::Shr, TokenKind::Plus, TokenKind::Minus,
                TokenKind::Star, TokenKind::Slash, TokenKind::Percent, TokenKind::Assign,
                TokenKind::Arrow, TokenKind::LParen, TokenKind::RParen, TokenKind::LBracket,
                TokenKind::RBracket, TokenKind::Comma, TokenKind::Dot, TokenKind::Semicolon,
                TokenKind::Question, TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let input = "null true false nullable cast enum Null my_field";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Null, TokenKind::True, TokenKind::False, TokenKind::Nullable,
                TokenKind::Cast, TokenKind::Enum, TokenKind::Identifier("Null"),
                TokenKind::Identifier("my_field"),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("12345 1.5 2e10 3.0E-2"),
            vec![
                TokenKind::Number("12345"),
                TokenKind::Number("1.5"),
                TokenKind::Number("2e10"),
                TokenKind::Number("3.0E-2"),
            ]
        );
        // 小数点后不是数字时属于成员访问
        assert_eq!(
            kinds("5.Length"),
            vec![TokenKind::Number("5"), TokenKind::Dot, TokenKind::Identifier("Length")]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#""hello world" "a\"b\\c\n" "\u{e9}""#),
            vec![
                TokenKind::String(Cow::Borrowed("hello world")),
                TokenKind::String(Cow::Owned("a\"b\\c\n".to_string())),
                TokenKind::String(Cow::Owned("é".to_string())),
            ]
        );
        assert_eq!(kinds(r#""open"#), vec![TokenKind::UnterminatedString]);
        assert_eq!(kinds(r#""bad\q""#)[0], TokenKind::Illegal);
    }

    #[test]
    fn test_datetime_literal() {
        let mut lexer = Lexer::new(r#"@"2024-01-02T03:04:05Z" @x"#);
        let token = lexer.next().unwrap();
        assert_eq!(token.kind, TokenKind::DateTime(Cow::Borrowed("2024-01-02T03:04:05Z")));
        assert_eq!(token.span, Span::new(0, 23));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Illegal);
    }

    #[test]
    fn test_spans() {
        let tokens: Vec<_> = Lexer::new("r.Age >= 10").collect();
        let spans: Vec<_> = tokens.iter().map(|t| (t.span.start, t.span.end)).collect();
        assert_eq!(spans, vec![(0, 1), (1, 2), (2, 5), (6, 8), (9, 11)]);
    }
}
