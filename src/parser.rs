//! 谓词文本的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   └─ parse_predicate()            以 ';' 分隔，每个子句对应一个 Where 子句
//!        ├─ 可选的参数头 `r =>`
//!        └─ parse_expression()
//!             ├─ parse_conditional()             cond ? a : b
//!             │    └─ parse_binary_expression()  按优先级攀升
//!             │         └─ parse_unary_expression()     ! -
//!             │              └─ parse_postfix_expression()  .member  .method(args)
//!             │                   └─ parse_primary_expression()
//!             │                        ├─ 参数 / 字段简写
//!             │                        ├─ 字面值、列表 `[...]`
//!             │                        ├─ nullable(x)  cast<ty>(x)  enum<Name>(x)
//!             │                        └─ "(" 分组表达式 ")"
//!             └─ `=` → 赋值（始终被编译器拒绝）
//! ```
//!
//! ## 运算符优先级（从低到高）
//!
//! 1. `?:`
//! 2. `||`
//! 3. `&&`
//! 4. `|`
//! 5. `^`
//! 6. `&`
//! 7. `==` `!=`
//! 8. `<` `>` `<=` `>=`
//! 9. `<<` `>>`
//! 10. `+` `-`
//! 11. `*` `/` `%`
//! 12. 一元 `!` `-`
//!
//! ## 解析示例
//!
//! ```text
//! r => r.Name == "a" && r.Age > 10
//! r => !["a", "b"].Contains(r.Name)
//! Age >= 18; Name.StartsWith("J", true)
//! r => r.Created < @"2024-01-01T00:00:00Z"
//! ```
//!
//! 没有参数头时，`r` 表示记录参数，其他裸标识符是该记录的字段。

use crate::lexer::Lexer;
use crate::literal::{Literal, ValueType};
use crate::raw::{ArithOp, CompareOp, Conversion, LogicalOp, RawNode, StatementKind};
use crate::token::{Span, Token, TokenKind};
use chrono::{DateTime, Utc};
use std::fmt;

/// 未声明参数头时记录参数的名字
const DEFAULT_PARAMETER: &str = "r";

/// 嵌套层数上限：括号、一元运算、运算符链和成员链都各计一层
const MAX_NESTING_DEPTH: usize = 256;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 当前子句声明的参数名；`None` 表示使用字段简写
    parameter: Option<&'a str>,
    /// 当前嵌套层数
    depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} (at {}..{})", self.message, span.start, span.end),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// 二元运算符
#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Logical(LogicalOp),
    Compare(CompareOp),
    Arith(ArithOp),
}

impl BinaryOp {
    fn from_token(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::OrOr => BinaryOp::Logical(LogicalOp::Or),
            TokenKind::AndAnd => BinaryOp::Logical(LogicalOp::And),
            TokenKind::Pipe => BinaryOp::Arith(ArithOp::BitOr),
            TokenKind::Caret => BinaryOp::Arith(ArithOp::BitXor),
            TokenKind::Amp => BinaryOp::Arith(ArithOp::BitAnd),
            TokenKind::Eq => BinaryOp::Compare(CompareOp::Eq),
            TokenKind::NotEq => BinaryOp::Compare(CompareOp::Ne),
            TokenKind::Gt => BinaryOp::Compare(CompareOp::Gt),
            TokenKind::Gte => BinaryOp::Compare(CompareOp::Gte),
            TokenKind::Lt => BinaryOp::Compare(CompareOp::Lt),
            TokenKind::Lte => BinaryOp::Compare(CompareOp::Lte),
            TokenKind::Shl => BinaryOp::Arith(ArithOp::Shl),
            TokenKind::Shr => BinaryOp::Arith(ArithOp::Shr),
            TokenKind::Plus => BinaryOp::Arith(ArithOp::Add),
            TokenKind::Minus => BinaryOp::Arith(ArithOp::Sub),
            TokenKind::Star => BinaryOp::Arith(ArithOp::Mul),
            TokenKind::Slash => BinaryOp::Arith(ArithOp::Div),
            TokenKind::Percent => BinaryOp::Arith(ArithOp::Rem),
            _ => return None,
        })
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Logical(LogicalOp::Or) => 2,
            BinaryOp::Logical(LogicalOp::And) => 3,
            BinaryOp::Compare(CompareOp::Eq | CompareOp::Ne) => 7,
            BinaryOp::Compare(_) => 8,
            BinaryOp::Arith(op) => op.precedence(),
        }
    }

    fn build(self, left: RawNode, right: RawNode) -> RawNode {
        let (left, right) = (Box::new(left), Box::new(right));
        match self {
            BinaryOp::Logical(op) => RawNode::Logical { op, left, right },
            BinaryOp::Compare(op) => RawNode::Compare { op, left, right },
            BinaryOp::Arith(op) => RawNode::Arithmetic { op, left, right },
        }
    }
}

/// 解析以 `;` 分隔的多个谓词
pub fn parse_predicates(input: &str) -> Result<Vec<RawNode>, ParseError> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    Parser::new(&tokens).parse()
}

/// 解析单个谓词
pub fn parse_predicate(input: &str) -> Result<RawNode, ParseError> {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens);
    let predicate = parser.parse_predicate()?;
    match parser.peek() {
        Some(token) => Err(ParseError::at_position(
            format!("Unexpected token after predicate: {:?}", token.kind),
            token.span,
        )),
        None => Ok(predicate),
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            parameter: None,
            depth: 0,
        }
    }

    /// 进入一层嵌套，超过上限时报错
    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                format!("Expression nested deeper than {MAX_NESTING_DEPTH} levels"),
                self.peek().map(|token| token.span),
            ));
        }
        Ok(())
    }

    /// 在新的一层嵌套中调用 `parse`
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<RawNode, ParseError>,
    ) -> Result<RawNode, ParseError> {
        let outer = self.depth;
        self.enter()?;
        let node = parse(self);
        self.depth = outer;
        node
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回之后第 n 个 token，不推进位置
    fn peek_nth(&self, n: usize) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position + n)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) =>
            {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    /// 匹配时消费当前 token
    fn eat(&mut self, kind: &TokenKind) -> bool {
        let matched = self.match_token(kind);
        if matched {
            self.position += 1;
        }
        matched
    }

    /// 解析全部输入：`predicate (';' predicate)* ';'?`
    pub fn parse(&mut self) -> Result<Vec<RawNode>, ParseError> {
        let mut predicates = Vec::new();

        while self.peek().is_some() {
            predicates.push(self.parse_predicate()?);

            // 检查是否需要继续
            if let Some(token) = self.peek() {
                match &token.kind {
                    TokenKind::Semicolon => {
                        self.advance(); // 消费分号
                    }
                    _ => {
                        return Err(ParseError::at_position(
                            format!("Expected semicolon, found {:?}", token.kind),
                            token.span,
                        ));
                    }
                }
            }
        }

        Ok(predicates)
    }

    /// 解析一个子句，包括可选的参数头
    pub fn parse_predicate(&mut self) -> Result<RawNode, ParseError> {
        self.parameter = None;
        self.depth = 0;
        if let (Some(name), Some(arrow)) = (self.peek(), self.peek_nth(1)) {
            if let (TokenKind::Identifier(name), TokenKind::Arrow) = (&name.kind, &arrow.kind) {
                self.parameter = Some(name);
                self.position += 2;
            }
        }
        self.parse_expression()
    }

    /// 表达式入口：条件表达式，后面可以跟一个赋值
    fn parse_expression(&mut self) -> Result<RawNode, ParseError> {
        let target = self.parse_conditional()?;
        if self.eat(&TokenKind::Assign) {
            // 赋值不是表达式，保留为语句节点，由编译器报告
            self.parse_conditional()?;
            return Ok(RawNode::Other(StatementKind::Assignment));
        }
        Ok(target)
    }

    /// 语法: `binary ('?' conditional ':' conditional)?`
    fn parse_conditional(&mut self) -> Result<RawNode, ParseError> {
        let condition = self.parse_binary_expression(2)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then = self.nested(Self::parse_conditional)?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.nested(Self::parse_conditional)?;
        Ok(RawNode::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// 优先级攀升：只接受优先级不低于 `min_precedence` 的运算符，全部左结合
    fn parse_binary_expression(&mut self, min_precedence: u8) -> Result<RawNode, ParseError> {
        let outer = self.depth;
        let mut left = self.parse_unary_expression()?;

        while let Some(op) = self.peek().and_then(|t| BinaryOp::from_token(&t.kind)) {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance(); // 消费运算符
            // 左结合的运算符链每多一个运算符，树就深一层
            self.enter()?;
            let right = self.parse_binary_expression(precedence + 1)?;
            left = op.build(left, right);
        }

        self.depth = outer;
        Ok(left)
    }

    /// 语法: `('!' | '-')* postfix`
    /// 紧跟数字的 `-` 直接折叠成负数字面值
    fn parse_unary_expression(&mut self) -> Result<RawNode, ParseError> {
        if self.eat(&TokenKind::Bang) {
            let operand = self.nested(Self::parse_unary_expression)?;
            return Ok(RawNode::Not(Box::new(operand)));
        }
        if self.eat(&TokenKind::Minus) {
            if let Some(Token {
                kind: TokenKind::Number(text),
                span,
            }) = self.peek()
            {
                self.advance();
                let literal = parse_number(&format!("-{text}"), *span)?;
                return self.parse_postfix_expression(RawNode::Constant(literal));
            }
            let operand = self.nested(Self::parse_unary_expression)?;
            return Ok(RawNode::Negate(Box::new(operand)));
        }
        let primary = self.parse_primary_expression()?;
        self.parse_postfix_expression(primary)
    }

    /// 语法: `primary ('.' name ('(' args ')')?)*`
    fn parse_postfix_expression(&mut self, mut node: RawNode) -> Result<RawNode, ParseError> {
        let outer = self.depth;
        while self.eat(&TokenKind::Dot) {
            self.enter()?;
            let token = self
                .advance()
                .ok_or_else(|| ParseError::new("Expected member name after '.'".to_string(), None))?;
            let name = token.kind.as_word().ok_or_else(|| {
                ParseError::at_position(
                    format!("Expected member name, found {:?}", token.kind),
                    token.span,
                )
            })?;

            node = if self.eat(&TokenKind::LParen) {
                let args = self.parse_list(TokenKind::RParen)?;
                RawNode::MethodCall {
                    target: Box::new(node),
                    name: name.to_string(),
                    args,
                }
            } else {
                RawNode::Member {
                    target: Box::new(node),
                    name: name.to_string(),
                }
            };
        }
        self.depth = outer;
        Ok(node)
    }

    /// 解析逗号分隔的表达式列表，直到 `close`（开括号已消费）
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<RawNode>, ParseError> {
        let mut items = Vec::new();
        if !self.match_token(&close) {
            loop {
                items.push(self.nested(Self::parse_expression)?);
                if self.match_token(&close) {
                    break;
                }
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    /// 解析基础表达式 (最高优先级)
    fn parse_primary_expression(&mut self) -> Result<RawNode, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Unexpected end of input".to_string(), None));
        };

        match &token.kind {
            TokenKind::Identifier(name) => Ok(self.identifier(name)),
            TokenKind::Null => Ok(RawNode::Constant(Literal::null())),
            TokenKind::True => Ok(RawNode::Constant(Literal::Bool(true))),
            TokenKind::False => Ok(RawNode::Constant(Literal::Bool(false))),
            TokenKind::Number(text) => Ok(RawNode::Constant(parse_number(text, token.span)?)),
            TokenKind::String(s) => Ok(RawNode::Constant(Literal::String(s.to_string()))),
            TokenKind::DateTime(s) => {
                let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| {
                    ParseError::at_position(format!("Invalid datetime '{s}': {e}"), token.span)
                })?;
                Ok(RawNode::Constant(Literal::DateTime(parsed.with_timezone(&Utc))))
            }
            TokenKind::LParen => {
                let expr = self.nested(Self::parse_expression)?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => Ok(RawNode::Collection(self.parse_list(TokenKind::RBracket)?)),
            TokenKind::Nullable => {
                let operand = self.parse_call_argument()?;
                Ok(convert(operand, Conversion::Nullable))
            }
            TokenKind::Cast => {
                let type_token = self.parse_type_argument()?;
                let name = type_token.kind.as_word().unwrap_or_default();
                let ty = ValueType::from_name(name).ok_or_else(|| {
                    ParseError::at_position(format!("Unknown type '{name}'"), type_token.span)
                })?;
                let operand = self.parse_call_argument()?;
                Ok(convert(operand, Conversion::Cast(ty)))
            }
            TokenKind::Enum => {
                let type_token = self.parse_type_argument()?;
                let name = type_token.kind.as_word().unwrap_or_default().to_string();
                let operand = self.parse_call_argument()?;
                Ok(convert(operand, Conversion::Enum(name)))
            }
            TokenKind::UnterminatedString => Err(ParseError::at_position(
                "Unterminated string literal".to_string(),
                token.span,
            )),
            _ => Err(ParseError::at_position(
                format!("Expected expression, found {:?}", token.kind),
                token.span,
            )),
        }
    }

    /// 参数本身，或没有参数头时的字段简写
    fn identifier(&self, name: &str) -> RawNode {
        match self.parameter {
            Some(parameter) if parameter == name => RawNode::Parameter,
            None if name == DEFAULT_PARAMETER => RawNode::Parameter,
            _ => RawNode::Member {
                target: Box::new(RawNode::Parameter),
                name: name.to_string(),
            },
        }
    }

    /// 语法: `'<' name '>'`
    fn parse_type_argument(&mut self) -> Result<&'a Token<'a>, ParseError> {
        self.expect(TokenKind::Lt)?;
        let token = self
            .advance()
            .ok_or_else(|| ParseError::new("Expected type name".to_string(), None))?;
        if token.kind.as_word().is_none() {
            return Err(ParseError::at_position(
                format!("Expected type name, found {:?}", token.kind),
                token.span,
            ));
        }
        self.expect(TokenKind::Gt)?;
        Ok(token)
    }

    /// 语法: `'(' expression ')'`
    fn parse_call_argument(&mut self) -> Result<RawNode, ParseError> {
        self.expect(TokenKind::LParen)?;
        let operand = self.nested(Self::parse_expression)?;
        self.expect(TokenKind::RParen)?;
        Ok(operand)
    }
}

fn convert(operand: RawNode, to: Conversion) -> RawNode {
    RawNode::Convert {
        operand: Box::new(operand),
        to,
    }
}

/// 含 `.`、`e` 或 `E` 的数字是浮点数，其余是 64 位整数
fn parse_number(text: &str, span: Span) -> Result<Literal, ParseError> {
    if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|e| ParseError::at_position(format!("Invalid number '{text}': {e}"), span))
    } else {
        text.parse::<i64>().map(Literal::Integer).map_err(|_| {
            ParseError::at_position(format!("Integer literal '{text}' out of range"), span)
        })
    }
}
