use rulehunter_core::Value;

use super::error::ExprErrorKind;
use super::functions::Func;
use super::lexer::{Op, Token};

/// Compiled expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Lit(Value),
    Var(String),
    Unary(Op, Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    /// Variable names in order of first appearance.
    pub(crate) fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Node::Lit(_) => {}
            Node::Var(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Node::Unary(_, inner) => inner.collect_vars(out),
            Node::Binary(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Node::Call(_, args) => args.iter().for_each(|a| a.collect_vars(out)),
        }
    }
}

const PREFIX_BP: u8 = 11;

fn infix_bp(op: Op) -> Option<(u8, u8)> {
    let bp = match op {
        Op::Or => (1, 2),
        Op::And => (3, 4),
        Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => (5, 6),
        Op::Add | Op::Sub => (7, 8),
        Op::Mul | Op::Div | Op::Mod => (9, 10),
        Op::Not => return None,
    };
    Some(bp)
}

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Node, ExprErrorKind> {
    if tokens.is_empty() {
        return Err(ExprErrorKind::Syntax("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.expr(0)?;
    match parser.peek() {
        None => Ok(node),
        Some(t) => Err(unexpected(t)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: Token) -> Result<(), ExprErrorKind> {
        match self.bump() {
            Some(t) if t == want => Ok(()),
            Some(t) => Err(unexpected(&t)),
            None => Err(ExprErrorKind::Syntax("unexpected end of expression".to_string())),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<Node, ExprErrorKind> {
        let mut lhs = self.prefix()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) => *op,
                _ => break,
            };
            let Some((l_bp, r_bp)) = infix_bp(op) else {
                return Err(unexpected(&Token::Op(op)));
            };
            if l_bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.expr(r_bp)?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Node, ExprErrorKind> {
        let token = self
            .bump()
            .ok_or_else(|| ExprErrorKind::Syntax("unexpected end of expression".to_string()))?;
        match token {
            Token::Number(text) => match Value::parse(&text) {
                v @ (Value::Int(_) | Value::Float(_)) => Ok(Node::Lit(v)),
                _ => Err(ExprErrorKind::Syntax(format!("invalid number: {}", text))),
            },
            Token::Str(s) => Ok(Node::Lit(Value::Str(s))),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.bump();
                    let args = self.args()?;
                    let func = Func::lookup(&name)
                        .ok_or(ExprErrorKind::FunctionNotExist(name))?;
                    if !func.accepts(args.len()) {
                        return Err(ExprErrorKind::WrongNumArgs {
                            function: func.name().to_string(),
                            got: args.len(),
                        });
                    }
                    Ok(Node::Call(func, args))
                } else {
                    match name.as_str() {
                        "true" => Ok(Node::Lit(Value::Bool(true))),
                        "false" => Ok(Node::Lit(Value::Bool(false))),
                        _ => Ok(Node::Var(name)),
                    }
                }
            }
            Token::LParen => {
                let inner = self.expr(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Op(op @ (Op::Not | Op::Sub)) => {
                let operand = self.expr(PREFIX_BP)?;
                Ok(Node::Unary(op, Box::new(operand)))
            }
            t => Err(unexpected(&t)),
        }
    }

    fn args(&mut self) -> Result<Vec<Node>, ExprErrorKind> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expr(0)?);
            match self.bump() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(t) => return Err(unexpected(&t)),
                None => {
                    return Err(ExprErrorKind::Syntax(
                        "unexpected end of expression".to_string(),
                    ))
                }
            }
        }
    }
}

fn unexpected(token: &Token) -> ExprErrorKind {
    let text = match token {
        Token::Number(n) => n.clone(),
        Token::Str(s) => format!("{:?}", s),
        Token::Ident(i) => i.clone(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Comma => ",".to_string(),
        Token::Op(op) => op.symbol().to_string(),
    };
    ExprErrorKind::Syntax(format!("unexpected token: {}", text))
}
