//! Evaluator for `%if` expressions, after macro expansion.

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Op(&'static str),
    Open,
    Close,
}

const OVERFLOW: &str = "integer overflow in expression";

const OPERATORS: [&str; 13] = [
    "&&", "||", "==", "!=", "<=", ">=", "<", ">", "!", "+", "-", "*", "/",
];

pub fn evaluate(expr: &str) -> Result<bool, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("%if with no expression".to_owned());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("syntax error in expression: {}", expr.trim()));
    }
    Ok(value.truthy())
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = expr.trim_start();

    while let Some(c) = rest.chars().next() {
        if c == '(' {
            tokens.push(Token::Open);
            rest = &rest[1..];
        } else if c == ')' {
            tokens.push(Token::Close);
            rest = &rest[1..];
        } else if c == '"' {
            let end = rest[1..]
                .find('"')
                .ok_or_else(|| format!("unterminated string in expression: {}", expr.trim()))?;
            tokens.push(Token::Str(rest[1..end + 1].to_owned()));
            rest = &rest[end + 2..];
        } else if c.is_ascii_digit() {
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let n = rest[..end]
                .parse()
                .map_err(|_| format!("number out of range: {}", &rest[..end]))?;
            tokens.push(Token::Int(n));
            rest = &rest[end..];
        } else if let Some(&op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::Op(op));
            rest = &rest[op.len()..];
        } else if c.is_alphanumeric() || c == '_' || c == '.' || c == '%' {
            let end = rest
                .find(|c: char| !(c.is_alphanumeric() || "_.%{}?:".contains(c)))
                .unwrap_or(rest.len());
            tokens.push(Token::Str(rest[..end].to_owned()));
            rest = &rest[end..];
        } else {
            return Err(format!("bad character {:?} in expression: {}", c, expr.trim()));
        }
        rest = rest.trim_start();
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn or(&mut self) -> Result<Value, String> {
        let mut left = self.and()?;
        while self.peek_op() == Some("||") {
            self.pos += 1;
            let right = self.and()?;
            left = Value::Int((left.truthy() || right.truthy()) as i64);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Value, String> {
        let mut left = self.comparison()?;
        while self.peek_op() == Some("&&") {
            self.pos += 1;
            let right = self.comparison()?;
            left = Value::Int((left.truthy() && right.truthy()) as i64);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Value, String> {
        let left = self.sum()?;
        let op = match self.peek_op() {
            Some(op @ ("==" | "!=" | "<" | ">" | "<=" | ">=")) => op,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.sum()?;

        let ordering = match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => return Err("types must match".to_owned()),
        };
        let result = match op {
            "==" => ordering.is_eq(),
            "!=" => ordering.is_ne(),
            "<" => ordering.is_lt(),
            ">" => ordering.is_gt(),
            "<=" => ordering.is_le(),
            _ => ordering.is_ge(),
        };
        Ok(Value::Int(result as i64))
    }

    fn sum(&mut self) -> Result<Value, String> {
        let mut left = self.product()?;
        while let Some(op @ ("+" | "-")) = self.peek_op() {
            self.pos += 1;
            let right = self.product()?;
            left = match (left, right, op) {
                (Value::Int(a), Value::Int(b), "+") => {
                    Value::Int(a.checked_add(b).ok_or(OVERFLOW)?)
                }
                (Value::Int(a), Value::Int(b), _) => Value::Int(a.checked_sub(b).ok_or(OVERFLOW)?),
                (Value::Str(a), Value::Str(b), "+") => Value::Str(a + &b),
                _ => return Err(format!("bad operands for {}", op)),
            };
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<Value, String> {
        let mut left = self.unary()?;
        while let Some(op @ ("*" | "/")) = self.peek_op() {
            self.pos += 1;
            let right = self.unary()?;
            left = match (left, right) {
                (Value::Int(_), Value::Int(0)) if op == "/" => {
                    return Err("division by zero".to_owned());
                }
                (Value::Int(a), Value::Int(b)) if op == "/" => {
                    Value::Int(a.checked_div(b).ok_or(OVERFLOW)?)
                }
                (Value::Int(a), Value::Int(b)) => Value::Int(a.checked_mul(b).ok_or(OVERFLOW)?),
                _ => return Err(format!("bad operands for {}", op)),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, String> {
        match self.peek_op() {
            Some("!") => {
                self.pos += 1;
                let value = self.unary()?;
                Ok(Value::Int(!value.truthy() as i64))
            }
            Some("-") => {
                self.pos += 1;
                match self.unary()? {
                    Value::Int(n) => Ok(Value::Int(n.checked_neg().ok_or(OVERFLOW)?)),
                    Value::Str(_) => Err("- only applies to numbers".to_owned()),
                }
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Value, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_owned())?;
        self.pos += 1;

        match token {
            Token::Int(n) => Ok(Value::Int(n)),
            Token::Str(s) => Ok(Value::Str(s)),
            Token::Open => {
                let value = self.or()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("missing )".to_owned()),
                }
            }
            Token::Close => Err("unexpected )".to_owned()),
            Token::Op(op) => Err(format!("unexpected operator {}", op)),
        }
    }
}
