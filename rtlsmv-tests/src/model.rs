//! Just enough of an SMV reader and evaluator to check dumped models against concrete states.

use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, PartialEq)]
pub enum Val {
    Bool(bool),
    Word { width: u32, bits: u64, signed: bool },
    Array { width: u32, words: BTreeMap<u64, u64> },
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

fn sign_extend(bits: u64, width: u32) -> i64 {
    if width >= 64 {
        return bits as i64;
    }
    let shift = 64 - width;
    ((bits << shift) as i64) >> shift
}

impl Val {
    pub fn word(width: u32, bits: u64) -> Val {
        Val::Word {
            width,
            bits: bits & mask(width),
            signed: false,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Val::Bool(value) => value,
            _ => panic!("expected a boolean, got {:?}", self),
        }
    }

    pub fn as_word(&self) -> (u32, u64, bool) {
        match *self {
            Val::Word {
                width,
                bits,
                signed,
            } => (width, bits, signed),
            _ => panic!("expected a word, got {:?}", self),
        }
    }

    fn as_i64(&self) -> i64 {
        let (width, bits, signed) = self.as_word();
        if signed {
            sign_extend(bits, width)
        } else {
            bits as i64
        }
    }

    fn with_bits(&self, bits: u64) -> Val {
        let (width, _, signed) = self.as_word();
        Val::Word {
            width,
            bits: bits & mask(width),
            signed,
        }
    }

    fn read(&self, address: u64) -> u64 {
        match self {
            Val::Array { words, .. } => words.get(&address).copied().unwrap_or(0),
            _ => panic!("expected an array, got {:?}", self),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Name(String),
    Ident(String),
    Num(u64),
    Const(u32, u64),
    Sym(&'static str),
}

const SYMBOLS: &[&str] = &[
    "::", "->", "!=", "<=", ">=", "<<", ">>", "(", ")", "[", "]", ",", "?", ":", ";", "!", "-", "+", "&", "|",
    "/", "=", "<", ">", "*",
];

fn tokenize(s: &str) -> Vec<Token> {
    let mut ret = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if rest.starts_with('"') {
            let end = rest[1..].find('"').expect("unterminated name") + 2;
            ret.push(Token::Name(rest[..end].to_string()));
            rest = &rest[end..];
        } else if rest.starts_with("0ub") {
            let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len());
            let literal = &rest[3..end];
            let (width, bits) = literal.split_at(literal.find('_').expect("malformed constant"));
            let width = width.parse().expect("malformed constant width");
            let bits = u64::from_str_radix(&bits[1..], 2).expect("malformed constant bits");
            ret.push(Token::Const(width, bits));
            rest = &rest[end..];
        } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            ret.push(Token::Num(rest[..end].parse().expect("malformed number")));
            rest = &rest[end..];
        } else if rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            let end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            ret.push(Token::Ident(rest[..end].to_string()));
            rest = &rest[end..];
        } else {
            let symbol = SYMBOLS
                .iter()
                .find(|symbol| rest.starts_with(**symbol))
                .unwrap_or_else(|| panic!("unexpected input at {:?}", rest));
            ret.push(Token::Sym(*symbol));
            rest = &rest[symbol.len()..];
        }
        rest = rest.trim_start();
    }
    ret
}

#[derive(Clone, Debug)]
enum Ast {
    Ref(String),
    Bool(bool),
    Const(u32, u64),
    Call(String, Vec<Ast>),
    Resize(Box<Ast>, u32),
    Bits(Box<Ast>, u32, u32),
    UnOp(&'static str, Box<Ast>),
    BinOp(Box<Ast>, String, Box<Ast>),
    Cond(Box<Ast>, Box<Ast>, Box<Ast>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().expect("unexpected end of expression");
        self.pos += 1;
        token
    }

    fn expect(&mut self, symbol: &str) {
        match self.next() {
            Token::Sym(s) if s == symbol => (),
            token => panic!("expected {:?}, got {:?}", symbol, token),
        }
    }

    fn expect_ident(&mut self, ident: &str) {
        match self.next() {
            Token::Ident(ref s) if s == ident => (),
            token => panic!("expected {:?}, got {:?}", ident, token),
        }
    }

    fn binary_op(&self) -> Option<String> {
        match self.peek() {
            Some(Token::Sym(s)) if !matches!(*s, "(" | ")" | "[" | "]" | "," | "?" | ":" | ";" | "!") => {
                Some(s.to_string())
            }
            Some(Token::Ident(s)) if s == "xor" || s == "xnor" || s == "mod" => Some(s.clone()),
            _ => None,
        }
    }

    fn expr(&mut self) -> Ast {
        let mut lhs = self.unary();
        while let Some(op) = self.binary_op() {
            self.pos += 1;
            let rhs = self.unary();
            lhs = Ast::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        lhs
    }

    fn unary(&mut self) -> Ast {
        match self.peek() {
            Some(Token::Sym("!")) => {
                self.pos += 1;
                Ast::UnOp("!", Box::new(self.unary()))
            }
            Some(Token::Sym("-")) => {
                self.pos += 1;
                Ast::UnOp("-", Box::new(self.unary()))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Ast {
        let mut ret = self.primary();
        while let Some(Token::Sym("[")) = self.peek() {
            self.pos += 1;
            let high = self.num();
            self.expect(":");
            let low = self.num();
            self.expect("]");
            ret = Ast::Bits(Box::new(ret), high, low);
        }
        ret
    }

    fn num(&mut self) -> u32 {
        match self.next() {
            Token::Num(n) => n as u32,
            token => panic!("expected a number, got {:?}", token),
        }
    }

    fn primary(&mut self) -> Ast {
        match self.next() {
            Token::Name(name) => Ast::Ref(name),
            Token::Const(width, bits) => Ast::Const(width, bits),
            Token::Ident(ident) => match ident.as_str() {
                "TRUE" => Ast::Bool(true),
                "FALSE" => Ast::Bool(false),
                "resize" => {
                    self.expect("(");
                    let source = self.expr();
                    self.expect(",");
                    let width = self.num();
                    self.expect(")");
                    Ast::Resize(Box::new(source), width)
                }
                "next" | "READ" | "WRITE" | "signed" | "unsigned" | "bool" | "word1" => {
                    self.expect("(");
                    let mut args = vec![self.expr()];
                    while let Some(Token::Sym(",")) = self.peek() {
                        self.pos += 1;
                        args.push(self.expr());
                    }
                    self.expect(")");
                    Ast::Call(ident.clone(), args)
                }
                _ => Ast::Ref(ident.clone()),
            },
            Token::Sym("(") => {
                if let Some(Token::Ident(s)) = self.peek() {
                    if s == "case" {
                        self.pos += 1;
                        let cond = self.expr();
                        self.expect(":");
                        let when_true = self.expr();
                        self.expect(";");
                        self.expect_ident("TRUE");
                        self.expect(":");
                        let when_false = self.expr();
                        self.expect(";");
                        self.expect_ident("esac");
                        self.expect(")");
                        return Ast::Cond(Box::new(cond), Box::new(when_true), Box::new(when_false));
                    }
                }
                let inner = self.expr();
                if let Some(Token::Sym("?")) = self.peek() {
                    self.pos += 1;
                    let when_true = self.expr();
                    self.expect(":");
                    let when_false = self.expr();
                    self.expect(")");
                    return Ast::Cond(Box::new(inner), Box::new(when_true), Box::new(when_false));
                }
                self.expect(")");
                inner
            }
            token => panic!("unexpected token {:?}", token),
        }
    }
}

fn parse(s: &str) -> Ast {
    let mut parser = Parser {
        tokens: tokenize(s),
        pos: 0,
    };
    let ret = parser.expr();
    if parser.pos != parser.tokens.len() {
        panic!("trailing input in {:?}", s);
    }
    ret
}

/// Variable assignments, keyed by quoted name.
pub type State = HashMap<String, Val>;

/// One `MODULE` of a dumped model.
#[derive(Debug)]
pub struct Model {
    pub ivars: Vec<(String, String)>,
    pub vars: Vec<(String, String)>,
    pub defines: HashMap<String, String>,
    pub init: String,
    pub trans: String,
    pub invarspecs: Vec<String>,
}

impl Model {
    /// Parses the module called `name` out of `text`.
    pub fn parse(text: &str, name: &str) -> Model {
        let header = format!("MODULE {}", name);
        let lines = text
            .lines()
            .skip_while(|line| *line != header)
            .skip(1)
            .take_while(|line| !line.starts_with("MODULE "))
            .collect::<Vec<_>>();
        if lines.is_empty() {
            panic!("no {} in:\n{}", header, text);
        }

        let mut model = Model {
            ivars: Vec::new(),
            vars: Vec::new(),
            defines: HashMap::new(),
            init: String::new(),
            trans: String::new(),
            invarspecs: Vec::new(),
        };
        let mut section = "";
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if !line.starts_with(' ') {
                section = line.split(' ').next().unwrap_or("");
                let body = line[section.len()..].trim().trim_end_matches(';').to_string();
                match section {
                    "INIT" => model.init = body,
                    "TRANS" => model.trans = body,
                    "INVARSPEC" => model.invarspecs.push(body),
                    _ => (),
                }
                continue;
            }
            let line = line.trim().trim_end_matches(';');
            match section {
                "IVAR" | "VAR" => {
                    let (name, ty) = line.split_at(line.find(" : ").expect("malformed declaration"));
                    let declaration = (name.to_string(), ty[3..].to_string());
                    if section == "IVAR" {
                        model.ivars.push(declaration);
                    } else {
                        model.vars.push(declaration);
                    }
                }
                "DEFINE" => {
                    let (name, expr) = line.split_at(line.find(" := ").expect("malformed definition"));
                    model.defines.insert(name.to_string(), expr[4..].to_string());
                }
                _ => panic!("unexpected line {:?} in section {:?}", line, section),
            }
        }
        model
    }

    fn declared_type(&self, name: &str) -> &str {
        self.ivars
            .iter()
            .chain(self.vars.iter())
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty.as_str())
            .unwrap_or_else(|| panic!("{} is not declared", name))
    }

    /// Builds a state from plain numbers, typed by each variable's declaration.
    pub fn state(&self, values: &[(&str, u64)]) -> State {
        values
            .iter()
            .map(|&(name, value)| {
                let name = format!("\"{}\"", name);
                let ty = self.declared_type(&name);
                let value = if ty == "boolean" {
                    Val::Bool(value != 0)
                } else {
                    let width = ty
                        .trim_start_matches("word[")
                        .trim_end_matches(']')
                        .parse()
                        .unwrap_or_else(|_| panic!("{} is not a scalar", name));
                    Val::word(width, value)
                };
                (name, value)
            })
            .collect()
    }

    /// Adds the contents of array `name` to `state`; unlisted words read as 0.
    pub fn with_array(&self, mut state: State, name: &str, words: &[(u64, u64)]) -> State {
        let name = format!("\"{}\"", name);
        let ty = self.declared_type(&name);
        let width = ty
            .rsplit("word[")
            .next()
            .and_then(|width| width.trim_end_matches(']').parse().ok())
            .unwrap_or_else(|| panic!("{} is not an array", name));
        state.insert(
            name,
            Val::Array {
                width,
                words: words.iter().copied().filter(|&(_, data)| data != 0).collect(),
            },
        );
        state
    }

    /// Replaces every definition reference in `expr` with its definition.
    pub fn inline(&self, expr: &str) -> String {
        let mut ret = String::new();
        let mut rest = expr;
        while let Some(start) = rest.find("__expr") {
            ret.push_str(&rest[..start]);
            let end = rest[start + 6..]
                .find(|c: char| !c.is_ascii_digit())
                .map_or(rest.len(), |end| start + 6 + end);
            let name = &rest[start..end];
            let definition = self
                .defines
                .get(name)
                .unwrap_or_else(|| panic!("{} is not defined", name));
            let inlined = self.inline(definition);
            if inlined.contains(' ') && !is_wrapped(&inlined) {
                ret.push('(');
                ret.push_str(&inlined);
                ret.push(')');
            } else {
                ret.push_str(&inlined);
            }
            rest = &rest[end..];
        }
        ret.push_str(rest);
        ret
    }

    pub fn eval(&self, expr: &str, current: &State, next: &State) -> Val {
        self.eval_ast(&parse(expr), current, next)
    }

    pub fn init_holds(&self, current: &State) -> bool {
        self.eval(&self.init, current, &State::new()).as_bool()
    }

    pub fn trans_holds(&self, current: &State, next: &State) -> bool {
        self.eval(&self.trans, current, next).as_bool()
    }

    pub fn invariants_hold(&self, current: &State) -> bool {
        self.invarspecs
            .iter()
            .all(|invarspec| self.eval(invarspec, current, &State::new()).as_bool())
    }

    fn eval_ast(&self, ast: &Ast, current: &State, next: &State) -> Val {
        match ast {
            Ast::Ref(name) => match self.defines.get(name) {
                Some(definition) => self.eval(definition, current, next),
                None => current
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| panic!("no value for {}", name)),
            },
            Ast::Bool(value) => Val::Bool(*value),
            Ast::Const(width, bits) => Val::word(*width, *bits),
            Ast::Call(function, args) => {
                if function == "next" {
                    return match &args[0] {
                        Ast::Ref(name) => next
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| panic!("no next value for {}", name)),
                        arg => panic!("next() of {:?}", arg),
                    };
                }
                let args = args
                    .iter()
                    .map(|arg| self.eval_ast(arg, current, next))
                    .collect::<Vec<_>>();
                match function.as_str() {
                    "READ" => {
                        let width = match args[0] {
                            Val::Array { width, .. } => width,
                            _ => panic!("READ from {:?}", args[0]),
                        };
                        Val::word(width, args[0].read(args[1].as_word().1))
                    }
                    "WRITE" => {
                        let mut ret = args[0].clone();
                        if let Val::Array { ref mut words, .. } = ret {
                            let (_, data, _) = args[2].as_word();
                            let address = args[1].as_word().1;
                            if data == 0 {
                                words.remove(&address);
                            } else {
                                words.insert(address, data);
                            }
                        }
                        ret
                    }
                    "signed" | "unsigned" => {
                        let (width, bits, _) = args[0].as_word();
                        Val::Word {
                            width,
                            bits,
                            signed: function == "signed",
                        }
                    }
                    "bool" => {
                        let (width, bits, _) = args[0].as_word();
                        assert_eq!(width, 1, "bool() of a {}-bit word", width);
                        Val::Bool(bits != 0)
                    }
                    "word1" => Val::word(1, args[0].as_bool() as u64),
                    _ => unreachable!(),
                }
            }
            Ast::Resize(source, width) => {
                let source = self.eval_ast(source, current, next);
                let (_, _, signed) = source.as_word();
                Val::Word {
                    width: *width,
                    bits: source.as_i64() as u64 & mask(*width),
                    signed,
                }
            }
            Ast::Bits(source, high, low) => {
                let (_, bits, _) = self.eval_ast(source, current, next).as_word();
                Val::word(high - low + 1, bits >> low)
            }
            Ast::UnOp(op, source) => {
                let source = self.eval_ast(source, current, next);
                match (*op, &source) {
                    ("!", Val::Bool(value)) => Val::Bool(!value),
                    ("!", _) => source.with_bits(!source.as_word().1),
                    ("-", _) => source.with_bits(source.as_word().1.wrapping_neg()),
                    _ => unreachable!(),
                }
            }
            Ast::BinOp(lhs, op, rhs) => {
                let lhs = self.eval_ast(lhs, current, next);
                let rhs = self.eval_ast(rhs, current, next);
                binary(&lhs, op, &rhs)
            }
            Ast::Cond(cond, when_true, when_false) => {
                if self.eval_ast(cond, current, next).as_bool() {
                    self.eval_ast(when_true, current, next)
                } else {
                    self.eval_ast(when_false, current, next)
                }
            }
        }
    }
}

fn is_wrapped(s: &str) -> bool {
    if !s.starts_with('(') {
        return false;
    }
    let mut depth = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => (),
        }
    }
    false
}

fn array_eq(lhs: &Val, rhs: &Val) -> bool {
    match (lhs, rhs) {
        (Val::Array { words: a, .. }, Val::Array { words: b, .. }) => a == b,
        _ => panic!("comparing {:?} with {:?}", lhs, rhs),
    }
}

fn binary(lhs: &Val, op: &str, rhs: &Val) -> Val {
    if let (Val::Bool(a), Val::Bool(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        return Val::Bool(match op {
            "&" => a && b,
            "|" => a || b,
            "xor" | "!=" => a != b,
            "xnor" | "=" => a == b,
            "->" => !a || b,
            _ => panic!("boolean operator {}", op),
        });
    }
    if let Val::Array { .. } = lhs {
        return Val::Bool(match op {
            "=" => array_eq(lhs, rhs),
            "!=" => !array_eq(lhs, rhs),
            _ => panic!("array operator {}", op),
        });
    }

    let (width, a, signed) = lhs.as_word();
    let (rhs_width, b, _) = rhs.as_word();
    if op == "::" {
        return Val::word(width + rhs_width, (a << rhs_width) | b);
    }
    if op == "<<" || op == ">>" {
        let shifted = if b >= 64 {
            if op == ">>" && signed && lhs.as_i64() < 0 {
                u64::MAX
            } else {
                0
            }
        } else if op == "<<" {
            a << b
        } else if signed {
            (lhs.as_i64() >> b) as u64
        } else {
            a >> b
        };
        return lhs.with_bits(shifted);
    }
    assert_eq!(width, rhs_width, "operands of {} differ in width", op);
    let (sa, sb) = (lhs.as_i64(), rhs.as_i64());
    match op {
        "=" => Val::Bool(a == b),
        "!=" => Val::Bool(a != b),
        "<" => Val::Bool(if signed { sa < sb } else { a < b }),
        "<=" => Val::Bool(if signed { sa <= sb } else { a <= b }),
        ">" => Val::Bool(if signed { sa > sb } else { a > b }),
        ">=" => Val::Bool(if signed { sa >= sb } else { a >= b }),
        "+" => lhs.with_bits(a.wrapping_add(b)),
        "-" => lhs.with_bits(a.wrapping_sub(b)),
        "*" => lhs.with_bits(a.wrapping_mul(b)),
        "/" => lhs.with_bits(if signed { sa.wrapping_div(sb) as u64 } else { a / b }),
        "mod" => lhs.with_bits(if signed { sa.wrapping_rem(sb) as u64 } else { a % b }),
        "&" => lhs.with_bits(a & b),
        "|" => lhs.with_bits(a | b),
        "xor" => lhs.with_bits(a ^ b),
        "xnor" => lhs.with_bits(!(a ^ b)),
        _ => panic!("word operator {}", op),
    }
}

#[test]
fn expressions() {
    let mut model = Model::parse("MODULE main\n\nIVAR\n  \"a\" : word[4];\n\nINIT TRUE;\nTRANS TRUE;\n", "main");
    model.defines.insert("__expr1".into(), "\"a\" + 0ub4_0001".into());
    model.defines.insert("__expr2".into(), "(bool(__expr1[0:0]) ? __expr1 :: \"a\" : 0ub8_00000000)".into());

    let state = model.state(&[("a", 2)]);
    assert_eq!(model.eval("__expr2", &state, &State::new()), Val::word(8, 0x32));
    let state = model.state(&[("a", 3)]);
    assert_eq!(model.eval("__expr2", &state, &State::new()), Val::word(8, 0));
    assert_eq!(
        model.eval("resize(signed(\"a\"), 8)", &model.state(&[("a", 0xc)]), &State::new()).as_word().1,
        0xfc
    );
    assert_eq!(
        model.inline("__expr2"),
        "(bool((\"a\" + 0ub4_0001)[0:0]) ? (\"a\" + 0ub4_0001) :: \"a\" : 0ub8_00000000)"
    );
}
