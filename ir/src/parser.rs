use crate::{
  AssignOp, CallTarget, CmpOp, Function, IncDecOp, Instr, Operand, Program,
  Reg, RuntimeFn,
};
use indexmap::IndexMap;
use support::{CompileError, Range};

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cst {
  List(Vec<Cst>, Range),
  Symbol(Range),
  Number(Range),
}

impl Cst {
  fn range(&self) -> Range {
    match self {
      Self::List(_, range) | Self::Symbol(range) | Self::Number(range) => {
        *range
      }
    }
  }
}

struct Parser<'a> {
  input: &'a str,
  s: &'a str,
  token: (Range, Token),
  i: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
  Eof,
  Atom,
  Punc(char),
}

impl<'a> Parser<'a> {
  fn new(input: &'a str) -> Self {
    Self {
      input,
      s: input,
      token: ((0, 0).into(), Token::Eof),
      i: 0,
    }
  }

  fn peek(&self) -> Option<char> {
    self.s.chars().next()
  }

  fn advance(&mut self) {
    if let Some(c) = self.peek() {
      self.i += c.len_utf8();
      self.s = &self.s[c.len_utf8()..];
    }
  }

  fn get_token(&mut self) -> Token {
    while let Some(c) = self.peek() {
      if c == ';' {
        self.s = self.s.trim_start_matches(|c: char| c != '\n');
        self.i = self.input.len() - self.s.len();
      } else if c.is_whitespace() {
        self.advance();
      } else {
        break;
      }
    }

    let start = self.i;
    let tok = match self.peek() {
      Some(c @ ('(' | ')')) => {
        self.advance();
        Token::Punc(c)
      }
      Some(_) => {
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && !"();".contains(c))
        {
          self.advance();
        }
        Token::Atom
      }
      None => Token::Eof,
    };
    self.token = ((start, self.i).into(), tok);
    tok
  }

  fn parse(&mut self) -> Result<Vec<Cst>> {
    self.get_token();
    let mut xs = vec![];
    while self.token.1 != Token::Eof {
      xs.push(self.parse_exp()?);
    }
    Ok(xs)
  }

  fn parse_exp(&mut self) -> Result<Cst> {
    let range = self.token.0;
    match self.token.1 {
      Token::Punc('(') => self.parse_list(),
      Token::Atom => {
        self.get_token();
        self.parse_atom(range)
      }
      Token::Eof => Err(CompileError::new(range, "unexpected EOF")),
      Token::Punc(c) => {
        Err(CompileError::new(range, format!("unexpected char '{}'", c)))
      }
    }
  }

  fn parse_atom(&self, range: Range) -> Result<Cst> {
    match range.slice(self.input).parse::<i64>() {
      Ok(_) => Ok(Cst::Number(range)),
      Err(err) => {
        use std::num::IntErrorKind;
        if let IntErrorKind::PosOverflow | IntErrorKind::NegOverflow =
          err.kind()
        {
          Err(CompileError::new(range, "integer overflow"))
        } else {
          Ok(Cst::Symbol(range))
        }
      }
    }
  }

  fn parse_list(&mut self) -> Result<Cst> {
    let open = self.token.0;
    self.get_token();
    let mut xs = vec![];
    loop {
      match self.token.1 {
        Token::Punc(')') => {
          let range = open.to(self.token.0);
          self.get_token();
          return Ok(Cst::List(xs, range));
        }
        Token::Eof => {
          return Err(CompileError::new(open.to(self.token.0), "unclosed list"))
        }
        _ => xs.push(self.parse_exp()?),
      }
    }
  }
}

/// A leaf of an instruction list.
#[derive(Clone, Copy)]
struct Atom<'a> {
  text: &'a str,
  range: Range,
  number: bool,
}

impl<'a> Atom<'a> {
  fn error(&self, message: impl ToString) -> CompileError {
    CompileError::new(self.range, message)
  }

  fn number(&self) -> Result<i64> {
    if self.number {
      // the tokenizer already rejected overflowing literals
      self
        .text
        .parse()
        .map_err(|_| self.error("integer overflow"))
    } else {
      Err(self.error(format!("expected a number, found '{}'", self.text)))
    }
  }

  fn label(&self) -> Result<String> {
    match self.text.strip_prefix(':') {
      Some(name) if is_identifier(name) => Ok(name.to_owned()),
      _ => Err(self.error(format!("expected a label, found '{}'", self.text))),
    }
  }

  fn operand(&self) -> Result<Operand> {
    if self.number {
      Ok(Operand::Num(self.number()?))
    } else if self.text.starts_with(':') {
      Ok(Operand::Label(self.label()?))
    } else if let Some(reg) = Reg::from_name(self.text) {
      Ok(Operand::Reg(reg))
    } else if is_identifier(self.text) {
      Ok(Operand::Var(self.text.to_owned()))
    } else {
      Err(self.error(format!("invalid operand '{}'", self.text)))
    }
  }

  /// A register or variable (`x`/`w` in the grammar).
  fn location(&self) -> Result<Operand> {
    match self.operand()? {
      operand @ (Operand::Reg(_) | Operand::Var(_)) => Ok(operand),
      _ => Err(self.error(format!(
        "expected a register or variable, found '{}'",
        self.text
      ))),
    }
  }

  /// A register, variable or number (`t` in the grammar).
  fn value(&self) -> Result<Operand> {
    match self.operand()? {
      Operand::Label(_) => Err(self.error(format!(
        "expected a register, variable or number, found '{}'",
        self.text
      ))),
      operand => Ok(operand),
    }
  }

  fn cmp(&self) -> Result<CmpOp> {
    CmpOp::from_symbol(self.text).ok_or_else(|| {
      self.error(format!("expected a comparison, found '{}'", self.text))
    })
  }
}

fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn leaf<'a>(input: &'a str, x: &Cst) -> Result<Atom<'a>> {
  match *x {
    Cst::Symbol(range) => Ok(Atom {
      text: range.slice(input),
      range,
      number: false,
    }),
    Cst::Number(range) => Ok(Atom {
      text: range.slice(input),
      range,
      number: true,
    }),
    Cst::List(_, range) => {
      Err(CompileError::new(range, "unexpected nested list"))
    }
  }
}

fn atoms<'a>(input: &'a str, xs: &[Cst]) -> Result<Vec<Atom<'a>>> {
  xs.iter().map(|x| leaf(input, x)).collect()
}

/// Whether `xs` is a parenthesized `(mem x M)` or `(stack-arg M)` operand.
fn is_memory_operand(input: &str, xs: &[Cst]) -> bool {
  match xs {
    [Cst::Symbol(head), _, _] => head.slice(input) == "mem",
    [Cst::Symbol(head), _] => head.slice(input) == "stack-arg",
    _ => false,
  }
}

/// The atoms of an instruction. Memory and stack-argument operands may be
/// written bare (`rax <- mem rsp 8`) or parenthesized
/// (`rax <- (mem rsp 8)`); both read the same.
fn instr_atoms<'a>(input: &'a str, xs: &[Cst]) -> Result<Vec<Atom<'a>>> {
  let mut atoms = vec![];
  for x in xs {
    match x {
      Cst::List(inner, _) if is_memory_operand(input, inner) => {
        atoms.extend(self::atoms(input, inner)?);
      }
      x => atoms.push(leaf(input, x)?),
    }
  }

  // `(w++)` is written without a space as often as with one.
  if let [atom] = atoms[..] {
    for suffix in ["++", "--"] {
      if let Some(target) = atom.text.strip_suffix(suffix) {
        if !target.is_empty() {
          let split = atom.range.start + target.len();
          atoms = vec![
            Atom {
              text: target,
              range: (atom.range.start, split).into(),
              number: false,
            },
            Atom {
              text: suffix,
              range: (split, atom.range.end).into(),
              number: false,
            },
          ];
          break;
        }
      }
    }
  }
  Ok(atoms)
}

fn build_prog(input: &str, cst: Vec<Cst>) -> Result<Program> {
  let mut cst = cst.into_iter();
  let (xs, range) = match (cst.next(), cst.next()) {
    (Some(Cst::List(xs, range)), None) => (xs, range),
    (None, _) => {
      return Err(CompileError::new(
        (input.len(), input.len()).into(),
        "expected a program",
      ))
    }
    (Some(Cst::List(..)), Some(extra)) => {
      return Err(CompileError::new(
        extra.range(),
        "unexpected input after program",
      ))
    }
    (Some(other), _) => {
      return Err(CompileError::new(other.range(), "expected a program"))
    }
  };

  let mut xs = xs.into_iter();
  let entry = match xs.next() {
    Some(Cst::Symbol(range)) => atom(input, range).label()?,
    Some(other) => {
      return Err(CompileError::new(other.range(), "expected entry label"))
    }
    None => return Err(CompileError::new(range, "expected entry label")),
  };

  let mut funs = IndexMap::new();
  for x in xs {
    let fun_range = x.range();
    let fun = build_fun(input, x)?;
    if funs.contains_key(&fun.name) {
      return Err(CompileError::new(
        fun_range,
        format!("duplicate function :{}", fun.name),
      ));
    }
    funs.insert(fun.name.clone(), fun);
  }
  if funs.is_empty() {
    return Err(CompileError::new(range, "program has no functions"));
  }

  Ok(Program { entry, funs })
}

fn atom(input: &str, range: Range) -> Atom<'_> {
  Atom {
    text: range.slice(input),
    range,
    number: false,
  }
}

fn build_fun(input: &str, cst: Cst) -> Result<Function> {
  let (xs, range) = match cst {
    Cst::List(xs, range) => (xs, range),
    other => return Err(CompileError::new(other.range(), "expected a function")),
  };
  if xs.len() < 3 {
    return Err(CompileError::new(range, "invalid function form"));
  }
  let header = atoms(input, &xs[..3])?;
  let name = header[0].label()?;
  let arguments = header[1].number()?;
  let locals = header[2].number()?;
  let instrs = xs[3..]
    .iter()
    .map(|x| build_instr(input, x))
    .collect::<Result<_>>()?;

  Ok(Function {
    name,
    arguments,
    locals,
    instrs,
  })
}

fn build_instr(input: &str, cst: &Cst) -> Result<(Range, Instr)> {
  let (xs, range) = match cst {
    Cst::Symbol(range) => {
      return Ok((*range, Instr::Label(atom(input, *range).label()?)))
    }
    Cst::Number(range) => {
      return Err(CompileError::new(*range, "expected an instruction"))
    }
    Cst::List(xs, range) => (xs, *range),
  };
  let xs = instr_atoms(input, xs)?;
  let words = xs.iter().map(|x| x.text).collect::<Vec<_>>();
  let invalid = |form: &str| CompileError::new(range, format!("invalid {} form", form));

  let instr = match words[..] {
    ["return"] => Instr::Return,
    ["goto", _] => Instr::Goto(xs[1].label()?),
    ["goto", ..] => return Err(invalid("goto")),
    ["call", callee, _] => Instr::Call {
      target: match RuntimeFn::from_name(callee) {
        Some(func) => CallTarget::Runtime(func),
        None => match xs[1].operand()? {
          operand @ (Operand::Reg(_) | Operand::Var(_) | Operand::Label(_)) => {
            CallTarget::Operand(operand)
          }
          _ => return Err(xs[1].error("invalid call target")),
        },
      },
      args: xs[2].number()?,
    },
    ["call", ..] => return Err(invalid("call")),
    ["cjump", _, _, _, _, _] => Instr::CJump {
      lhs: xs[1].value()?,
      cmp: xs[2].cmp()?,
      rhs: xs[3].value()?,
      then_label: xs[4].label()?,
      else_label: xs[5].label()?,
    },
    ["cjump", ..] => {
      return Err(CompileError::new(
        range,
        "cjump requires a comparison and two labels",
      ))
    }
    ["mem", _, _, op, _] => {
      let op = match AssignOp::from_symbol(op) {
        Some(op @ (AssignOp::Move | AssignOp::Add | AssignOp::Sub)) => op,
        _ => return Err(xs[3].error("expected '<-', '+=' or '-='")),
      };
      let src = if op == AssignOp::Move {
        xs[4].operand()?
      } else {
        xs[4].value()?
      };
      Instr::Assign {
        dest: Operand::mem(xs[1].location()?, xs[2].number()?),
        op,
        src,
      }
    }
    ["mem", ..] => return Err(invalid("memory store")),
    [_, "<-", "mem", _, _] => Instr::Assign {
      dest: xs[0].location()?,
      op: AssignOp::Move,
      src: Operand::mem(xs[3].location()?, xs[4].number()?),
    },
    [_, "<-", "stack-arg", _] => Instr::StackArg {
      dest: xs[0].location()?,
      offset: xs[3].number()?,
    },
    [_, "<-", _, _, _] => Instr::Compare {
      dest: xs[0].location()?,
      lhs: xs[2].value()?,
      cmp: xs[3].cmp()?,
      rhs: xs[4].value()?,
    },
    [_, "<-", _] => Instr::Assign {
      dest: xs[0].location()?,
      op: AssignOp::Move,
      src: xs[2].operand()?,
    },
    [_, "++"] => Instr::IncDec {
      target: xs[0].location()?,
      op: IncDecOp::Inc,
    },
    [_, "--"] => Instr::IncDec {
      target: xs[0].location()?,
      op: IncDecOp::Dec,
    },
    [_, "@", _, _, _] => Instr::Cisc {
      dest: xs[0].location()?,
      base: xs[2].location()?,
      index: xs[3].location()?,
      scale: match xs[4].number()? {
        scale @ (1 | 2 | 4 | 8) => scale,
        _ => return Err(xs[4].error("scale must be 1, 2, 4 or 8")),
      },
    },
    [_, op, "mem", _, _] => match AssignOp::from_symbol(op) {
      Some(op @ (AssignOp::Add | AssignOp::Sub | AssignOp::Mul | AssignOp::And)) => {
        Instr::Assign {
          dest: xs[0].location()?,
          op,
          src: Operand::mem(xs[3].location()?, xs[4].number()?),
        }
      }
      _ => return Err(invalid("arithmetic")),
    },
    [_, op, _] => match AssignOp::from_symbol(op) {
      Some(op @ (AssignOp::Shl | AssignOp::Shr)) => Instr::Assign {
        dest: xs[0].location()?,
        op,
        src: match xs[2].value()? {
          Operand::Reg(reg) if reg != Reg::Rcx => {
            return Err(xs[2].error("shift count must be rcx, a variable or a number"))
          }
          src => src,
        },
      },
      Some(op) => Instr::Assign {
        dest: xs[0].location()?,
        op,
        src: xs[2].value()?,
      },
      None => return Err(xs[1].error(format!("unknown operator '{}'", op))),
    },
    _ => return Err(CompileError::new(range, "unrecognized instruction")),
  };
  Ok((range, instr))
}

pub fn parse<S: AsRef<str>>(input: S) -> Result<Program> {
  let input = input.as_ref();
  let cst = Parser::new(input).parse()?;
  build_prog(input, cst)
}
