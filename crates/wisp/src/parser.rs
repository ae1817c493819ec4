//! The two-dimensional indentation layer and the inline expression grammar.
//!
//! Parsing is cooperative: [`Parser`] tracks `block_indent` (the indent of the enclosing
//! block) and threads it through the three primitives the inline grammar depends on —
//! [`Parser::nl_eol`], [`Parser::nl_white`], and [`Parser::nl_block`] — exactly as
//! described for the PEG state-threading model in [`crate::peg`]. Unlike the general PEG
//! engine, most of this layer is written as ordinary recursive-descent over a mutable
//! cursor: there is no backtracking across statement boundaries, so a single mutable
//! struct is simpler than threading an immutable state value through every combinator
//! (see the design notes on PEG state threading).

use std::rc::Rc;

use crate::ast::{AssignOp, Block, BinOp, ErrorTag, Expr, MapEntry, MatchCase, Node, Oob, Span, Stmt, UnOp};

/// Reserved words that cannot be used as an identifier.
const KEYWORDS: &[&str] = &["if", "loop", "while", "for", "assert", "match", "and", "or", "not", "true", "false"];

pub struct Parser<'s> {
    source: &'s str,
    pos: usize,
    /// Indent (in columns) of the block currently being parsed.
    block_indent: usize,
    oob: Vec<Oob>,
}

/// Parses a complete module: the top-level block plus the out-of-band comment/error
/// stream. This is the only public entry point, matching `parseModule` in the core API.
#[must_use]
pub fn parse_module(source: &str) -> (Node, Vec<Oob>) {
    let mut p = Parser { source, pos: 0, block_indent: 0, oob: Vec::new() };
    let block = p.parse_block_body();
    (Node::spanned(Expr::Block(block.clone()), block.span.unwrap_or_default()), p.oob)
}

impl<'s> Parser<'s> {
    fn span(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, text: &str) -> bool {
        self.source[self.pos..].as_bytes().starts_with(text.as_bytes())
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.starts_with(text) {
            self.pos += text.len();
            true
        } else {
            false
        }
    }

    fn error(&mut self, tag: ErrorTag, span: Span) {
        self.oob.push(Oob::Error { tag, span });
    }

    /// Indent (column count) of the line containing `pos`, measured from its start.
    fn indent_at(&self, line_start: usize) -> usize {
        self.source[line_start..].bytes().take_while(|b| *b == b' ').count()
    }

    fn line_start(&self, pos: usize) -> usize {
        self.source[..pos].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Indent of the logical line currently being parsed.
    fn line_indent(&self) -> usize {
        self.indent_at(self.line_start(self.pos))
    }

    // ---- the three 2D primitives exposed to the inline grammar ----

    /// `nlEOL`: succeeds (without consuming) at end-of-file, or before a line whose
    /// indent is `<= block_indent` — i.e. at the end of the current logical line.
    fn nl_eol(&self) -> bool {
        if self.at_eof() {
            return true;
        }
        let Some(rest_nl) = self.source[self.pos..].find('\n') else {
            return self.source[self.pos..].trim().is_empty();
        };
        let next_line_start = self.pos + rest_nl + 1;
        if next_line_start >= self.source.len() {
            return true;
        }
        self.indent_at(next_line_start) <= self.block_indent
    }

    /// `nlWhite`: consumes blank/comment-only lines, or a newline plus indent before a
    /// continuation line (indent strictly greater than `block_indent`, and not a block
    /// opener per [`Parser::at_block`]).
    fn nl_white(&mut self) -> bool {
        let mut consumed = false;
        loop {
            let save = self.pos;
            self.skip_spaces();
            if self.peek_char() == Some('#') {
                self.skip_to_eol();
                self.eat("\n");
                consumed = true;
                continue;
            }
            if self.peek_char() == Some('\n') {
                let line_start = save;
                if self.source[line_start..save].trim().is_empty() {
                    self.pos = save;
                    self.advance_char();
                    consumed = true;
                    continue;
                }
            }
            self.pos = save;
            break;
        }
        let save = self.pos;
        if self.peek_char() == Some('\n') {
            let next_line_start = self.pos + 1;
            let indent = self.indent_at(next_line_start);
            if indent > self.block_indent && !self.peeks_block_opener_at(next_line_start + indent) {
                self.pos = next_line_start + indent;
                return true;
            }
        }
        self.pos = save;
        consumed
    }

    /// `nlBlock`: consumes a newline and a nested block when the following line's indent
    /// strictly exceeds `block_indent` and [`Parser::at_block`] holds there.
    fn nl_block(&mut self) -> Option<Block> {
        let save = self.pos;
        if self.peek_char() != Some('\n') {
            self.pos = save;
            return None;
        }
        let next_line_start = self.pos + 1;
        let indent = self.indent_at(next_line_start);
        if indent <= self.block_indent || !self.peeks_block_opener_at(next_line_start + indent) {
            self.pos = save;
            return None;
        }
        self.pos = next_line_start + indent;
        let outer = self.block_indent;
        self.block_indent = indent;
        let block = self.parse_block_body();
        self.block_indent = outer;
        Some(block)
    }

    /// `AtBlock`: does a block start at `at`? True before any block-opening keyword, an
    /// assignment target followed by an assignment operator, an action header (`params <-`),
    /// or a match arm (`pattern =>`).
    fn peeks_block_opener_at(&self, at: usize) -> bool {
        let rest = &self.source[at..];
        for kw in ["if", "loop", "while", "for", "assert"] {
            if rest.starts_with(kw) && rest[kw.len()..].chars().next().is_none_or(|c| !is_ident_continue(c)) {
                return true;
            }
        }
        // Heuristics for assignment targets / action headers / match arms: scan the rest
        // of the logical line (bounded by the next unindented newline) for a top-level
        // assignment or arrow operator, ignoring bracket-nested occurrences.
        let line_end = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_end];
        scan_for_statement_operator(line)
    }

    // ---- whitespace & comments ----

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek_char() == Some(' ') {
            self.advance_char();
        }
    }

    /// Skips inline whitespace, comments, and 2D continuations; reports unexpected
    /// control characters.
    fn skip_inline(&mut self) {
        loop {
            let before = self.pos;
            self.skip_spaces();
            if self.peek_char() == Some('#') {
                let start = self.pos;
                self.skip_to_eol();
                self.oob.push(Oob::Comment { span: self.span(start) });
                continue;
            }
            if let Some(c) = self.peek_char()
                && c.is_control()
                && c != '\n'
                && c != '\t'
            {
                let start = self.pos;
                self.advance_char();
                self.error(ErrorTag::BadChar, self.span(start));
                continue;
            }
            if self.nl_white() {
                continue;
            }
            if before == self.pos {
                break;
            }
        }
    }

    // ---- atoms ----

    fn parse_number(&mut self) -> Node {
        let start = self.pos;
        let mut saw_digit_before = false;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance_char();
            saw_digit_before = true;
        }
        if self.peek_char() == Some('.') && self.source[self.pos + 1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.advance_char();
            if !saw_digit_before {
                self.error(ErrorTag::NumDigitBefore, self.span(start));
            }
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance_char();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let save = self.pos;
            self.advance_char();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance_char();
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance_char();
                }
            } else {
                self.error(ErrorTag::NumDigitExp, self.span(save));
                self.pos = save;
            }
        }
        if self.peek_char().is_some_and(|c| c.is_alphanumeric() || c == '.') {
            let bad_start = self.pos;
            while self.peek_char().is_some_and(|c| c.is_alphanumeric() || c == '.') {
                self.advance_char();
            }
            self.error(ErrorTag::NumEnd, self.span(bad_start));
        }
        let span = self.span(start);
        Node::spanned(Expr::Number(span.slice(self.source).into()), span)
    }

    fn parse_string(&mut self) -> Node {
        let start = self.pos;
        self.advance_char(); // opening quote
        let mut buf = String::new();
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    self.error(ErrorTag::StringEnd, self.span(start));
                    break;
                }
                Some('"') => {
                    self.advance_char();
                    break;
                }
                Some('\\') => {
                    let esc_start = self.pos;
                    self.advance_char();
                    match self.advance_char() {
                        Some('\\') => buf.push('\\'),
                        Some('"') => buf.push('"'),
                        Some('r') => buf.push('\r'),
                        Some('n') => buf.push('\n'),
                        Some('t') => buf.push('\t'),
                        _ => self.error(ErrorTag::StringBS, self.span(esc_start)),
                    }
                }
                Some(c) => {
                    buf.push(c);
                    self.advance_char();
                }
            }
        }
        let span = self.span(start);
        Node::spanned(Expr::String(buf.into()), span)
    }

    fn parse_identifier_text(&mut self) -> Option<(Rc<str>, Span)> {
        let start = self.pos;
        if !self.peek_char().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek_char().is_some_and(is_ident_continue) {
            self.advance_char();
        }
        let span = self.span(start);
        Some((span.slice(self.source).into(), span))
    }

    // ---- inline expressions, by precedence (low -> high) ----
    //
    // ->  (right assoc, params/body separator, handled in `parse_fn`)
    // $   (right assoc, application)
    // ?:  (right assoc ternary)
    // or
    // and
    // == != <= < >= >   (non-associative chain: a<b<c => (a<b) and (b<c))
    // + - ++
    // * / // %
    // prefix: not -
    // ^   (right assoc)
    // suffix: .name [expr] (args)

    fn parse_expr(&mut self) -> Node {
        self.parse_apply()
    }

    fn parse_apply(&mut self) -> Node {
        let lhs = self.parse_iif();
        self.skip_inline();
        if self.eat("$") {
            self.skip_inline();
            let rhs = self.parse_apply();
            let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
            return Node::spanned(Expr::Binop(BinOp::Apply, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_iif(&mut self) -> Node {
        let cond = self.parse_or();
        self.skip_inline();
        if self.eat("?") {
            self.skip_inline();
            let a = self.parse_iif();
            self.skip_inline();
            if !self.eat(":") {
                self.error(ErrorTag::CloseIIf, self.span(self.pos));
            }
            self.skip_inline();
            let b = self.parse_iif();
            let span = Span::new(cond.span.map_or(0, |s| s.start), self.pos as u32);
            return Node::spanned(Expr::IIf(Box::new(cond), Box::new(a), Box::new(b)), span);
        }
        cond
    }

    fn parse_or(&mut self) -> Node {
        let mut lhs = self.parse_and();
        loop {
            self.skip_inline();
            if self.eat_word("or") {
                self.skip_inline();
                let rhs = self.parse_and();
                let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
                lhs = Node::spanned(Expr::Binop(BinOp::Or, Box::new(lhs), Box::new(rhs)), span);
            } else {
                break;
            }
        }
        lhs
    }

    fn parse_and(&mut self) -> Node {
        let mut lhs = self.parse_relational();
        loop {
            self.skip_inline();
            if self.eat_word("and") {
                self.skip_inline();
                let rhs = self.parse_relational();
                let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
                lhs = Node::spanned(Expr::Binop(BinOp::And, Box::new(lhs), Box::new(rhs)), span);
            } else {
                break;
            }
        }
        lhs
    }

    /// Non-associative chain: `a < b < c` becomes `(a < b) and (b < c)`.
    fn parse_relational(&mut self) -> Node {
        let mut lhs = self.parse_additive();
        let mut chain: Option<Node> = None;
        loop {
            self.skip_inline();
            let Some(op) = self.peek_relop() else { break };
            self.pos += op_len(&op);
            self.skip_inline();
            let rhs = self.parse_additive();
            let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
            let link = Node::spanned(Expr::Binop(op, Box::new(lhs.clone()), Box::new(rhs.clone())), span);
            chain = Some(match chain {
                None => link,
                Some(prev) => Node::spanned(Expr::Binop(BinOp::And, Box::new(prev), Box::new(link)), span),
            });
            lhs = rhs;
        }
        chain.unwrap_or(lhs)
    }

    fn peek_relop(&self) -> Option<BinOp> {
        for (text, op) in [
            ("==", BinOp::Eq),
            ("!=", BinOp::Ne),
            ("<=", BinOp::Le),
            (">=", BinOp::Ge),
            ("<", BinOp::Lt),
            (">", BinOp::Gt),
        ] {
            if self.starts_with(text) {
                return Some(op);
            }
        }
        None
    }

    fn parse_additive(&mut self) -> Node {
        let mut lhs = self.parse_multiplicative();
        loop {
            self.skip_inline();
            let op = if self.starts_with("++") {
                Some((BinOp::Concat, 2))
            } else if self.starts_with("+") {
                Some((BinOp::Add, 1))
            } else if self.starts_with("-") && !self.starts_with("->") {
                Some((BinOp::Sub, 1))
            } else {
                None
            };
            let Some((op, len)) = op else { break };
            self.pos += len;
            self.skip_inline();
            let rhs = self.parse_multiplicative();
            let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
            lhs = Node::spanned(Expr::Binop(op, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Node {
        let mut lhs = self.parse_prefix();
        loop {
            self.skip_inline();
            let op = if self.starts_with("//") {
                Some((BinOp::FloorDiv, 2))
            } else if self.starts_with("*") {
                Some((BinOp::Mul, 1))
            } else if self.starts_with("/") {
                Some((BinOp::Div, 1))
            } else if self.starts_with("%") {
                Some((BinOp::Mod, 1))
            } else {
                None
            };
            let Some((op, len)) = op else { break };
            self.pos += len;
            self.skip_inline();
            let rhs = self.parse_prefix();
            let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
            lhs = Node::spanned(Expr::Binop(op, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_prefix(&mut self) -> Node {
        self.skip_inline();
        let start = self.pos;
        if self.eat_word("not") {
            self.skip_inline();
            let operand = self.parse_prefix();
            let span = self.span(start);
            return Node::spanned(Expr::Unop(UnOp::Not, Box::new(operand)), span);
        }
        if self.starts_with("-") {
            self.pos += 1;
            self.skip_inline();
            let operand = self.parse_prefix();
            let span = self.span(start);
            return Node::spanned(Expr::Unop(UnOp::Neg, Box::new(operand)), span);
        }
        self.parse_pow()
    }

    fn parse_pow(&mut self) -> Node {
        let lhs = self.parse_suffix();
        self.skip_inline();
        if self.starts_with("^") {
            self.pos += 1;
            self.skip_inline();
            let rhs = self.parse_prefix(); // right-assoc, binds through prefix
            let span = Span::new(lhs.span.map_or(0, |s| s.start), self.pos as u32);
            return Node::spanned(Expr::Binop(BinOp::Pow, Box::new(lhs), Box::new(rhs)), span);
        }
        lhs
    }

    fn parse_suffix(&mut self) -> Node {
        let mut node = self.parse_fn_or_atom();
        loop {
            self.skip_inline();
            let start = node.span.map_or(0, |s| s.start);
            if self.eat(".") {
                self.skip_inline();
                match self.parse_identifier_text() {
                    Some((name, _)) => {
                        let span = self.span(start as usize);
                        node = Node::spanned(Expr::Dot(Box::new(node), name), span);
                    }
                    None => {
                        self.error(ErrorTag::DotName, self.span(self.pos));
                    }
                }
            } else if self.eat("[") {
                self.skip_inline();
                let index = self.parse_expr();
                self.skip_inline();
                if !self.eat("]") {
                    self.error(ErrorTag::CloseSquare, self.span(self.pos));
                }
                let span = self.span(start as usize);
                node = Node::spanned(Expr::Index(Box::new(node), Box::new(index)), span);
            } else if self.eat("(") {
                let args = self.parse_call_args();
                let span = self.span(start as usize);
                node = Node::spanned(Expr::Call(Box::new(node), args), span);
            } else {
                break;
            }
        }
        node
    }

    fn parse_call_args(&mut self) -> Vec<Node> {
        let mut args = Vec::new();
        self.skip_inline();
        if self.eat(")") {
            return args;
        }
        loop {
            self.skip_inline();
            args.push(self.parse_expr());
            self.skip_inline();
            if self.eat(",") {
                continue;
            }
            break;
        }
        self.skip_inline();
        if !self.eat(")") {
            self.error(ErrorTag::CloseParen, self.span(self.pos));
        }
        args
    }

    fn parse_fn_or_atom(&mut self) -> Node {
        let start = self.pos;
        if let Some(params) = self.try_parse_fn_params() {
            self.skip_inline();
            if self.eat("->") {
                self.skip_inline();
                let body = self.parse_expr();
                let span = self.span(start);
                return Node::spanned(Expr::Fn(params, Box::new(body)), span);
            }
            // Not actually a function header; re-parse from `start` as a normal atom.
            self.pos = start;
        }
        self.parse_atom()
    }

    /// Speculatively parses `name` or `(name, name, ...)` followed by `->`; restores
    /// position and returns `None` if no arrow follows.
    fn try_parse_fn_params(&mut self) -> Option<Vec<Rc<str>>> {
        let save = self.pos;
        let mut params = Vec::new();
        if self.eat("(") {
            self.skip_inline();
            if !self.eat(")") {
                loop {
                    self.skip_inline();
                    match self.parse_identifier_text() {
                        Some((name, _)) if !KEYWORDS.contains(&&*name) => params.push(name),
                        _ => {
                            self.pos = save;
                            return None;
                        }
                    }
                    self.skip_inline();
                    if self.eat(",") {
                        continue;
                    }
                    break;
                }
                self.skip_inline();
                if !self.eat(")") {
                    self.pos = save;
                    return None;
                }
            }
        } else {
            match self.parse_identifier_text() {
                Some((name, _)) if !KEYWORDS.contains(&&*name) => params.push(name),
                _ => {
                    self.pos = save;
                    return None;
                }
            }
        }
        self.skip_inline();
        if self.starts_with("->") { Some(params) } else {
            self.pos = save;
            None
        }
    }

    fn parse_atom(&mut self) -> Node {
        self.skip_inline();
        let start = self.pos;
        match self.peek_char() {
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('.') if self.source[self.pos + 1..].starts_with(|c: char| c.is_ascii_digit()) => {
                self.parse_number()
            }
            Some('"') => self.parse_string(),
            Some('[') => self.parse_vector(),
            Some('{') => self.parse_map(),
            Some('(') => {
                self.advance_char();
                self.skip_inline();
                let inner = self.parse_expr();
                self.skip_inline();
                if !self.eat(")") {
                    self.error(ErrorTag::CloseParen, self.span(self.pos));
                }
                inner
            }
            _ if self.starts_with("match") && self.word_boundary_after("match") => self.parse_match(),
            _ => {
                if let Some((name, span)) = self.parse_identifier_text() {
                    Node::spanned(Expr::Name(name), span)
                } else if let Some(block) = self.nl_block() {
                    Node::spanned(Expr::Block(block.clone()), block.span.unwrap_or(self.span(start)))
                } else {
                    Node::missing()
                }
            }
        }
    }

    fn word_boundary_after(&self, kw: &str) -> bool {
        self.source[self.pos + kw.len()..].chars().next().is_none_or(|c| !is_ident_continue(c))
    }

    fn parse_vector(&mut self) -> Node {
        let start = self.pos;
        self.advance_char(); // [
        let mut elems = Vec::new();
        self.skip_inline();
        if !self.eat("]") {
            loop {
                self.skip_inline();
                elems.push(self.parse_expr());
                self.skip_inline();
                if self.eat(",") {
                    continue;
                }
                break;
            }
            self.skip_inline();
            if !self.eat("]") {
                self.error(ErrorTag::CloseSquare, self.span(self.pos));
            }
        }
        Node::spanned(Expr::Vector(elems), self.span(start))
    }

    fn parse_map(&mut self) -> Node {
        let start = self.pos;
        self.advance_char(); // {
        let mut entries = Vec::new();
        self.skip_inline();
        if !self.eat("}") {
            loop {
                self.skip_inline();
                let key = self.parse_identifier_text().map(|(n, _)| n).unwrap_or_else(|| "".into());
                self.skip_inline();
                self.eat(":");
                self.skip_inline();
                let value = self.parse_expr();
                entries.push(MapEntry { key, value });
                self.skip_inline();
                if self.eat(",") {
                    continue;
                }
                break;
            }
            self.skip_inline();
            if !self.eat("}") {
                self.error(ErrorTag::CloseCurly, self.span(self.pos));
            }
        }
        Node::spanned(Expr::Map(entries), self.span(start))
    }

    fn parse_match(&mut self) -> Node {
        let start = self.pos;
        self.pos += "match".len();
        self.skip_inline();
        let value = self.parse_expr();
        self.skip_inline();
        self.eat(":");
        let block = self.nl_block().unwrap_or(Block { stmts: Vec::new(), tail: Box::new(Node::missing()), span: None });
        let mut cases = Vec::new();
        for stmt in block.stmts {
            if let Stmt::Case { pattern, body } = stmt {
                let span = pattern.span.zip(body.span).map(|(p, b)| Span::new(p.start, b.end));
                cases.push(MatchCase { pattern, body, span });
            }
        }
        Node::spanned(Expr::Match(Box::new(value), cases), self.span(start))
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.starts_with(word) && self.word_boundary_after(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    // ---- statements & blocks ----

    fn parse_block_body(&mut self) -> Block {
        let start = self.pos;
        let mut stmts = Vec::new();
        let mut tail = Node::missing();
        loop {
            self.skip_inline();
            if self.nl_eol() {
                break;
            }
            let line_start = self.pos;
            let stmt = self.parse_line();
            self.skip_inline();
            let had_garbage = !self.nl_eol();
            if had_garbage {
                let bad_start = self.pos;
                self.skip_to_eol();
                self.error(ErrorTag::Garbage, self.span(bad_start.max(line_start)));
            }
            if self.nl_eol() && !self.peeks_more_lines() {
                if let Stmt::Expr(expr) = stmt {
                    tail = expr;
                } else {
                    stmts.push(stmt);
                }
                break;
            }
            stmts.push(stmt);
            if !self.eat("\n") {
                break;
            }
        }
        Block { stmts, tail: Box::new(tail), span: Some(self.span(start)) }
    }

    /// True if, after the current logical line, another line at `block_indent` follows.
    fn peeks_more_lines(&self) -> bool {
        let Some(nl) = self.source[self.pos..].find('\n') else { return false };
        let next_line_start = self.pos + nl + 1;
        next_line_start < self.source.len() && self.indent_at(next_line_start) == self.block_indent
    }

    fn parse_line(&mut self) -> Stmt {
        self.skip_inline();
        let start = self.pos;
        if self.eat_word("if") {
            self.skip_inline();
            let cond = self.parse_expr();
            self.skip_inline();
            self.eat(":");
            let then = self.nl_block_or_inline();
            return Stmt::If { cond, then };
        }
        if self.starts_with("loop") && self.word_boundary_after("loop") {
            self.pos += "loop".len();
            self.skip_inline();
            if self.eat_word("while") {
                self.skip_inline();
                let cond = self.parse_expr();
                self.skip_inline();
                self.eat(":");
                let block = self.nl_block().unwrap_or_else(|| self.missing_block());
                return Stmt::LoopWhile { cond, block };
            }
            self.eat(":");
            let block = self.nl_block().unwrap_or_else(|| self.missing_block());
            return Stmt::Loop { block };
        }
        if self.eat_word("while") {
            self.skip_inline();
            let cond = self.parse_expr();
            return Stmt::While { cond };
        }
        if self.eat_word("for") {
            self.skip_inline();
            let name = self.parse_identifier_text().map(|(n, _)| n).unwrap_or_else(|| "_".into());
            self.skip_inline();
            self.eat_word("in");
            self.skip_inline();
            let seq = self.parse_expr();
            self.skip_inline();
            self.eat(":");
            let body = self.nl_block_or_inline();
            return Stmt::For { name, seq, body };
        }
        if self.eat_word("assert") {
            self.skip_inline();
            let cond = self.parse_expr();
            return Stmt::Assert { cond };
        }
        // Action header: `params <- expr`
        if let Some(params) = self.try_parse_action_params() {
            self.skip_inline();
            self.pos += "<-".len();
            self.skip_inline();
            let act = self.parse_expr();
            return Stmt::Act { params, act };
        }
        let lhs = self.parse_expr();
        self.skip_inline();
        if self.eat("=>") {
            self.skip_inline();
            let body = self.parse_expr();
            return Stmt::Case { pattern: to_pattern(lhs), body };
        }
        if let Some(op) = self.peek_assign_op() {
            self.pos += op_text_len(&op);
            self.skip_inline();
            let value = self.parse_expr();
            return Stmt::Let { target: lhs, op, value };
        }
        let _ = start;
        Stmt::Expr(lhs)
    }

    fn missing_block(&mut self) -> Block {
        Block { stmts: Vec::new(), tail: Box::new(Node::missing()), span: None }
    }

    fn nl_block_or_inline(&mut self) -> Node {
        if let Some(block) = self.nl_block() {
            let span = block.span.unwrap_or_default();
            Node::spanned(Expr::Block(block), span)
        } else {
            self.parse_expr()
        }
    }

    fn try_parse_action_params(&mut self) -> Option<Vec<Rc<str>>> {
        let save = self.pos;
        let mut params = Vec::new();
        loop {
            self.skip_inline();
            match self.parse_identifier_text() {
                Some((name, _)) if !KEYWORDS.contains(&&*name) => params.push(name),
                _ => {
                    self.pos = save;
                    return None;
                }
            }
            self.skip_inline();
            if self.eat(",") {
                continue;
            }
            break;
        }
        self.skip_inline();
        if self.starts_with("<-") { Some(params) } else {
            self.pos = save;
            None
        }
    }

    fn peek_assign_op(&self) -> Option<AssignOp> {
        for (text, op) in [
            ("++=", AssignOp::Compound(BinOp::Concat)),
            ("+=", AssignOp::Compound(BinOp::Add)),
            ("-=", AssignOp::Compound(BinOp::Sub)),
            ("*=", AssignOp::Compound(BinOp::Mul)),
            ("/=", AssignOp::Compound(BinOp::Div)),
            (":=", AssignOp::Define),
            ("=", AssignOp::Set),
        ] {
            if self.starts_with(text) && !self.starts_with("==") {
                return Some(op);
            }
        }
        None
    }
}

/// A case arm's left-hand side is parsed with the ordinary expression grammar (so
/// `[2, x]` comes back as a plain `Vector`), then reinterpreted here as a pattern:
/// every `Vector` in pattern position (recursively, for nested destructuring) becomes
/// a `VecPattern`, which is what `crate::desugar`'s pattern compiler actually matches
/// against. Non-vector patterns (names, literals) need no reinterpretation.
fn to_pattern(node: Node) -> Node {
    match node.expr {
        Expr::Vector(elems) => {
            let elems = elems.into_iter().map(to_pattern).collect();
            Node { expr: Expr::VecPattern(elems), span: node.span }
        }
        _ => node,
    }
}

fn op_len(op: &BinOp) -> usize {
    op.to_string().len()
}

fn op_text_len(op: &AssignOp) -> usize {
    match op {
        AssignOp::Set => 1,
        AssignOp::Define => 2,
        AssignOp::Compound(BinOp::Concat) => 3,
        AssignOp::Compound(_) => 2,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scans a single logical line (no newlines) for a top-level `OP`/`=>`/`<-` that would
/// mark it as a statement header, skipping over bracketed sub-expressions so that e.g.
/// `f(x = 1)` is not mistaken for an assignment statement.
fn scan_for_statement_operator(line: &str) -> bool {
    let bytes = line.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'=' if depth == 0 => {
                let prev = bytes.get(i.wrapping_sub(1)).copied();
                let next = bytes.get(i + 1).copied();
                if next != Some(b'=') && prev != Some(b'!') && prev != Some(b'<') && prev != Some(b'>') {
                    return true;
                }
            }
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b'=') => return true,
            b'<' if depth == 0 && bytes.get(i + 1) == Some(&b'-') => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::parse_module;
    use crate::ast::{Expr, Stmt};

    #[test]
    fn parses_if_then_trailing_expr() {
        let (ast, oob) = parse_module("if a:\n  1\n2");
        assert!(oob.iter().all(|o| !matches!(o, crate::ast::Oob::Error { .. })));
        let Expr::Block(block) = ast.expr else { panic!("expected a block") };
        assert_eq!(block.stmts.len(), 1);
        assert!(matches!(&block.stmts[0], Stmt::If { .. }));
        assert!(matches!(block.tail.expr, Expr::Number(ref n) if &**n == "2"));
    }

    #[test]
    fn parses_simple_let_and_use() {
        let (ast, _oob) = parse_module("x = 1\nx");
        let Expr::Block(block) = ast.expr else { panic!("expected a block") };
        assert_eq!(block.stmts.len(), 1);
        assert!(matches!(&block.stmts[0], Stmt::Let { .. }));
        assert!(matches!(block.tail.expr, Expr::Name(ref n) if &**n == "x"));
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let (ast, _oob) = parse_module("1 + 2 * 3");
        let Expr::Block(block) = ast.expr else { panic!("expected a block") };
        let Expr::Binop(op, _, rhs) = &block.tail.expr else { panic!("expected a binop") };
        assert_eq!(op.to_string(), "+");
        assert!(matches!(&rhs.expr, Expr::Binop(op, ..) if op.to_string() == "*"));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_ast, oob) = parse_module("\"abc");
        assert!(oob.iter().any(|o| matches!(o, crate::ast::Oob::Error { tag, .. } if *tag == crate::ast::ErrorTag::StringEnd)));
    }
}
