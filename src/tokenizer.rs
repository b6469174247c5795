#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Integer(i64),
    Float(f64),
    Str(String),
    AssetPath(String),
    PrimPath(String),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Equals,
    Comma,
    Colon,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

pub struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn bump(&mut self) -> u8 {
        let c = self.bytes[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_comment(&mut self) {
        // '#' to end of line
        match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
            Some(rel) => {
                self.pos += rel + 1;
                self.line += 1;
                self.column = 1;
            }
            None => {
                self.column += (self.bytes.len() - self.pos) as u32;
                self.pos = self.bytes.len();
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }

        loop {
            let Some(c) = self.peek() else {
                self.finished = true;
                return Some(Token {
                    kind: TokenKind::Eof,
                    line: self.line,
                    column: self.column,
                });
            };

            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                    continue;
                }
                b'#' => {
                    self.skip_comment();
                    continue;
                }
                _ => {}
            }

            let line = self.line;
            let column = self.column;

            let kind = match c {
                b'(' => self.punct(TokenKind::LeftParen),
                b')' => self.punct(TokenKind::RightParen),
                b'[' => self.punct(TokenKind::LeftBracket),
                b']' => self.punct(TokenKind::RightBracket),
                b'{' => self.punct(TokenKind::LeftBrace),
                b'}' => self.punct(TokenKind::RightBrace),
                b'=' => self.punct(TokenKind::Equals),
                b',' => self.punct(TokenKind::Comma),
                b':' => self.punct(TokenKind::Colon),
                b'"' => self.scan_string(),
                b'@' => self.scan_asset_path(),
                b'<' => self.scan_prim_path(),
                b'.' => {
                    if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        self.scan_number()
                    } else {
                        self.punct(TokenKind::Dot)
                    }
                }
                b'-' | b'+' => {
                    let next = self.peek_at(1);
                    if next.is_some_and(|d| d.is_ascii_digit() || d == b'.') {
                        self.scan_number()
                    } else {
                        // stray sign, drop it
                        self.bump();
                        continue;
                    }
                }
                c if c.is_ascii_digit() => self.scan_number(),
                c if c.is_ascii_alphabetic() || c == b'_' => self.scan_identifier(),
                _ => {
                    // unknown byte, advance without yielding
                    self.bump();
                    continue;
                }
            };

            return Some(Token { kind, line, column });
        }
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.bump();
        }
        let text = str::from_utf8(&self.bytes[start..self.pos])
            .unwrap_or_default()
            .to_string();
        TokenKind::Identifier(text)
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        let mut is_float = false;

        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut ahead = 1;
            if matches!(self.peek_at(1), Some(b'-') | Some(b'+')) {
                ahead = 2;
            }
            if self.peek_at(ahead).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                for _ in 0..=ahead {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text = str::from_utf8(&self.bytes[start..self.pos]).unwrap_or_default();
        if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::Integer(v),
                Err(_) => TokenKind::Float(text.parse().unwrap_or(0.0)),
            }
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.bump(); // opening quote
        if self.peek() == Some(b'"') && self.peek_at(1) == Some(b'"') {
            self.bump();
            self.bump();
            return self.scan_triple_string();
        }
        let mut out: Vec<u8> = Vec::new();
        loop {
            let Some(c) = self.peek() else { break };
            self.bump();
            match c {
                b'"' => break,
                b'\\' => {
                    let Some(esc) = self.peek() else { break };
                    self.bump();
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
        TokenKind::Str(String::from_utf8_lossy(&out).into_owned())
    }

    // triple-quoted block, no escape processing, newlines kept
    fn scan_triple_string(&mut self) -> TokenKind {
        let start = self.pos;
        let mut end = self.pos;
        loop {
            let Some(c) = self.peek() else {
                end = self.pos;
                break;
            };
            if c == b'"' && self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') {
                end = self.pos;
                self.bump();
                self.bump();
                self.bump();
                break;
            }
            self.bump();
        }
        TokenKind::Str(String::from_utf8_lossy(&self.bytes[start..end]).into_owned())
    }

    fn scan_asset_path(&mut self) -> TokenKind {
        self.bump(); // opening '@'
        let start = self.pos;
        while self.peek().is_some_and(|c| c != b'@') {
            self.bump();
        }
        let text = str::from_utf8(&self.bytes[start..self.pos])
            .unwrap_or_default()
            .to_string();
        if self.peek() == Some(b'@') {
            self.bump();
        }
        TokenKind::AssetPath(text)
    }

    fn scan_prim_path(&mut self) -> TokenKind {
        self.bump(); // opening '<'
        let start = self.pos;
        while self.peek().is_some_and(|c| c != b'>') {
            self.bump();
        }
        let text = str::from_utf8(&self.bytes[start..self.pos])
            .unwrap_or_default()
            .to_string();
        if self.peek() == Some(b'>') {
            self.bump();
        }
        TokenKind::PrimPath(text)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

pub fn tokenize(text: &str) -> Vec<Token> {
    Tokenizer::new(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_stream() {
        let toks = kinds("def Mesh \"m\" { }");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("def".into()),
                TokenKind::Identifier("Mesh".into()),
                TokenKind::Str("m".into()),
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_dropped() {
        let toks = kinds("#usda 1.0\n# full line\ndef # trailing\n");
        assert_eq!(
            toks,
            vec![TokenKind::Identifier("def".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        let toks = kinds("1 -2 3.5 -0.25 1e3 2.5e-2 .5");
        assert_eq!(
            toks,
            vec![
                TokenKind::Integer(1),
                TokenKind::Integer(-2),
                TokenKind::Float(3.5),
                TokenKind::Float(-0.25),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.025),
                TokenKind::Float(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let toks = kinds(r#""a\nb\t\"c\\""#);
        assert_eq!(
            toks,
            vec![TokenKind::Str("a\nb\t\"c\\".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_triple_quoted_string() {
        let toks = kinds("\"\"\"line one\nline two\"\"\" def");
        assert_eq!(
            toks,
            vec![
                TokenKind::Str("line one\nline two".into()),
                TokenKind::Identifier("def".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_asset_and_prim_paths() {
        let toks = kinds("@./props/crate.usda@</Root/Crate>");
        assert_eq!(
            toks,
            vec![
                TokenKind::AssetPath("./props/crate.usda".into()),
                TokenKind::PrimPath("/Root/Crate".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let toks = tokenize("def\n  over");
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (2, 3));
    }

    #[test]
    fn test_unknown_bytes_skipped() {
        let toks = kinds("a ; b ! c");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Identifier("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_exactly_one_eof() {
        let mut tk = Tokenizer::new("");
        assert_eq!(tk.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(tk.next(), None);
    }
}
