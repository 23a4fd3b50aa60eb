use crate::names::NameTable;
use crate::token::{Token, TokenKind};

/// The scanner. Tokenizes a whole compilation unit up front; the parser
/// walks the resulting vector with one token of lookahead.
///
/// Lexical conventions: `$` comments to end of line, keywords are
/// reserved, names share one interning table so equal spellings get equal
/// keys, and a numeral that does not fit the value range becomes the
/// distinct `IntegerOutOfBounds` token rather than a truncated value.
pub struct Lexer<'a, 'n> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    names: &'n mut NameTable,
}

fn keyword(spelling: &str) -> Option<TokenKind> {
    match spelling {
        "boolean" => Some(TokenKind::Boolean),
        "channel" => Some(TokenKind::Channel),
        "constant" => Some(TokenKind::Constant),
        "else" => Some(TokenKind::Else),
        "false" => Some(TokenKind::False),
        "if" => Some(TokenKind::If),
        "integer" => Some(TokenKind::Integer),
        "open" => Some(TokenKind::Open),
        "parallel" => Some(TokenKind::Parallel),
        "randomize" => Some(TokenKind::Randomize),
        "read" => Some(TokenKind::Read),
        "receive" => Some(TokenKind::Receive),
        "reference" => Some(TokenKind::Reference),
        "send" => Some(TokenKind::Send),
        "true" => Some(TokenKind::True),
        "while" => Some(TokenKind::While),
        "write" => Some(TokenKind::Write),
        _ => None,
    }
}

impl<'a, 'n> Lexer<'a, 'n> {
    pub fn new(source: &'a str, names: &'n mut NameTable) -> Self {
        Lexer {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            names,
        }
    }

    /// Tokenize the whole input. The vector always ends with one
    /// `EndOfText` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::EndOfText;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
        }
        b
    }

    fn skip_blanks_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'$' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_blanks_and_comments();
        let line = self.line;
        let b = match self.peek() {
            None => return Token::plain(TokenKind::EndOfText, line),
            Some(b) => b,
        };

        if b.is_ascii_alphabetic() {
            return self.word(line);
        }
        if b.is_ascii_digit() {
            return self.numeral(line);
        }

        self.bump();
        let kind = match b {
            b'{' => TokenKind::Begin,
            b'}' => TokenKind::End,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::SemiColon,
            b'@' => TokenKind::Procedure,
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Multiply,
            b'/' => TokenKind::Divide,
            b'%' => TokenKind::Modulo,
            b'^' => TokenKind::Power,
            b'&' => TokenKind::And,
            b'|' => TokenKind::Or,
            b'=' => self.followed(b'=', TokenKind::Equal, TokenKind::Becomes),
            b'!' => self.followed(b'=', TokenKind::NotEqual, TokenKind::Not),
            b'<' => self.followed(b'=', TokenKind::LessOrEqual, TokenKind::Less),
            b'>' => self.followed(b'=', TokenKind::GreaterOrEqual, TokenKind::Greater),
            b'-' => self.followed(b'>', TokenKind::Through, TokenKind::Minus),
            _ => TokenKind::Unknown,
        };
        Token::plain(kind, line)
    }

    /// Two-character operator if the next byte matches, else the
    /// single-character reading.
    fn followed(&mut self, next: u8, matched: TokenKind, alone: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.bump();
            matched
        } else {
            alone
        }
    }

    fn word(&mut self, line: u32) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        // Identifier bytes are ASCII by construction.
        let spelling = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        match keyword(spelling) {
            Some(kind) => Token::plain(kind, line),
            None => Token::name(self.names.intern(spelling), line),
        }
    }

    fn numeral(&mut self, line: u32) -> Token {
        let mut value: i64 = 0;
        let mut out_of_bounds = false;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            self.bump();
            let digit = (b - b'0') as i64;
            value = match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(v) => v,
                None => {
                    out_of_bounds = true;
                    0
                }
            };
        }
        if out_of_bounds {
            Token::plain(TokenKind::IntegerOutOfBounds, line)
        } else {
            Token::numeral(value, line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenArg;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut names = NameTable::new();
        Lexer::new(source, &mut names)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_input_is_end_of_text() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfText]);
    }

    #[test]
    fn keywords_are_reserved() {
        assert_eq!(
            kinds("while read parallel"),
            vec![
                TokenKind::While,
                TokenKind::Read,
                TokenKind::Parallel,
                TokenKind::EndOfText
            ]
        );
    }

    #[test]
    fn two_character_operators() {
        assert_eq!(
            kinds("== != <= >= -> = ! < > -"),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::LessOrEqual,
                TokenKind::GreaterOrEqual,
                TokenKind::Through,
                TokenKind::Becomes,
                TokenKind::Not,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Minus,
                TokenKind::EndOfText
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("read $ everything here is ignored != }\nwrite"),
            vec![TokenKind::Read, TokenKind::Write, TokenKind::EndOfText]
        );
    }

    #[test]
    fn numeral_carries_value() {
        let mut names = NameTable::new();
        let tokens = Lexer::new("13597", &mut names).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Numeral);
        assert_eq!(tokens[0].arg, TokenArg::Int(13597));
    }

    #[test]
    fn oversized_numeral_is_out_of_bounds() {
        assert_eq!(
            kinds("99999999999999999999999999"),
            vec![TokenKind::IntegerOutOfBounds, TokenKind::EndOfText]
        );
    }

    #[test]
    fn same_name_gets_same_key() {
        let mut names = NameTable::new();
        let tokens = Lexer::new("total n total", &mut names).tokenize();
        assert_eq!(tokens[0].arg, tokens[2].arg);
        assert_ne!(tokens[0].arg, tokens[1].arg);
    }

    #[test]
    fn lines_are_tracked() {
        let mut names = NameTable::new();
        let tokens = Lexer::new("read\n\nwrite x", &mut names).tokenize();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn stray_character_is_unknown() {
        assert_eq!(kinds("#"), vec![TokenKind::Unknown, TokenKind::EndOfText]);
    }
}
