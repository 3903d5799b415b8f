use logos::Logos;

/// Helper function to unescape string literals
fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('b') => result.push('\x08'),
                Some('0') => result.push('\0'),
                Some('e') => result.push('\x1B'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('\\') => result.push('\\'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn strip_quotes(slice: &str) -> &str {
    &slice[1..slice.len() - 1]
}

fn parse_suffixed<T: std::str::FromStr>(slice: &str, suffix_len: usize) -> Option<T> {
    slice[..slice.len() - suffix_len].parse().ok()
}

/// Token types for the Adept programming language.
///
/// Newlines terminate statements, so unlike most whitespace they are
/// surfaced as tokens.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Token {
    // Keywords
    #[token("func")]
    Func,
    #[token("foreign")]
    Foreign,
    #[token("struct")]
    Struct,
    #[token("class")]
    Class,
    #[token("union")]
    Union,
    #[token("enum")]
    Enum,
    #[token("alias")]
    Alias,
    #[token("extends")]
    Extends,
    #[token("implicit")]
    Implicit,
    #[token("virtual")]
    Virtual,
    #[token("override")]
    Override,
    #[token("if")]
    If,
    #[token("unless")]
    Unless,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("repeat")]
    Repeat,
    #[token("each")]
    Each,
    #[token("in")]
    In,
    #[token("for")]
    For,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("exhaustive")]
    Exhaustive,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("fallthrough")]
    Fallthrough,
    #[token("return")]
    Return,
    #[token("new")]
    New,
    #[token("delete")]
    Delete,
    #[token("defer")]
    Defer,
    #[token("sizeof")]
    Sizeof,
    #[token("alignof")]
    Alignof,
    #[token("typeinfo")]
    Typeinfo,
    #[token("typenameof")]
    Typenameof,
    #[token("cast")]
    Cast,
    #[token("as")]
    As,
    #[token("at")]
    At,
    #[token("va_arg")]
    VaArg,
    #[token("va_start")]
    VaStart,
    #[token("va_end")]
    VaEnd,
    #[token("va_copy")]
    VaCopy,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("embed")]
    Embed,
    #[token("pragma")]
    Pragma,
    #[token("import")]
    Import,
    #[token("namespace")]
    Namespace,
    #[token("public")]
    Public,
    #[token("private")]
    Private,
    #[token("static")]
    Static,
    #[token("const")]
    Const,
    #[token("external")]
    External,
    #[token("stdcall")]
    Stdcall,
    #[token("verbatim")]
    Verbatim,
    #[token("packed")]
    Packed,
    #[token("POD")]
    Pod,
    #[token("undef")]
    Undef,
    #[token("out")]
    Out,
    #[token("inout")]
    Inout,

    // Compound assignment operators (before their single-char prefixes)
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubtractAssign,
    #[token("*=")]
    MultiplyAssign,
    #[token("/=")]
    DivideAssign,
    #[token("%=")]
    ModulusAssign,
    #[token("&=")]
    BitAndAssign,
    #[token("|=")]
    BitOrAssign,
    #[token("^=")]
    BitXorAssign,
    #[token("<<=")]
    BitLshiftAssign,
    #[token(">>=")]
    BitRshiftAssign,
    #[token("<<<=")]
    BitLgcLshiftAssign,
    #[token(">>>=")]
    BitLgcRshiftAssign,

    // Operators
    #[token("==")]
    Equals,
    #[token("!=")]
    NotEquals,
    #[token("<=")]
    LessThanOrEqual,
    #[token(">=")]
    GreaterThanOrEqual,
    #[token("<<<")]
    BitLgcLshift,
    #[token(">>>")]
    BitLgcRshift,
    #[token("<<")]
    BitLshift,
    #[token(">>")]
    BitRshift,
    #[token("<")]
    LessThan,
    #[token(">")]
    GreaterThan,
    #[token("&&")]
    UberAnd,
    #[token("||")]
    UberOr,
    #[token("!")]
    Not,
    #[token("&")]
    BitAnd,
    #[token("|")]
    BitOr,
    #[token("^")]
    BitXor,
    #[token("~")]
    BitComplement,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("+")]
    Add,
    #[token("-")]
    Subtract,
    #[token("*")]
    Multiply,
    #[token("/")]
    Divide,
    #[token("%")]
    Modulus,
    #[token("=")]
    Assign,
    #[token("?")]
    Ternary,

    // Delimiters
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    BeginBlock,
    #[token("}")]
    EndBlock,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(",")]
    Comma,
    #[token("...")]
    Ellipsis,
    #[token("..")]
    Range,
    #[token(".")]
    Member,
    #[token("::")]
    AssociatedMember,
    #[token(":")]
    Colon,
    #[token(";")]
    Terminate,
    #[token("$#", priority = 3)]
    PolycountPrefix,
    #[token("$")]
    PolymorphPrefix,
    #[token("#")]
    Meta,

    // Statements end at newlines
    #[token("\n")]
    Newline,

    // Literals. Suffix order matters: the two-character suffixes must
    // be tried before plain decimal digits.
    #[regex(r"[0-9]+sb", |lex| parse_suffixed::<i8>(lex.slice(), 2))]
    ByteLiteral(i8),
    #[regex(r"[0-9]+ub", |lex| parse_suffixed::<u8>(lex.slice(), 2))]
    UbyteLiteral(u8),
    #[regex(r"[0-9]+ss", |lex| parse_suffixed::<i16>(lex.slice(), 2))]
    ShortLiteral(i16),
    #[regex(r"[0-9]+us", |lex| parse_suffixed::<u16>(lex.slice(), 2))]
    UshortLiteral(u16),
    #[regex(r"[0-9]+si", |lex| parse_suffixed::<i32>(lex.slice(), 2))]
    IntLiteral(i32),
    #[regex(r"[0-9]+ui", |lex| parse_suffixed::<u32>(lex.slice(), 2))]
    UintLiteral(u32),
    #[regex(r"[0-9]+sl", |lex| parse_suffixed::<i64>(lex.slice(), 2))]
    LongLiteral(i64),
    #[regex(r"[0-9]+ul", |lex| parse_suffixed::<u64>(lex.slice(), 2))]
    UlongLiteral(u64),
    #[regex(r"[0-9]+uz", |lex| parse_suffixed::<u64>(lex.slice(), 2))]
    UsizeLiteral(u64),
    #[regex(r"[0-9]+\.[0-9]+f", |lex| parse_suffixed::<f32>(lex.slice(), 1))]
    FloatLiteral(f32),
    #[regex(r"[0-9]+\.[0-9]+d", |lex| parse_suffixed::<f64>(lex.slice(), 1))]
    DoubleLiteral(f64),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse().ok())]
    GenericFloat(f64),
    #[regex(r"0x[0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    GenericInt(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape_string(strip_quotes(lex.slice())))]
    String(String),
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape_string(strip_quotes(lex.slice())))]
    CString(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 2)]
    Identifier(String),
}

/// A lexed token along with its byte range in the source buffer
pub type SpannedToken = (Token, std::ops::Range<usize>);

/// Lexing failure with the byte offset of the offending character
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized token at byte {offset}")]
pub struct LexError {
    pub offset: usize,
}

/// Tokenize an entire source buffer.
///
/// The result always ends with a trailing [`Token::Newline`], which
/// parsers rely on as the statement terminator for the final line.
pub fn lex(source: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut tokens = Vec::new();

    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(LexError { offset: span.start }),
        }
    }

    if !matches!(tokens.last(), Some((Token::Newline, _))) {
        let end = source.len();
        tokens.push((Token::Newline, end..end));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source)
            .expect("lexing failed")
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("func main void"),
            vec![
                Token::Func,
                Token::Identifier("main".into()),
                Token::Identifier("void".into()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_suffixed_integer_literals() {
        assert_eq!(
            kinds("8sb 8ub 8ss 8us 8si 8ui 8sl 8ul 8uz"),
            vec![
                Token::ByteLiteral(8),
                Token::UbyteLiteral(8),
                Token::ShortLiteral(8),
                Token::UshortLiteral(8),
                Token::IntLiteral(8),
                Token::UintLiteral(8),
                Token::LongLiteral(8),
                Token::UlongLiteral(8),
                Token::UsizeLiteral(8),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(
            kinds("3.5f 3.5d 3.5"),
            vec![
                Token::FloatLiteral(3.5),
                Token::DoubleLiteral(3.5),
                Token::GenericFloat(3.5),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_generic_int_is_unsuffixed() {
        assert_eq!(kinds("42"), vec![Token::GenericInt(42), Token::Newline]);
        assert_eq!(kinds("0xFF"), vec![Token::GenericInt(255), Token::Newline]);
    }

    #[test]
    fn test_string_unescaping() {
        assert_eq!(
            kinds(r#""line\none""#),
            vec![Token::String("line\none".into()), Token::Newline]
        );
        assert_eq!(
            kinds(r"'c\0'"),
            vec![Token::CString("c\0".into()), Token::Newline]
        );
    }

    #[test]
    fn test_polymorph_prefixes() {
        assert_eq!(
            kinds("$T $#N"),
            vec![
                Token::PolymorphPrefix,
                Token::Identifier("T".into()),
                Token::PolycountPrefix,
                Token::Identifier("N".into()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_newlines_are_tokens() {
        assert_eq!(
            kinds("break\ncontinue"),
            vec![
                Token::Break,
                Token::Newline,
                Token::Continue,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("return // trailing comment\n/* block */ null"),
            vec![Token::Return, Token::Newline, Token::Null, Token::Newline]
        );
    }

    #[test]
    fn test_operator_maximal_munch() {
        assert_eq!(
            kinds("<<= << <"),
            vec![
                Token::BitLshiftAssign,
                Token::BitLshift,
                Token::LessThan,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_lex_error_offset() {
        let error = lex("ok \u{1F980}").expect_err("expected failure");
        assert_eq!(error.offset, 3);
    }
}
