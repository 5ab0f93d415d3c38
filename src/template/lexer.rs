//! Operator lexer: rewrites `{...}`-style operators as reserved elements.
//!
//! | Token            | Emitted markup                    |
//! |------------------|-----------------------------------|
//! | `{...}`          | `<ep-something/>`                 |
//! | `{...but}`       | `<ep-but>` … `</ep-but>`          |
//! | `{many}`         | `<ep-many>` … `</ep-many>`        |
//! | `{scope}`        | `<ep-scope>` … `</ep-scope>`      |
//! | `{$name}`        | `<ep-variable name="name">` …     |
//! | `{/body/}`       | `<ep-regex value="body"/>`        |
//! | `{either}`       | `<ep-either>` … `</ep-either>`    |
//! | `{or}`           | `<ep-or/>`                        |
//!
//! Anything else, including a `{` that starts no operator, is copied through.

use quick_xml::escape::escape;

use super::compiler::TemplateError;

pub const SOMETHING: &str = "ep-something";
pub const BUT: &str = "ep-but";
pub const MANY: &str = "ep-many";
pub const SCOPE: &str = "ep-scope";
pub const VARIABLE: &str = "ep-variable";
pub const REGEX: &str = "ep-regex";
pub const EITHER: &str = "ep-either";
pub const OR: &str = "ep-or";

/// Block operators that must be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    But,
    Many,
    Scope,
    Capture(String),
    Either,
}

impl Block {
    fn token(&self) -> String {
        match self {
            Block::But => "{...but}".to_string(),
            Block::Many => "{many}".to_string(),
            Block::Scope => "{scope}".to_string(),
            Block::Capture(name) => format!("{{${name}}}"),
            Block::Either => "{either}".to_string(),
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            Block::But => BUT,
            Block::Many => MANY,
            Block::Scope => SCOPE,
            Block::Capture(_) => VARIABLE,
            Block::Either => EITHER,
        }
    }
}

/// Keyword operators, opening and closing, paired with their blocks.
const KEYWORDS: [(&str, Option<Block>, bool); 9] = [
    ("{...}", None, false),
    ("{...but}", Some(Block::But), false),
    ("{/...but}", Some(Block::But), true),
    ("{many}", Some(Block::Many), false),
    ("{/many}", Some(Block::Many), true),
    ("{scope}", Some(Block::Scope), false),
    ("{/scope}", Some(Block::Scope), true),
    ("{either}", Some(Block::Either), false),
    ("{/either}", Some(Block::Either), true),
];

/// Translate template source into plain markup.
pub fn translate(source: &str) -> Result<String, TemplateError> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        out: String::with_capacity(source.len() + 64),
        open: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.out)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    out: String,
    /// Open blocks with the offset of their opening token.
    open: Vec<(Block, usize)>,
}

impl Lexer<'_> {
    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn run(&mut self) -> Result<(), TemplateError> {
        while let Some(brace) = self.rest().find('{') {
            self.out.push_str(&self.source[self.pos..self.pos + brace]);
            self.pos += brace;
            if !self.operator()? {
                self.out.push('{');
                self.pos += 1;
            }
        }
        self.out.push_str(&self.source[self.pos..]);
        self.pos = self.source.len();

        match self.open.pop() {
            Some((block, offset)) => Err(TemplateError::UnterminatedOperator {
                token: block.token(),
                offset,
            }),
            None => Ok(()),
        }
    }

    /// Consume one operator at the current `{`. Returns `false` when the
    /// brace starts no operator.
    fn operator(&mut self) -> Result<bool, TemplateError> {
        let offset = self.pos;

        if self.rest().starts_with("{or}") {
            if !matches!(self.open.last(), Some((Block::Either, _))) {
                return Err(TemplateError::OptionOutsideAlternative { offset });
            }
            self.out.push_str(&format!("<{OR}/>"));
            self.pos += "{or}".len();
            return Ok(true);
        }

        for (token, block, closing) in KEYWORDS.iter() {
            if !self.rest().starts_with(token) {
                continue;
            }
            self.pos += token.len();
            match (block, closing) {
                (None, _) => self.out.push_str(&format!("<{SOMETHING}/>")),
                (Some(block), false) => self.open_block(block.clone(), offset),
                (Some(block), true) => self.close_block(block, token, offset)?,
            }
            return Ok(true);
        }

        if let Some(name_start) = self.rest().strip_prefix("{$") {
            let name = capture_name(name_start);
            if name_start[name.len()..].starts_with('}') {
                validate_name(&name, offset)?;
                self.pos += 2 + name.len() + 1;
                self.open_block(Block::Capture(name), offset);
                return Ok(true);
            }
            return Ok(false);
        }

        if let Some(name_start) = self.rest().strip_prefix("{/$") {
            let name = capture_name(name_start);
            if name_start[name.len()..].starts_with('}') {
                let token = format!("{{/${name}}}");
                self.pos += token.len();
                self.close_block(&Block::Capture(name), &token, offset)?;
                return Ok(true);
            }
        }

        if self.rest().starts_with("{/") {
            self.regex(offset)?;
            return Ok(true);
        }

        Ok(false)
    }

    fn open_block(&mut self, block: Block, offset: usize) {
        match &block {
            Block::Capture(name) => {
                self.out
                    .push_str(&format!("<{VARIABLE} name=\"{}\">", escape(name.as_str())));
            }
            other => self.out.push_str(&format!("<{}>", other.tag())),
        }
        self.open.push((block, offset));
    }

    fn close_block(
        &mut self,
        block: &Block,
        token: &str,
        offset: usize,
    ) -> Result<(), TemplateError> {
        match self.open.last() {
            Some((open, _)) if open == block => {
                self.out.push_str(&format!("</{}>", block.tag()));
                self.open.pop();
                Ok(())
            }
            Some((open, _)) => Err(TemplateError::MismatchedClose {
                expected: open.token(),
                found: token.to_string(),
                offset,
            }),
            None => Err(TemplateError::UnexpectedClose {
                token: token.to_string(),
                offset,
            }),
        }
    }

    /// `{/body/}`: the body runs to the first `/}` not preceded by a
    /// backslash escape. It may span lines, but a line that starts with
    /// markup means the closing `/}` was forgotten.
    fn regex(&mut self, offset: usize) -> Result<(), TemplateError> {
        let source = self.source;
        let body_start = self.pos + 2;
        if source[body_start..].starts_with('}') {
            return Err(TemplateError::EmptyRegex { offset });
        }
        let mut body = String::new();
        let mut line_start = false;
        let mut chars = source[body_start..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\n' => line_start = true,
                '<' if line_start => return Err(TemplateError::UnterminatedRegex { offset }),
                c if c.is_whitespace() => {}
                _ => line_start = false,
            }
            match c {
                '\\' => match chars.next() {
                    Some((_, '/')) => body.push('/'),
                    Some((_, escaped)) => {
                        body.push('\\');
                        body.push(escaped);
                    }
                    None => break,
                },
                '/' if source[body_start + i + 1..].starts_with('}') => {
                    self.out
                        .push_str(&format!("<{REGEX} value=\"{}\"/>", escape(body.as_str())));
                    self.pos = body_start + i + 2;
                    return Ok(());
                }
                other => body.push(other),
            }
        }
        Err(TemplateError::UnterminatedRegex { offset })
    }
}

/// The longest prefix made of word characters.
fn capture_name(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Capture names follow `[a-z]\w*`.
fn validate_name(name: &str, offset: usize) -> Result<(), TemplateError> {
    match name.chars().next() {
        Some(first) if first.is_ascii_lowercase() => Ok(()),
        _ => Err(TemplateError::InvalidCaptureName {
            name: name.to_string(),
            offset,
        }),
    }
}
