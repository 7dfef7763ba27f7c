//! Regex outline for the block-structured model language
//!
//! Recognises `import "spec" [as Alias]` statements and `Kind Name { ... }`
//! declarations. Declarations nested directly inside other declarations are
//! exported as `Outer.Inner`. Strings and comments never contribute.

use regex::Regex;
use tether_core::{Document, DocumentId, DocumentState, ExportedSymbol, ImportStatement};

use crate::extractor::{ExtractError, OutlineExtractor};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Str(&'a str),
    Open,
    Close,
    Other,
}

pub struct RegexOutline {
    lexer: Regex,
}

impl RegexOutline {
    pub fn new() -> Result<Self, regex::Error> {
        let lexer = Regex::new(
            r#"(?x)
            (?P<comment>//[^\n]*|\#[^\n]*|/\*(?s:.*?)\*/)
            | "(?P<str>(?:[^"\\\n]|\\.)*)"
            | (?P<ident>[A-Za-z_][A-Za-z0-9_]*)
            | (?P<open>\{)
            | (?P<close>\})
            | (?P<other>\S)
            "#,
        )?;
        Ok(RegexOutline { lexer })
    }

    fn tokens<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        self.lexer
            .captures_iter(text)
            .filter_map(|caps| {
                if caps.name("comment").is_some() {
                    None
                } else if let Some(m) = caps.name("str") {
                    Some(Token::Str(m.as_str()))
                } else if let Some(m) = caps.name("ident") {
                    Some(Token::Ident(m.as_str()))
                } else if caps.name("open").is_some() {
                    Some(Token::Open)
                } else if caps.name("close").is_some() {
                    Some(Token::Close)
                } else {
                    Some(Token::Other)
                }
            })
            .collect()
    }

    /// Outline `text` into a parsed document.
    pub fn outline(&self, id: &DocumentId, text: &str) -> Document {
        let tokens = self.tokens(text);
        let mut doc = Document::new(id.clone()).with_state(DocumentState::Parsed);
        // One entry per open brace: the declaration name it opened, if any.
        let mut scopes: Vec<Option<String>> = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            match (&tokens[i], tokens.get(i + 1), tokens.get(i + 2)) {
                (Token::Ident("import"), Some(Token::Str(spec)), _) => {
                    let statement = match (tokens.get(i + 2), tokens.get(i + 3)) {
                        (Some(Token::Ident("as")), Some(Token::Ident(alias))) => {
                            i += 4;
                            ImportStatement::aliased(*spec, *alias)
                        }
                        _ => {
                            i += 2;
                            ImportStatement::new(*spec)
                        }
                    };
                    doc.imports.push(statement);
                }
                (Token::Ident(kind), Some(Token::Ident(name)), Some(Token::Open))
                    if kind.starts_with(|c: char| c.is_ascii_uppercase()) =>
                {
                    let exported = scopes.iter().all(Option::is_some);
                    if exported {
                        let mut qualified: Vec<&str> =
                            scopes.iter().flatten().map(String::as_str).collect();
                        qualified.push(*name);
                        doc.exports
                            .push(ExportedSymbol::new(*kind, qualified.join(".")));
                    }
                    scopes.push(exported.then(|| name.to_string()));
                    i += 3;
                }
                (Token::Open, _, _) => {
                    scopes.push(None);
                    i += 1;
                }
                (Token::Close, _, _) => {
                    scopes.pop();
                    i += 1;
                }
                _ => i += 1,
            }
        }

        doc
    }
}

impl OutlineExtractor for RegexOutline {
    fn extract(&self, id: &DocumentId, content: &[u8]) -> Result<Document, ExtractError> {
        let text = std::str::from_utf8(content).map_err(|source| ExtractError::NotUtf8 {
            id: id.clone(),
            source,
        })?;
        Ok(self.outline(id, text))
    }
}
