//! Template front end: operator lexing and pattern tree compilation.
//!
//! A template is ordinary markup with operators written in braces:
//!
//! | Operator                  | Meaning                                         |
//! |---------------------------|-------------------------------------------------|
//! | `{...}`                   | Any run of siblings                             |
//! | `{...but}X{/...but}`      | Any run of siblings, none of which matches `X`  |
//! | `{many}X{/many}`          | `X` one or more times                           |
//! | `{scope}X{/scope}`        | `X` with its captures in a fresh frame          |
//! | `{$name}X{/$name}`        | Bind the text matched by `X` to `name`          |
//! | `{/regex/}`               | A run of text and `<br>`s searched by `regex`   |
//! | `{either}X{or}Y{/either}` | `X`, or else `Y`                                |

pub mod ast;
pub mod compiler;
pub mod lexer;

pub use ast::{Kind, PatternNode};
pub use compiler::{TemplateError, compile, compile_document};
