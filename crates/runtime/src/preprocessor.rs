//! Preprocessor core (§4.K), grounded in
//! `examples/original_source/src/frontend/preprocessor/{preprocessor,macro_expander,directive_parser,token_preprocessor}.cpp`:
//! a two-phase model — line-oriented directive scanning, then
//! token-by-token macro expansion with a recursion depth cap.

use cb_core::error::{CbError, CbResult};
use std::collections::HashMap;

const MAX_EXPANSION_DEPTH: u32 = 100;

#[derive(Debug, Clone)]
enum MacroDef {
    Object(String),
    Function(Vec<String>, String),
}

struct CondFrame {
    condition_met: bool,
    any_branch_taken: bool,
}

pub struct Preprocessor {
    macros: HashMap<String, MacroDef>,
    file_name: String,
    build_date: String,
    build_time: String,
    version: String,
}

impl Preprocessor {
    pub fn new(file_name: impl Into<String>) -> Self {
        Preprocessor {
            macros: HashMap::new(),
            file_name: file_name.into(),
            build_date: "unknown".to_string(),
            build_time: "unknown".to_string(),
            version: "cb 0.1.0".to_string(),
        }
    }

    /// Overrides the `__DATE__`/`__TIME__`/`__VERSION__` builtins; the CLI
    /// host wires these to the real build stamp, tests leave them at their
    /// `"unknown"` defaults.
    pub fn with_build_info(
        mut self,
        date: impl Into<String>,
        time: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.build_date = date.into();
        self.build_time = time.into();
        self.version = version.into();
        self
    }

    pub fn define_object(&mut self, name: &str, body: &str) {
        self.macros.insert(name.to_string(), MacroDef::Object(body.trim().to_string()));
    }

    pub fn define_function(&mut self, name: &str, params: Vec<String>, body: &str) -> CbResult<()> {
        if body.contains("##") || has_stringify(body, &params) {
            return Err(CbError::declaration(
                "'#' stringify and '##' concat are reserved and not supported",
            ));
        }
        self.macros
            .insert(name.to_string(), MacroDef::Function(params, body.trim().to_string()));
        Ok(())
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Full preprocessing pass: directive scanning, then expansion.
    pub fn process(&mut self, source: &str) -> CbResult<String> {
        let scanned = self.scan_directives(source)?;
        self.expand(&scanned, 0)
    }

    fn scan_directives(&mut self, source: &str) -> CbResult<String> {
        let mut out = String::new();
        let mut stack: Vec<CondFrame> = Vec::new();

        for (line_no, raw_line) in source.lines().enumerate() {
            let active = stack.iter().all(|f| f.condition_met);
            let trimmed = raw_line.trim_start();
            if let Some(directive) = trimmed.strip_prefix('#') {
                let directive = directive.trim_start();
                self.handle_directive(directive, active, &mut stack)?;
                continue;
            }
            if active {
                out.push_str(&self.substitute_builtins(raw_line, line_no + 1));
                out.push('\n');
            }
        }

        if !stack.is_empty() {
            return Err(CbError::declaration("unterminated #if/#ifdef block (missing #endif)"));
        }
        Ok(out)
    }

    /// Substitutes the built-in object-like macros the spec names
    /// (`__DATE__`, `__TIME__`, `__FILE__`, `__LINE__`, `__VERSION__`)
    /// before user macro expansion, since they depend on scan position
    /// (the line number) rather than a fixed `#define`d body.
    fn substitute_builtins(&self, line: &str, line_no: usize) -> String {
        let line = replace_word(line, "__LINE__", &line_no.to_string());
        let line = replace_word(&line, "__FILE__", &format!("\"{}\"", self.file_name));
        let line = replace_word(&line, "__DATE__", &format!("\"{}\"", self.build_date));
        let line = replace_word(&line, "__TIME__", &format!("\"{}\"", self.build_time));
        replace_word(&line, "__VERSION__", &format!("\"{}\"", self.version))
    }

    fn handle_directive(&mut self, directive: &str, active: bool, stack: &mut Vec<CondFrame>) -> CbResult<()> {
        let (keyword, rest) = split_first_word(directive);
        match keyword {
            "define" if active => self.handle_define(rest)?,
            "undef" if active => {
                let (name, _) = split_first_word(rest);
                self.undef(name);
            }
            "ifdef" => {
                let (name, _) = split_first_word(rest);
                stack.push(CondFrame {
                    condition_met: active && self.is_defined(name),
                    any_branch_taken: active && self.is_defined(name),
                });
            }
            "ifndef" => {
                let (name, _) = split_first_word(rest);
                stack.push(CondFrame {
                    condition_met: active && !self.is_defined(name),
                    any_branch_taken: active && !self.is_defined(name),
                });
            }
            "if" => {
                let met = active && evaluate_if_condition(rest, &self.macros);
                stack.push(CondFrame {
                    condition_met: met,
                    any_branch_taken: met,
                });
            }
            "elif" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| CbError::declaration("#elif without matching #if"))?;
                let parent_active = true; // enclosing activity already folded into any_branch_taken gating
                let met = parent_active && !frame.any_branch_taken && evaluate_if_condition(rest, &self.macros);
                frame.condition_met = met;
                if met {
                    frame.any_branch_taken = true;
                }
            }
            "else" => {
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| CbError::declaration("#else without matching #if"))?;
                frame.condition_met = !frame.any_branch_taken;
                frame.any_branch_taken = true;
            }
            "endif" => {
                stack
                    .pop()
                    .ok_or_else(|| CbError::declaration("#endif without matching #if"))?;
            }
            "error" if active => return Err(CbError::declaration(format!("#error {rest}"))),
            "warning" if active => tracing::warn!("#warning {rest}"),
            "include" if active => {
                return Err(CbError::declaration(
                    "#include is reserved and not supported by this interpreter core",
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_define(&mut self, rest: &str) -> CbResult<()> {
        let rest = rest.trim_start();
        let name_end = rest
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        let after_name = &rest[name_end..];

        if let Some(stripped) = after_name.strip_prefix('(') {
            let close = stripped
                .find(')')
                .ok_or_else(|| CbError::declaration(format!("unterminated parameter list in #define {name}")))?;
            let params: Vec<String> = stripped[..close]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            let body = stripped[close + 1..].trim();
            self.define_function(name, params, body)?;
        } else {
            self.define_object(name, after_name.trim());
        }
        Ok(())
    }

    fn expand(&self, text: &str, depth: u32) -> CbResult<String> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(CbError::declaration("macro expansion exceeded recursion depth 100"));
        }
        let mut out = String::new();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '"' {
                // string literals are opaque: copy verbatim including the quotes
                out.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match self.macros.get(&ident) {
                    None => out.push_str(&ident),
                    Some(MacroDef::Object(body)) => {
                        out.push_str(&self.expand(body, depth + 1)?);
                    }
                    Some(MacroDef::Function(params, body)) => {
                        // look ahead, skipping whitespace, for '('
                        let mut j = i;
                        while j < chars.len() && chars[j].is_whitespace() {
                            j += 1;
                        }
                        if j < chars.len() && chars[j] == '(' {
                            let (args, next) = collect_call_args(&chars, j + 1)?;
                            i = next;
                            let mut expanded_args = Vec::with_capacity(args.len());
                            for arg in &args {
                                expanded_args.push(self.expand(arg, depth + 1)?);
                            }
                            let substituted = substitute_params(body, params, &expanded_args);
                            out.push_str(&self.expand(&substituted, depth + 1)?);
                        } else {
                            // not actually a call; emit the identifier verbatim
                            out.push_str(&ident);
                        }
                    }
                }
                continue;
            }
            out.push(c);
            i += 1;
        }
        Ok(out)
    }
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

/// Collects arguments to a function-like macro call, respecting nested
/// parens and string literals. Returns `(args, index_after_closing_paren)`.
fn collect_call_args(chars: &[char], mut i: usize) -> CbResult<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    loop {
        if i >= chars.len() {
            return Err(CbError::declaration("unterminated macro call (missing ')')"));
        }
        let c = chars[i];
        match c {
            '"' => {
                current.push(c);
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    current.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    current.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                if depth == 0 {
                    args.push(current.trim().to_string());
                    i += 1;
                    break;
                }
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        i += 1;
    }
    if args.len() == 1 && args[0].is_empty() {
        args.clear();
    }
    Ok((args, i))
}

/// Word-boundary textual substitution of parameters in a macro body.
fn substitute_params(body: &str, params: &[String], args: &[String]) -> String {
    let mut out = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if let Some(pos) = params.iter().position(|p| p == &word) {
                out.push('(');
                out.push_str(args.get(pos).map(String::as_str).unwrap_or(""));
                out.push(')');
            } else {
                out.push_str(&word);
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn has_stringify(body: &str, params: &[String]) -> bool {
    let chars: Vec<char> = body.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '#' && chars.get(i + 1) != Some(&'#') {
            let rest: String = chars[i + 1..].iter().collect();
            let (word, _) = split_first_word(&rest);
            if params.iter().any(|p| p == word) {
                return true;
            }
        }
    }
    false
}

fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = text.chars().collect();
    let wchars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i..].starts_with(&wchars[..]) {
            let before_ok = i == 0 || !is_ident_char(chars[i - 1]);
            let after = i + wchars.len();
            let after_ok = after >= chars.len() || !is_ident_char(chars[after]);
            if before_ok && after_ok {
                out.push_str(replacement);
                i = after;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn evaluate_if_condition(expr: &str, macros: &HashMap<String, MacroDef>) -> bool {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("defined(") {
        if let Some(name) = rest.strip_suffix(')') {
            return macros.contains_key(name.trim());
        }
    }
    if let Some(rest) = expr.strip_prefix("defined ") {
        return macros.contains_key(rest.trim());
    }
    expr != "0" && !expr.is_empty()
}
