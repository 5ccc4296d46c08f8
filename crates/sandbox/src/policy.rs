//! Static policy check over a Python snippet's AST, run before the
//! subprocess is ever spawned. Catches the obvious escape hatches
//! (importing `os`/`subprocess`/`socket`, calling `eval`/`exec`/`compile`,
//! opening a raw file handle) that a restricted-builtins runtime can't
//! un-import once the process is already running.

use rustpython_ast::{Expr, Mod, Stmt};
use rustpython_parser::{parse, Mode};

use sa_domain::error::{Error, Result};

const BANNED_MODULES: &[&str] = &[
    "os", "subprocess", "socket", "ctypes", "sys", "shutil", "importlib", "multiprocessing",
];

const BANNED_CALLS: &[&str] = &["eval", "exec", "compile", "__import__", "open"];

/// Reject a Python snippet that imports a banned module or calls a banned
/// builtin anywhere in its AST. Returns `Ok(())` when the snippet parses
/// and contains nothing on either denylist.
pub fn check_python(source: &str) -> Result<()> {
    let module = parse(source, Mode::Module, "<sandbox>").map_err(|e| Error::Policy {
        reason: format!("syntax error: {e}"),
        line: None,
        token: None,
    })?;

    let Mod::Module(module) = module else {
        return Err(Error::Policy {
            reason: "expected a module body".into(),
            line: None,
            token: None,
        });
    };

    walk_stmts(&module.body)
}

fn walk_stmts(stmts: &[Stmt]) -> Result<()> {
    for stmt in stmts {
        walk_stmt(stmt)?;
    }
    Ok(())
}

fn walk_stmt(stmt: &Stmt) -> Result<()> {
    match stmt {
        Stmt::Import(s) => {
            for alias in &s.names {
                let root = alias.name.split('.').next().unwrap_or(alias.name.as_str());
                if BANNED_MODULES.contains(&root) {
                    return Err(banned_module(root, line_of(s.range)));
                }
            }
        }
        Stmt::ImportFrom(s) => {
            if let Some(module) = &s.module {
                let root = module.split('.').next().unwrap_or(module.as_str());
                if BANNED_MODULES.contains(&root) {
                    return Err(banned_module(root, line_of(s.range)));
                }
            }
        }
        Stmt::FunctionDef(s) => walk_stmts(&s.body)?,
        Stmt::AsyncFunctionDef(s) => walk_stmts(&s.body)?,
        Stmt::ClassDef(s) => walk_stmts(&s.body)?,
        Stmt::If(s) => {
            walk_expr(&s.test)?;
            walk_stmts(&s.body)?;
            walk_stmts(&s.orelse)?;
        }
        Stmt::For(s) => {
            walk_expr(&s.iter)?;
            walk_stmts(&s.body)?;
            walk_stmts(&s.orelse)?;
        }
        Stmt::AsyncFor(s) => {
            walk_expr(&s.iter)?;
            walk_stmts(&s.body)?;
            walk_stmts(&s.orelse)?;
        }
        Stmt::While(s) => {
            walk_expr(&s.test)?;
            walk_stmts(&s.body)?;
            walk_stmts(&s.orelse)?;
        }
        Stmt::With(s) => {
            for item in &s.items {
                walk_expr(&item.context_expr)?;
            }
            walk_stmts(&s.body)?;
        }
        Stmt::AsyncWith(s) => {
            for item in &s.items {
                walk_expr(&item.context_expr)?;
            }
            walk_stmts(&s.body)?;
        }
        Stmt::Try(s) => {
            walk_stmts(&s.body)?;
            for handler in &s.handlers {
                let rustpython_ast::ExceptHandler::ExceptHandler(h) = handler;
                walk_stmts(&h.body)?;
            }
            walk_stmts(&s.orelse)?;
            walk_stmts(&s.finalbody)?;
        }
        Stmt::Expr(s) => walk_expr(&s.value)?,
        Stmt::Assign(s) => walk_expr(&s.value)?,
        Stmt::AugAssign(s) => walk_expr(&s.value)?,
        Stmt::AnnAssign(s) => {
            if let Some(value) = &s.value {
                walk_expr(value)?;
            }
        }
        Stmt::Return(s) => {
            if let Some(value) = &s.value {
                walk_expr(value)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn walk_expr(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Call(c) => {
            if let Some(name) = callee_name(&c.func) {
                if BANNED_CALLS.contains(&name.as_str()) {
                    return Err(banned_call(&name, line_of(c.range)));
                }
            }
            walk_expr(&c.func)?;
            for arg in &c.args {
                walk_expr(arg)?;
            }
        }
        Expr::BinOp(b) => {
            walk_expr(&b.left)?;
            walk_expr(&b.right)?;
        }
        Expr::Attribute(a) => walk_expr(&a.value)?,
        Expr::Subscript(s) => {
            walk_expr(&s.value)?;
            walk_expr(&s.slice)?;
        }
        Expr::List(l) => {
            for elt in &l.elts {
                walk_expr(elt)?;
            }
        }
        Expr::Tuple(t) => {
            for elt in &t.elts {
                walk_expr(elt)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn callee_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(n) => Some(n.id.to_string()),
        Expr::Attribute(a) => Some(a.attr.to_string()),
        _ => None,
    }
}

fn line_of(range: rustpython_ast::text_size::TextRange) -> Option<u32> {
    // Byte offsets, not line numbers — the AST alone doesn't carry line
    // numbers. Good enough for a `reason` string; callers that need an
    // exact line can re-derive it from the offset against the source.
    Some(u32::from(range.start()))
}

fn banned_module(name: &str, line: Option<u32>) -> Error {
    Error::Policy {
        reason: format!("import of banned module `{name}`"),
        line,
        token: Some(name.to_string()),
    }
}

fn banned_call(name: &str, line: Option<u32>) -> Error {
    Error::Policy {
        reason: format!("call to banned function `{name}`"),
        line,
        token: Some(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_analysis_snippet_passes() {
        let src = "import pandas as pd\nx = pd.DataFrame({'a': [1,2,3]})\nresult = x['a'].mean()\n";
        assert!(check_python(src).is_ok());
    }

    #[test]
    fn importing_os_is_rejected() {
        let src = "import os\nos.system('echo hi')\n";
        let err = check_python(src).unwrap_err();
        assert_eq!(err.error_kind(), "policy");
    }

    #[test]
    fn importing_subprocess_from_is_rejected() {
        let src = "from subprocess import Popen\n";
        assert!(check_python(src).is_err());
    }

    #[test]
    fn nested_import_inside_function_is_rejected() {
        let src = "def leak():\n    import socket\n    return socket\n";
        assert!(check_python(src).is_err());
    }

    #[test]
    fn eval_call_is_rejected() {
        let src = "eval('1 + 1')\n";
        assert!(check_python(src).is_err());
    }

    #[test]
    fn dunder_import_call_is_rejected() {
        let src = "m = __import__('os')\n";
        assert!(check_python(src).is_err());
    }

    #[test]
    fn syntax_error_is_reported_as_policy_violation() {
        let src = "def (:\n";
        assert!(check_python(src).is_err());
    }
}
