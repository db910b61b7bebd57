//! JavaScript state assignments in inline scripts
//!
//! Marketplaces hydrate listing pages from assignments such as
//! `window.__SEARCH_APP_INITIAL_STATE__ = {...}` or
//! `var products = JSON.parse('...')`. Scripts are parsed with swc and only
//! literal right-hand sides are converted; anything computed is skipped.

use scraper::{Html, Selector};
use serde_json::{Map, Number, Value};
use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast::*;
use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax};

/// Variables assigned literal values in the page's inline scripts.
pub fn extract_js_variables(document: &Html) -> Value {
    let selector = match Selector::parse("script:not([type]), script[type='text/javascript']") {
        Ok(s) => s,
        Err(_) => return Value::Object(Map::new()),
    };

    let mut result = Map::new();
    for element in document.select(&selector) {
        let source = element.text().collect::<String>();
        if source.trim().is_empty() {
            continue;
        }
        for (name, value) in parse_assignments(&source) {
            result.insert(name, value);
        }
    }
    Value::Object(result)
}

/// Parse one script and collect its literal assignments, in source order.
///
/// Unparseable scripts yield nothing.
pub fn parse_assignments(source: &str) -> Vec<(String, Value)> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Anon.into(), source.to_string());
    let lexer = Lexer::new(
        Syntax::Es(Default::default()),
        Default::default(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let script = match parser.parse_script() {
        Ok(s) => s,
        Err(_) => {
            tracing::trace!(bytes = source.len(), "inline script did not parse");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for stmt in &script.body {
        collect_stmt(stmt, &mut out);
    }
    out
}

fn collect_stmt(stmt: &Stmt, out: &mut Vec<(String, Value)>) {
    match stmt {
        Stmt::Decl(Decl::Var(var_decl)) => {
            for decl in &var_decl.decls {
                let (Pat::Ident(ident), Some(init)) = (&decl.name, &decl.init) else {
                    continue;
                };
                if let Some(value) = expr_to_json(init) {
                    out.push((ident.sym.as_str().to_string(), value));
                }
            }
        }
        Stmt::Expr(expr_stmt) => collect_assign(&expr_stmt.expr, out),
        _ => {}
    }
}

fn collect_assign(expr: &Expr, out: &mut Vec<(String, Value)>) {
    match expr {
        Expr::Assign(assign) => {
            let name = match &assign.left {
                AssignTarget::Simple(SimpleAssignTarget::Ident(ident)) => {
                    Some(ident.sym.as_str().to_string())
                }
                AssignTarget::Simple(SimpleAssignTarget::Member(member)) => member_name(member),
                _ => None,
            };
            if let (Some(name), Some(value)) = (name, expr_to_json(&assign.right)) {
                out.push((name, value));
            }
        }
        // `a = 1, b = {...};`
        Expr::Seq(seq) => {
            for e in &seq.exprs {
                collect_assign(e, out);
            }
        }
        Expr::Paren(paren) => collect_assign(&paren.expr, out),
        _ => {}
    }
}

/// Property name of `window.X` / `window["X"]` / `self.X`.
fn member_name(member: &MemberExpr) -> Option<String> {
    match &member.prop {
        MemberProp::Ident(prop) => Some(prop.sym.as_str().to_string()),
        MemberProp::Computed(computed) => match &*computed.expr {
            Expr::Lit(Lit::Str(s)) => s.value.as_str().map(str::to_string),
            _ => None,
        },
        _ => None,
    }
}

fn number(value: f64) -> Option<Value> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(value as i64)))
    } else {
        Number::from_f64(value).map(Value::Number)
    }
}

/// Literal expression to JSON. Object properties and array elements that
/// are not literals are dropped (objects) or become `null` (arrays).
fn expr_to_json(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Lit(Lit::Str(s)) => Some(Value::String(s.value.as_str().unwrap_or("").to_string())),
        Expr::Lit(Lit::Num(n)) => number(n.value),
        Expr::Lit(Lit::Bool(b)) => Some(Value::Bool(b.value)),
        Expr::Lit(Lit::Null(_)) => Some(Value::Null),
        Expr::Object(obj) => {
            let mut map = Map::new();
            for prop in &obj.props {
                let PropOrSpread::Prop(prop) = prop else {
                    continue;
                };
                let Prop::KeyValue(kv) = &**prop else {
                    continue;
                };
                if let (Some(key), Some(value)) = (prop_name(&kv.key), expr_to_json(&kv.value)) {
                    map.insert(key, value);
                }
            }
            Some(Value::Object(map))
        }
        Expr::Array(arr) => Some(Value::Array(
            arr.elems
                .iter()
                .map(|elem| match elem {
                    Some(ExprOrSpread { expr, spread: None }) => {
                        expr_to_json(expr).unwrap_or(Value::Null)
                    }
                    _ => Value::Null,
                })
                .collect(),
        )),
        Expr::Call(call) if is_json_parse(call) => {
            let ExprOrSpread { expr: arg, .. } = call.args.first()?;
            match &**arg {
                Expr::Lit(Lit::Str(s)) => serde_json::from_str(s.value.as_str()?).ok(),
                _ => None,
            }
        }
        Expr::Unary(unary) if unary.op == UnaryOp::Minus => match &*unary.arg {
            Expr::Lit(Lit::Num(n)) => number(-n.value),
            _ => None,
        },
        Expr::Tpl(tpl) if tpl.exprs.is_empty() => tpl
            .quasis
            .first()
            .map(|q| Value::String(q.raw.as_str().to_string())),
        Expr::Paren(paren) => expr_to_json(&paren.expr),
        _ => None,
    }
}

fn is_json_parse(call: &CallExpr) -> bool {
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    let Expr::Member(member) = &**callee else {
        return false;
    };
    let Expr::Ident(obj) = &*member.obj else {
        return false;
    };
    matches!(&member.prop, MemberProp::Ident(p) if p.sym.as_ref() == "parse")
        && obj.sym.as_ref() == "JSON"
}

fn prop_name(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(ident) => Some(ident.sym.as_str().to_string()),
        PropName::Str(s) => s.value.as_str().map(str::to_string),
        PropName::Num(n) => Some(n.value.to_string()),
        _ => None,
    }
}
