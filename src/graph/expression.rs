//! Evaluation of the template-expression subset that carries resource identity.
//!
//! Exported names and `dependsOn` entries are template expressions such as
//! `[parameters('sites_app_dev_name')]` or
//! `[resourceId('Microsoft.Web/serverfarms', parameters('plan_name'))]`.
//! Only the functions needed to recover identity are understood:
//! `parameters`, `variables`, `concat`, `format` and `resourceId`.
//! Anything else evaluates to `None` and the caller keeps the raw text.

use serde_json::Value;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Literal(String),
    Call(String, Vec<Expr>),
}

/// Identity of a resource: its type and its (possibly slash-segmented) name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Lower-cased resource type
    pub resource_type: String,
    /// Lower-cased resource name
    pub name: String,
}

impl ResourceKey {
    /// Build a case-insensitive key.
    pub fn new(resource_type: &str, name: &str) -> Self {
        Self {
            resource_type: resource_type.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
        }
    }
}

/// Parameter and variable values used while evaluating expressions.
#[derive(Debug, Clone, Default)]
pub struct ExpressionScope {
    parameters: serde_json::Map<String, Value>,
    variables: serde_json::Map<String, Value>,
}

impl ExpressionScope {
    /// Build a scope from an export document's `parameters` and `variables`.
    pub fn from_document(document: &Value) -> Self {
        let parameters = document
            .get("parameters")
            .and_then(Value::as_object)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|(name, decl)| {
                        decl.get("defaultValue").map(|v| (name.clone(), v.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let variables =
            document.get("variables").and_then(Value::as_object).cloned().unwrap_or_default();

        Self {
            parameters,
            variables,
        }
    }

    /// Resolve a string field that may be a bracketed expression.
    ///
    /// Plain strings are returned as-is; `[[` escapes a literal bracket.
    pub fn resolve_string(&self, raw: &str) -> Option<String> {
        match strip_brackets(raw) {
            Bracketed::Literal(text) => Some(text),
            Bracketed::Expression(body) => {
                let expr = Parser::new(body).parse_complete()?;
                self.eval(&expr)
            }
        }
    }

    /// Resolve a `dependsOn` entry into the key of the resource it names.
    pub fn resolve_reference(&self, raw: &str) -> Option<ResourceKey> {
        match strip_brackets(raw) {
            Bracketed::Literal(text) => parse_resource_id_literal(&text),
            Bracketed::Expression(body) => {
                let expr = Parser::new(body).parse_complete()?;
                match &expr {
                    Expr::Call(name, args) if name.eq_ignore_ascii_case("resourceId") => {
                        let values: Vec<String> =
                            args.iter().map(|a| self.eval(a)).collect::<Option<_>>()?;
                        let type_pos = values.iter().position(|v| is_resource_type(v))?;
                        let names = &values[type_pos + 1..];
                        if names.is_empty() {
                            return None;
                        }
                        Some(ResourceKey::new(&values[type_pos], &names.join("/")))
                    }
                    _ => parse_resource_id_literal(&self.eval(&expr)?),
                }
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Literal(text) => Some(text.clone()),
            Expr::Call(name, args) => match name.to_ascii_lowercase().as_str() {
                "parameters" => lookup_string(&self.parameters, &self.eval(args.first()?)?),
                "variables" => lookup_string(&self.variables, &self.eval(args.first()?)?),
                "concat" => args.iter().map(|a| self.eval(a)).collect::<Option<Vec<_>>>().map(|parts| parts.concat()),
                "format" => {
                    let mut text = self.eval(args.first()?)?;
                    for (i, arg) in args.iter().skip(1).enumerate() {
                        text = text.replace(&format!("{{{i}}}"), &self.eval(arg)?);
                    }
                    Some(text)
                }
                _ => None,
            },
        }
    }
}

fn lookup_string(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}

fn is_resource_type(value: &str) -> bool {
    let mut segments = value.split('/');
    segments.next().is_some_and(|ns| ns.contains('.')) && segments.next().is_some()
}

/// Parse a literal resource ID such as
/// `/subscriptions/x/resourceGroups/rg/providers/Microsoft.Web/sites/app/config/web`.
fn parse_resource_id_literal(text: &str) -> Option<ResourceKey> {
    let lower = text.to_ascii_lowercase();
    let idx = lower.rfind("/providers/")?;
    let rest = &text[idx + "/providers/".len()..];
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    // namespace, then alternating type/name pairs
    if segments.len() < 3 || (segments.len() - 1) % 2 != 0 {
        return None;
    }
    let mut types = vec![segments[0].to_string()];
    let mut names = Vec::new();
    for pair in segments[1..].chunks(2) {
        types.push(pair[0].to_string());
        names.push(pair[1].to_string());
    }
    Some(ResourceKey::new(&types.join("/"), &names.join("/")))
}

enum Bracketed {
    Literal(String),
    Expression(String),
}

fn strip_brackets(raw: &str) -> Bracketed {
    let trimmed = raw.trim();
    if let Some(escaped) = trimmed.strip_prefix("[[") {
        return Bracketed::Literal(format!("[{escaped}"));
    }
    match trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(body) => Bracketed::Expression(body.to_string()),
        None => Bracketed::Literal(raw.to_string()),
    }
}

/// Minimal recursive-descent parser over the expression body.
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(body: impl Into<String>) -> Self {
        Self {
            chars: body.into().chars().collect(),
            pos: 0,
        }
    }

    fn parse_complete(mut self) -> Option<Expr> {
        let expr = self.parse_expr()?;
        self.skip_ws();
        (self.pos == self.chars.len()).then_some(expr)
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.skip_ws();
        match self.chars.get(self.pos)? {
            '\'' => self.parse_literal(),
            c if c.is_ascii_alphabetic() => self.parse_call(),
            _ => None,
        }
    }

    fn parse_literal(&mut self) -> Option<Expr> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            let c = *self.chars.get(self.pos)?;
            self.pos += 1;
            if c == '\'' {
                // '' is an escaped quote
                if self.chars.get(self.pos) == Some(&'\'') {
                    text.push('\'');
                    self.pos += 1;
                } else {
                    return Some(Expr::Literal(text));
                }
            } else {
                text.push(c);
            }
        }
    }

    fn parse_call(&mut self) -> Option<Expr> {
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.skip_ws();
        if self.chars.get(self.pos) != Some(&'(') {
            return None;
        }
        self.pos += 1;

        let mut args = Vec::new();
        self.skip_ws();
        if self.chars.get(self.pos) == Some(&')') {
            self.pos += 1;
            return Some(Expr::Call(name, args));
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_ws();
            match self.chars.get(self.pos)? {
                ',' => self.pos += 1,
                ')' => {
                    self.pos += 1;
                    return Some(Expr::Call(name, args));
                }
                _ => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ExpressionScope {
        ExpressionScope::from_document(&json!({
            "parameters": {
                "sites_app_dev_name": { "type": "String", "defaultValue": "app-dev" },
                "vnet_name": { "type": "String", "defaultValue": "vnet-dev" }
            },
            "variables": { "suffix": "web" }
        }))
    }

    #[test]
    fn test_resolve_plain_and_parameter_names() {
        let scope = scope();
        assert_eq!(scope.resolve_string("plain-name").as_deref(), Some("plain-name"));
        assert_eq!(
            scope.resolve_string("[parameters('sites_app_dev_name')]").as_deref(),
            Some("app-dev")
        );
        assert_eq!(scope.resolve_string("[[literal]").as_deref(), Some("[literal]"));
    }

    #[test]
    fn test_resolve_concat_and_format() {
        let scope = scope();
        assert_eq!(
            scope.resolve_string("[concat(parameters('vnet_name'), '/subnetA')]").as_deref(),
            Some("vnet-dev/subnetA")
        );
        assert_eq!(
            scope
                .resolve_string("[format('{0}/{1}', parameters('sites_app_dev_name'), variables('suffix'))]")
                .as_deref(),
            Some("app-dev/web")
        );
    }

    #[test]
    fn test_unknown_function_is_unresolved() {
        assert!(scope().resolve_string("[uniqueString(resourceGroup().id)]").is_none());
    }

    #[test]
    fn test_resolve_reference_expression() {
        let key = scope()
            .resolve_reference(
                "[resourceId('Microsoft.Network/virtualNetworks/subnets', parameters('vnet_name'), 'subnetA')]",
            )
            .unwrap();
        assert_eq!(key, ResourceKey::new("Microsoft.Network/virtualNetworks/subnets", "vnet-dev/subnetA"));
    }

    #[test]
    fn test_resolve_reference_literal_id() {
        let key = scope()
            .resolve_reference(
                "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.Web/sites/app-dev/config/web",
            )
            .unwrap();
        assert_eq!(key, ResourceKey::new("Microsoft.Web/sites/config", "app-dev/web"));
    }

    #[test]
    fn test_quote_escape_in_literal() {
        assert_eq!(scope().resolve_string("[concat('it''s', '-x')]").as_deref(), Some("it's-x"));
    }
}
