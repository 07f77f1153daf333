//! Parameterized SPARQL queries
//!
//! All statements sent to the triple store come from the fixed templates in
//! this module. Values are bound through [`QueryBuilder`], which validates
//! IRIs and escapes literals, so caller-supplied text can never change the
//! shape of a query.

use std::collections::BTreeMap;

use crate::error::{BrokerError, Result};

/// Graph holding token literals.
pub const TOKEN_GRAPH: &str = "tokens";

const PREFIXES: &str = "\
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX oauth: <https://oauth.net/2#>
PREFIX dc: <http://purl.org/dc/elements/1.1/>
";

const CLIENTS: &str = "\
SELECT ?client ?clientid ?clientsecret ?redirecturl ?authurl ?tokenurl ?identifier ?label
WHERE {
  GRAPH ?anygraph {
    ?client rdf:type oauth:Client .
    ?client oauth:clientID ?clientid .
    ?client oauth:clientSecret ?clientsecret .
    ?client oauth:redirectURL ?redirecturl .
    ?client oauth:endpoint ?endpoint .
    ?client dc:identifier ?identifier .
    ?client rdfs:label ?label .
    ?endpoint oauth:authurl ?authurl .
    ?endpoint oauth:tokenurl ?tokenurl .
  }
}
";

const CLIENT: &str = "\
SELECT ?clientid ?clientsecret ?redirecturl ?authurl ?tokenurl ?identifier ?label
WHERE {
  GRAPH ?anygraph {
    {{client}} rdf:type oauth:Client .
    {{client}} oauth:clientID ?clientid .
    {{client}} oauth:clientSecret ?clientsecret .
    {{client}} oauth:redirectURL ?redirecturl .
    {{client}} oauth:endpoint ?endpoint .
    {{client}} dc:identifier ?identifier .
    {{client}} rdfs:label ?label .
    ?endpoint oauth:authurl ?authurl .
    ?endpoint oauth:tokenurl ?tokenurl .
  }
}
LIMIT 1
";

const TOKEN: &str = "\
SELECT ?token
WHERE {
  GRAPH {{graph}} {
    {{client}} oauth:token ?token
  }
}
LIMIT 1
";

const UPDATE_TOKEN: &str = "\
WITH {{graph}}
DELETE {
  {{client}} oauth:token ?oldtoken
}
INSERT {
  {{client}} oauth:token {{token}}
}
WHERE {
  OPTIONAL { {{client}} oauth:token ?oldtoken }
}
";

const PARAMS: &str = "\
SELECT ?option ?value
WHERE {
  GRAPH ?anygraph {
    {{client}} oauth:param ?param .
    ?param rdfs:label ?option .
    ?param rdf:value ?value .
  }
}
";

const CLIENTS_OF_TYPE: &str = "\
SELECT ?item ?token
WHERE {
  GRAPH ?anygraph {
    ?item rdf:type {{client_type}} .
  }
  GRAPH ?tokengraph {
    ?item oauth:token ?token .
  }
}
";

// ---------------------------------------------------------------------------
// QueryKind
// ---------------------------------------------------------------------------

/// The fixed set of statements the provider issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Enumerate every `oauth:Client`.
    Clients,
    /// Fetch one registration by IRI.
    Client,
    /// Fetch the token literal of one registration.
    Token,
    /// Replace the token literal of one registration.
    UpdateToken,
    /// Fetch the extra authorization parameters of one registration.
    Params,
    /// Enumerate resources of a type that hold a token.
    ClientsOfType,
}

impl QueryKind {
    fn template(self) -> &'static str {
        match self {
            Self::Clients => CLIENTS,
            Self::Client => CLIENT,
            Self::Token => TOKEN,
            Self::UpdateToken => UPDATE_TOKEN,
            Self::Params => PARAMS,
            Self::ClientsOfType => CLIENTS_OF_TYPE,
        }
    }

    /// Returns `true` for SPARQL Update statements.
    pub fn is_update(self) -> bool {
        matches!(self, Self::UpdateToken)
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// A value bound to a template placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Iri(String),
    Literal(String),
}

impl Binding {
    /// The raw, unescaped value.
    pub fn value(&self) -> &str {
        match self {
            Self::Iri(v) | Self::Literal(v) => v,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Iri(iri) => format!("<{iri}>"),
            Self::Literal(text) => format!("\"{}\"", escape_literal(text)),
        }
    }
}

/// Validates an IRI for use inside `<...>`.
///
/// Rejects the characters the SPARQL grammar excludes from `IRIREF`:
/// `<>"{}|^` and backtick, backslash, and anything at or below U+0020.
pub fn validate_iri(iri: &str) -> Result<()> {
    if iri.is_empty() {
        return Err(BrokerError::BadRequest("IRI must not be empty".to_string()).into());
    }
    if let Some(bad) = iri
        .chars()
        .find(|c| *c <= '\u{20}' || matches!(*c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'))
    {
        return Err(BrokerError::BadRequest(format!(
            "invalid character {bad:?} in IRI '{}'",
            iri.escape_debug()
        ))
        .into());
    }
    Ok(())
}

/// Escapes text for a double-quoted SPARQL string literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// QueryBuilder / PreparedQuery
// ---------------------------------------------------------------------------

/// A rendered statement together with the values it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    kind: QueryKind,
    text: String,
    bindings: BTreeMap<&'static str, Binding>,
}

impl PreparedQuery {
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Full statement text, including prefixes.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw value bound to `name`.
    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(Binding::value)
    }
}

/// Fills one template's `{{name}}` placeholders.
///
/// # Examples
///
/// ```
/// use authbroker::persistence::sparql::query::{QueryBuilder, QueryKind};
///
/// let query = QueryBuilder::new(QueryKind::Token)
///     .iri("graph", "tokens")?
///     .iri("client", "https://example.org/clients/a")?
///     .build()?;
///
/// assert!(query.text().contains("GRAPH <tokens>"));
/// assert!(query.text().contains("<https://example.org/clients/a> oauth:token ?token"));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    kind: QueryKind,
    bindings: BTreeMap<&'static str, Binding>,
}

impl QueryBuilder {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            bindings: BTreeMap::new(),
        }
    }

    /// Binds an IRI after validating it.
    pub fn iri(mut self, name: &'static str, iri: &str) -> Result<Self> {
        validate_iri(iri)?;
        self.bindings.insert(name, Binding::Iri(iri.to_string()));
        Ok(self)
    }

    /// Binds a plain string literal.
    pub fn literal(mut self, name: &'static str, text: &str) -> Self {
        self.bindings.insert(name, Binding::Literal(text.to_string()));
        self
    }

    /// Renders the statement.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::BadRequest`] if a placeholder in the template
    /// has no binding.
    pub fn build(self) -> Result<PreparedQuery> {
        let template = self.kind.template();
        let mut text = String::with_capacity(PREFIXES.len() + template.len());
        text.push_str(PREFIXES);

        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            text.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                BrokerError::BadRequest(format!("unterminated placeholder in {:?} query", self.kind))
            })?;
            let name = after[..end].trim();
            let binding = self.bindings.get(name).ok_or_else(|| {
                BrokerError::BadRequest(format!(
                    "placeholder '{name}' is not bound in {:?} query",
                    self.kind
                ))
            })?;
            text.push_str(&binding.render());
            rest = &after[end + 2..];
        }
        text.push_str(rest);

        Ok(PreparedQuery {
            kind: self.kind,
            text,
            bindings: self.bindings,
        })
    }
}
