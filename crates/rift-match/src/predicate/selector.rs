//! Embedded-document selectors: JSONPath and XPath.
//!
//! A selector turns a raw text field (an HTTP body, an SMTP text part) into the
//! value(s) it points at. Selection never fails loudly: a document that does not
//! parse yields [`Selection::ParseError`], a path with no hits yields
//! [`Selection::Empty`].
//!
//! Unless the predicate is case-sensitive, both the document and the selector
//! expression are lower-cased first, so `$..Title` finds a `title` key.

use super::options::Selector;
use super::value::{Scalar, Value};
use serde_json_path::JsonPath;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element};
use sxd_document::{Package, QName};
use sxd_xpath::{Context, Factory, Value as XPathValue, XPath};
use tracing::debug;

// Built XPath expressions are neither `Send` nor `Sync`, so each thread keeps
// its own, keyed by the (folded) expression text.
thread_local! {
    static XPATHS: RefCell<HashMap<String, Rc<XPath>>> = RefCell::new(HashMap::new());
}

/// The built form of an expression already validated by [`CompiledSelector::compile`].
fn built_xpath(expression: &str) -> Option<Rc<XPath>> {
    XPATHS.with(|cache| {
        if let Some(xpath) = cache.borrow().get(expression) {
            return Some(Rc::clone(xpath));
        }
        let xpath = Rc::new(Factory::new().build(expression).ok().flatten()?);
        cache
            .borrow_mut()
            .insert(expression.to_string(), Rc::clone(&xpath));
        Some(xpath)
    })
}

/// Result of applying a selector to a raw field.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// One hit (native type preserved) or several hits as a sequence in document order
    Found(Value),
    /// The document parsed but the path matched nothing
    Empty,
    /// The field is not a well-formed document of the expected kind
    ParseError,
}

impl Selection {
    fn from_hits(mut hits: Vec<Value>) -> Self {
        match hits.len() {
            0 => Selection::Empty,
            1 => Selection::Found(hits.remove(0)),
            _ => Selection::Found(Value::Sequence(hits)),
        }
    }
}

/// Selector expression rejected at creation time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("invalid jsonpath selector '{selector}': {message}")]
    InvalidJsonPath { selector: String, message: String },
    #[error("invalid xpath selector '{selector}': {message}")]
    InvalidXPath { selector: String, message: String },
}

#[derive(Debug, Clone)]
enum SelectorKind {
    JsonPath(Arc<JsonPath>),
    XPath {
        expression: String,
        ns: BTreeMap<String, String>,
    },
}

/// Selector compiled for one case-sensitivity mode.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    kind: SelectorKind,
    case_sensitive: bool,
}

impl CompiledSelector {
    /// Compile a selector, validating its expression.
    pub fn compile(selector: &Selector, case_sensitive: bool) -> Result<Self, SelectorError> {
        let fold = |s: &str| {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };

        let kind = match selector {
            Selector::JsonPath { selector } => {
                let path = JsonPath::parse(&fold(selector)).map_err(|e| {
                    SelectorError::InvalidJsonPath {
                        selector: selector.clone(),
                        message: e.to_string(),
                    }
                })?;
                SelectorKind::JsonPath(Arc::new(path))
            }
            Selector::XPath { selector, ns } => {
                let expression = fold(selector);
                let xpath = match Factory::new().build(&expression) {
                    Ok(Some(xpath)) => xpath,
                    Ok(None) => {
                        return Err(SelectorError::InvalidXPath {
                            selector: selector.clone(),
                            message: "empty expression".to_string(),
                        })
                    }
                    Err(e) => {
                        return Err(SelectorError::InvalidXPath {
                            selector: selector.clone(),
                            message: e.to_string(),
                        })
                    }
                };
                XPATHS.with(|cache| {
                    cache
                        .borrow_mut()
                        .insert(expression.clone(), Rc::new(xpath))
                });
                SelectorKind::XPath {
                    expression,
                    ns: ns.iter().map(|(p, uri)| (fold(p), uri.clone())).collect(),
                }
            }
        };

        Ok(Self {
            kind,
            case_sensitive,
        })
    }

    /// Apply the selector to a raw text field.
    pub fn select(&self, raw: &str) -> Selection {
        match &self.kind {
            SelectorKind::JsonPath(path) => select_json(raw, path, self.case_sensitive),
            SelectorKind::XPath { expression, ns } => {
                select_xml(raw, expression, ns, self.case_sensitive)
            }
        }
    }
}

fn select_json(raw: &str, path: &JsonPath, case_sensitive: bool) -> Selection {
    let document: serde_json::Value = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("jsonpath selector applied to non-JSON field: {}", e);
            return Selection::ParseError;
        }
    };
    let document = if case_sensitive {
        document
    } else {
        fold_json(document)
    };

    let hits = path
        .query(&document)
        .all()
        .into_iter()
        .filter_map(|node| Value::from_json(node.clone()))
        .collect();
    Selection::from_hits(hits)
}

/// Lower-case every key and string in a JSON document.
fn fold_json(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Json::String(s) => Json::String(s.to_lowercase()),
        Json::Array(items) => Json::Array(items.into_iter().map(fold_json).collect()),
        Json::Object(map) => Json::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), fold_json(v)))
                .collect(),
        ),
        other => other,
    }
}

fn select_xml(
    raw: &str,
    expression: &str,
    ns: &BTreeMap<String, String>,
    case_sensitive: bool,
) -> Selection {
    let package = match sxd_document::parser::parse(raw) {
        Ok(package) => package,
        Err(e) => {
            debug!("xpath selector applied to non-XML field: {:?}", e);
            return Selection::ParseError;
        }
    };
    let source = package.as_document();

    let fold = XmlFold {
        strip_namespaces: ns.is_empty(),
        lowercase: !case_sensitive,
    };
    if fold.is_identity() {
        return evaluate_xpath(&source, expression, ns);
    }

    let folded = fold.apply(&source);
    let document = folded.as_document();
    evaluate_xpath(&document, expression, ns)
}

fn evaluate_xpath(
    document: &Document<'_>,
    expression: &str,
    ns: &BTreeMap<String, String>,
) -> Selection {
    let Some(xpath) = built_xpath(expression) else {
        return Selection::ParseError;
    };

    let mut context = Context::new();
    for (prefix, uri) in ns {
        context.set_namespace(prefix, uri);
    }

    match xpath.evaluate(&context, document.root()) {
        Ok(XPathValue::Nodeset(nodes)) => Selection::from_hits(
            nodes
                .document_order()
                .into_iter()
                .map(|node| Value::from(node.string_value()))
                .collect(),
        ),
        Ok(XPathValue::String(s)) => Selection::Found(Value::from(s)),
        Ok(XPathValue::Boolean(b)) => Selection::Found(Value::from(b)),
        Ok(XPathValue::Number(n)) => match xpath_number(n) {
            Some(number) => Selection::Found(Value::Scalar(Scalar::Number(number))),
            None => Selection::Empty,
        },
        Err(e) => {
            debug!("xpath evaluation failed: {:?}", e);
            Selection::ParseError
        }
    }
}

/// XPath numbers are doubles; integral values keep an integer representation
/// so `count(//item)` compares equal to `3`, not `3.0`.
fn xpath_number(n: f64) -> Option<serde_json::Number> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
    }
}

/// Rewrites an XML document so plain XPath name tests match regardless of
/// namespaces and/or letter case.
#[derive(Debug, Clone, Copy)]
struct XmlFold {
    strip_namespaces: bool,
    lowercase: bool,
}

impl XmlFold {
    fn is_identity(&self) -> bool {
        !self.strip_namespaces && !self.lowercase
    }

    fn text(&self, s: &str) -> String {
        if self.lowercase {
            s.to_lowercase()
        } else {
            s.to_string()
        }
    }

    fn apply(&self, source: &Document<'_>) -> Package {
        let package = Package::new();
        {
            let target = package.as_document();
            for child in source.root().children() {
                if let ChildOfRoot::Element(element) = child {
                    let copy = self.copy_element(&target, element);
                    target.root().append_child(copy);
                }
            }
        }
        package
    }

    fn copy_element<'d>(&self, target: &Document<'d>, element: Element<'_>) -> Element<'d> {
        let name = element.name();
        let local = self.text(name.local_part());
        let copy = match (self.strip_namespaces, name.namespace_uri()) {
            (false, Some(uri)) => {
                target.create_element(QName::with_namespace_uri(Some(uri), &local))
            }
            _ => target.create_element(local.as_str()),
        };

        for attribute in element.attributes() {
            let attr_name = attribute.name();
            if attr_name.local_part() == "xmlns" {
                continue;
            }
            let attr_local = self.text(attr_name.local_part());
            let value = self.text(attribute.value());
            match (self.strip_namespaces, attr_name.namespace_uri()) {
                (false, Some(uri)) => {
                    copy.set_attribute_value(
                        QName::with_namespace_uri(Some(uri), &attr_local),
                        &value,
                    );
                }
                _ => {
                    copy.set_attribute_value(attr_local.as_str(), &value);
                }
            }
        }

        for child in element.children() {
            match child {
                ChildOfElement::Element(inner) => {
                    copy.append_child(self.copy_element(target, inner));
                }
                ChildOfElement::Text(text) => {
                    copy.append_child(target.create_text(&self.text(text.text())));
                }
                _ => {}
            }
        }

        copy
    }
}
