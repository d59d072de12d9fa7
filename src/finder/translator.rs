//! Turning caller expressions into `XPath`.

use crate::error::Error;

/// Converts a caller-supplied expression into the `XPath` the finder runs.
///
/// Implemented for plain closures, so a one-off translator needs no type:
///
/// ```
/// use elementfinder::{DocumentKind, ElementFinder, FinderOptions};
///
/// let by_class = |class: &str| format!("//*[@class=\"{class}\"]");
/// let options = FinderOptions::default().translator(by_class);
/// let finder = ElementFinder::with_options("<p class=\"x\">hi</p>", options).unwrap();
/// assert_eq!(finder.value("x").unwrap().first().unwrap().unwrap(), "hi");
/// ```
pub trait ExpressionTranslator: Send + Sync {
    /// Returns the `XPath` for `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Translation`] when the expression cannot be
    /// translated.
    fn translate(&self, expression: &str) -> Result<String, Error>;
}

/// The default translator: expressions already are `XPath`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XPathExpression;

impl ExpressionTranslator for XPathExpression {
    fn translate(&self, expression: &str) -> Result<String, Error> {
        Ok(expression.to_owned())
    }
}

impl<F> ExpressionTranslator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn translate(&self, expression: &str) -> Result<String, Error> {
        Ok(self(expression))
    }
}
