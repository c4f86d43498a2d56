//! Declared calling conventions
//!
//! A [`Signature`] lists a callable's parameters in declaration order.
//! Native callables carry none, which is what makes them uninspectable.

use crate::callable::CallArgs;
use crate::error::RaisedError;

/// Parameter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Positional-or-keyword parameter
    Positional,
    /// Collects extra positional arguments (`*args`)
    VarPositional,
    /// Keyword-only parameter
    KeywordOnly,
    /// Collects extra keyword arguments (`**kwargs`)
    VarKeyword,
}

/// Declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter kind
    pub kind: ParamKind,
    /// Whether a default value is declared
    pub has_default: bool,
}

/// Ordered parameter list of a defined callable
///
/// # Example
/// ```
/// use bond_runtime::Signature;
///
/// // (x, *args, y=None, **kwargs)
/// let sig = Signature::new()
///     .positional("x")
///     .var_positional("args")
///     .keyword_only_with_default("y")
///     .var_keyword("kwargs");
/// assert_eq!(sig.positional_params().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Empty signature (no parameters)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: impl Into<String>, kind: ParamKind, has_default: bool) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
            has_default,
        });
        self
    }

    /// Add a required positional parameter
    #[must_use]
    pub fn positional(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::Positional, false)
    }

    /// Add a positional parameter with a default
    #[must_use]
    pub fn positional_with_default(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::Positional, true)
    }

    /// Add the variadic positional slot
    #[must_use]
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarPositional, false)
    }

    /// Add a required keyword-only parameter
    #[must_use]
    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::KeywordOnly, false)
    }

    /// Add a keyword-only parameter with a default
    #[must_use]
    pub fn keyword_only_with_default(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::KeywordOnly, true)
    }

    /// Add the variadic keyword slot
    #[must_use]
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarKeyword, false)
    }

    /// All parameters in declaration order
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Positional-or-keyword parameters
    pub fn positional_params(&self) -> impl Iterator<Item = &Param> {
        self.of_kind(ParamKind::Positional)
    }

    /// Keyword-only parameters
    pub fn keyword_only_params(&self) -> impl Iterator<Item = &Param> {
        self.of_kind(ParamKind::KeywordOnly)
    }

    /// Variadic positional slot, if declared
    #[must_use]
    pub fn var_positional_param(&self) -> Option<&Param> {
        self.of_kind(ParamKind::VarPositional).next()
    }

    /// Variadic keyword slot, if declared
    #[must_use]
    pub fn var_keyword_param(&self) -> Option<&Param> {
        self.of_kind(ParamKind::VarKeyword).next()
    }

    fn of_kind(&self, kind: ParamKind) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(move |p| p.kind == kind)
    }

    /// Check that `args` can be bound to this signature
    ///
    /// # Errors
    /// Raises `TypeError` naming `callee` on too many positional arguments,
    /// duplicate values, missing required parameters or unexpected keywords.
    pub fn bind(&self, callee: &str, args: &CallArgs) -> Result<(), RaisedError> {
        let positional: Vec<&Param> = self.positional_params().collect();

        if args.args.len() > positional.len() && self.var_positional_param().is_none() {
            return Err(RaisedError::type_error(format!(
                "{callee}() takes {} positional argument{} but {} {} given",
                positional.len(),
                if positional.len() == 1 { "" } else { "s" },
                args.args.len(),
                if args.args.len() == 1 { "was" } else { "were" },
            )));
        }

        for (index, param) in positional.iter().enumerate() {
            let by_position = index < args.args.len();
            let by_keyword = args.kwargs.contains_key(&param.name);
            if by_position && by_keyword {
                return Err(RaisedError::type_error(format!(
                    "{callee}() got multiple values for argument '{}'",
                    param.name
                )));
            }
            if !by_position && !by_keyword && !param.has_default {
                return Err(RaisedError::type_error(format!(
                    "{callee}() missing required positional argument: '{}'",
                    param.name
                )));
            }
        }

        for param in self.keyword_only_params() {
            if !param.has_default && !args.kwargs.contains_key(&param.name) {
                return Err(RaisedError::type_error(format!(
                    "{callee}() missing required keyword-only argument: '{}'",
                    param.name
                )));
            }
        }

        if self.var_keyword_param().is_none() {
            let unexpected = args.kwargs.keys().find(|name| {
                !self.params.iter().any(|p| {
                    &p.name == *name
                        && matches!(p.kind, ParamKind::Positional | ParamKind::KeywordOnly)
                })
            });
            if let Some(name) = unexpected {
                return Err(RaisedError::type_error(format!(
                    "{callee}() got an unexpected keyword argument '{name}'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn args(n: usize) -> CallArgs {
        CallArgs::positional((0..n).map(|i| Value::from(i as i64)))
    }

    #[test]
    fn binds_exact_positionals() {
        let sig = Signature::new().positional("x").positional("y");
        assert!(sig.bind("f", &args(2)).is_ok());
    }

    #[test]
    fn rejects_extra_positionals() {
        let sig = Signature::new().positional("x");
        let err = sig.bind("write_to_disk", &args(2)).unwrap_err();
        assert_eq!(
            err.message(),
            "write_to_disk() takes 1 positional argument but 2 were given"
        );
    }

    #[test]
    fn var_positional_absorbs_extras() {
        let sig = Signature::new().positional("x").var_positional("rest");
        assert!(sig.bind("f", &args(5)).is_ok());
    }

    #[test]
    fn positional_may_come_by_keyword() {
        let sig = Signature::new().positional("x");
        let call = CallArgs::new().with_kwarg("x", 1);
        assert!(sig.bind("f", &call).is_ok());
    }

    #[test]
    fn rejects_duplicate_value() {
        let sig = Signature::new().positional("x");
        let call = args(1).with_kwarg("x", 1);
        assert!(sig.bind("f", &call).is_err());
    }

    #[test]
    fn missing_required_positional() {
        let sig = Signature::new().positional("x").positional_with_default("y");
        assert!(sig.bind("f", &args(1)).is_ok());
        assert!(sig.bind("f", &args(0)).is_err());
    }

    #[test]
    fn keyword_only_requirements() {
        let sig = Signature::new()
            .var_positional("args")
            .keyword_only("a")
            .keyword_only_with_default("b");
        assert!(sig.bind("f", &CallArgs::new()).is_err());
        assert!(sig.bind("f", &CallArgs::new().with_kwarg("a", 1)).is_ok());
    }

    #[test]
    fn unexpected_keyword() {
        let sig = Signature::new().positional("x");
        let err = sig
            .bind("f", &args(1).with_kwarg("y", 2))
            .unwrap_err();
        assert_eq!(err.message(), "f() got an unexpected keyword argument 'y'");

        let open = Signature::new().positional("x").var_keyword("kw");
        assert!(open.bind("f", &args(1).with_kwarg("y", 2)).is_ok());
    }
}
