//! Declarative macro for building signatures.

/// Build a [`Signature`](crate::callable::Signature) from a function-like
/// declaration.
///
/// Parameters with `= value` are optional; the value is converted with
/// `Into<Value>`. Evaluates to `Result<Signature, BindingError>`.
///
/// # Example
///
/// ```
/// use publisher_core::signature;
///
/// let sig = signature!(search(query, REQUEST, limit = 10)).unwrap();
/// assert_eq!(sig.name(), "search");
/// assert_eq!(sig.parameters(), ["query", "REQUEST", "limit"]);
/// assert_eq!(sig.defaults().len(), 1);
/// ```
#[macro_export]
macro_rules! signature {
    (@param $param:ident = $default:expr) => {
        $crate::callable::Parameter::optional(stringify!($param), $default)
    };
    (@param $param:ident) => {
        $crate::callable::Parameter::required(stringify!($param))
    };
    ($name:ident ( $($param:ident $(= $default:expr)?),* $(,)? )) => {
        $crate::callable::Signature::new(
            stringify!($name),
            ::std::vec::Vec::<$crate::callable::Parameter>::from([
                $($crate::signature!(@param $param $(= $default)?)),*
            ]),
        )
    };
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use serde_json::json;

    #[test]
    fn test_signature_macro_required_and_optional() {
        let sig = signature!(edit(title, body = "", draft = true)).unwrap();
        assert_eq!(sig.parameters(), ["title", "body", "draft"]);
        assert_eq!(sig.defaults(), [json!(""), json!(true)]);
    }

    #[test]
    fn test_signature_macro_empty() {
        let sig = signature!(index()).unwrap();
        assert!(sig.parameters().is_empty());
    }
}
