pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Validates a caller-supplied argument, failing with `InvalidArgument`
/// naming the argument and the violated condition.
#[macro_export]
macro_rules! verify_arg {
    ($name:ident, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Validates the shape of externally sourced data (side files, encoded
/// streams), failing with `InvalidFormat` for the given element. Unlike
/// [`verify_arg!`] the element name is a runtime value, so one reader can
/// report against whichever artifact it is parsing.
#[macro_export]
macro_rules! verify_data {
    ($element:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_data(result, $element, stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_data(predicate: bool, element: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_format(element, condition)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn invalid_format(element: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidFormat {
        element: element.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::result::Result;

    fn check_arg(len: usize) -> Result<()> {
        verify_arg!(len, len != 0);
        Ok(())
    }

    fn check_data(element: &str, version: u32) -> Result<()> {
        verify_data!(element, version == 1);
        Ok(())
    }

    #[test]
    fn test_verify_arg_names_the_argument() {
        assert!(check_arg(3).is_ok());
        let err = check_arg(0).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "len");
                assert_eq!(message, "len != 0");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_verify_data_reports_the_runtime_element() {
        assert!(check_data("header", 1).is_ok());
        let err = check_data("header", 2).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidFormat { element, .. } => assert_eq!(element, "header"),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
