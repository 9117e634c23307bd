//! `traced_test!`: declare `#[test]` functions that run inside a [`TestCase`]
//!
//! [`TestCase`]: crate::TestCase

/// Declare one or more tests wrapped in a [`TestCase`](crate::TestCase)
/// named `module_path::fn_name`.
///
/// Tests returning `Result` are reported `FAILED` when they return `Err`.
///
/// ```ignore
/// tracelog_core::traced_test! {
///     fn test_login() {
///         tracelog_core::facade::info("logging in");
///     }
///
///     fn test_profile() -> anyhow::Result<()> {
///         tracelog_core::facade::info("loading profile");
///         Ok(())
///     }
/// }
/// ```
#[macro_export]
macro_rules! traced_test {
    () => {};

    ($(#[$meta:meta])* fn $name:ident() -> $ret:ty $body:block $($rest:tt)*) => {
        $(#[$meta])*
        #[test]
        fn $name() -> $ret {
            let case = $crate::TestCase::begin(concat!(module_path!(), "::", stringify!($name)));
            let result: $ret = (|| -> $ret { $body })();
            if result.is_err() {
                case.set_status($crate::TestStatus::Failed);
            }
            result
        }
        $crate::traced_test! { $($rest)* }
    };

    ($(#[$meta:meta])* fn $name:ident() $body:block $($rest:tt)*) => {
        $(#[$meta])*
        #[test]
        fn $name() {
            let _case = $crate::TestCase::begin(concat!(module_path!(), "::", stringify!($name)));
            $body
        }
        $crate::traced_test! { $($rest)* }
    };
}
