//! The `define_module!` registration macro.

/// Creates a [`ModuleDescriptor`](crate::ModuleDescriptor).
///
/// # Syntax
///
/// ```rust,ignore
/// use hallo::prelude::*;
///
/// pub static DICE: ModuleDescriptor = define_module! {
///     name: "dice",
///     // Built with `Default` for every call
///     functions: [Roll, Coin],
///     // Loaded once via `PersistentFunction::load`, saved on unload
///     persistent: [HighScores],
/// };
/// ```
///
/// Either list may be omitted. The class name recorded for each function is
/// the type path as written, so `Roll` is gated by the right `function_Roll`.
#[macro_export]
macro_rules! define_module {
    (
        name: $name:literal
        $(, functions: [$($func:ident),* $(,)?])?
        $(, persistent: [$($pers:ident),* $(,)?])?
        $(,)?
    ) => {
        $crate::module::ModuleDescriptor {
            name: $name,
            functions: &[
                $($(
                    $crate::module::FunctionDescriptor::transient::<$func>(::std::stringify!($func)),
                )*)?
                $($(
                    $crate::module::FunctionDescriptor::persistent::<$pers>(::std::stringify!($pers)),
                )*)?
            ],
        }
    };
}
