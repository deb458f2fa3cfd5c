//! Declarative macros to reduce boilerplate across the raplcap codebase

/// Define an enum with automatic `name()`, `all()` and `from_name()` implementations
///
/// # Example
/// ```
/// use raplcap_msr::named_enum;
///
/// named_enum! {
///     pub enum Domain {
///         Package => "PACKAGE",
///         Dram => "DRAM",
///     }
/// }
///
/// let domain = Domain::Dram;
/// assert_eq!(domain.name(), "DRAM");
/// assert_eq!(Domain::all().len(), 2);
/// assert_eq!(Domain::from_name("package"), Some(Domain::Package));
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - A `name(&self) -> &'static str` method
/// - An `all() -> &'static [Self]` method, in declaration order
/// - A case-insensitive `from_name(&str) -> Option<Self>` lookup
/// - A `Display` impl printing the name
#[macro_export]
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> &'static [$name] {
                &[$($name::$variant,)*]
            }

            pub fn from_name(s: &str) -> Option<$name> {
                Self::all()
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
