/// Configuration macros
///
/// `config_struct!` defines a configuration section with its defaults in a
/// single declaration. It generates:
/// - The struct with public fields
/// - A `Default` implementation with the listed values
/// - Serde support with `#[serde(default)]`, so missing keys fall back
///
/// ```ignore
/// config_struct! {
///     pub struct ViewsConfig {
///         refresh_ms: u64 = 500,
///         recent_events: usize = 12,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default, deny_unknown_fields)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
