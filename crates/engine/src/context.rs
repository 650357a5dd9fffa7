//! Typed workflow context.
//!
//! Each workflow definition owns one record type with an optional field per
//! context key. Steps read earlier contributions through plain field accesses
//! and contribute by returning a partial record holding only their keys; the
//! engine merges contributions in declaration order and never removes a key.
//!
//! The [`workflow_context!`](crate::workflow_context) macro generates the record,
//! its key enum, and the [`WorkflowContext`] implementation from one declaration.

use std::{collections::BTreeSet, fmt, hash::Hash};

/// Contract between the engine and a workflow's typed context record.
pub trait WorkflowContext: Clone + Default + fmt::Debug + Send + Sync {
    /// Enumerates every key the record can hold.
    type Key: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Keys currently holding a value.
    fn present_keys(&self) -> BTreeSet<Self::Key>;

    /// Overwrites every key present in `contribution`; absent keys are left untouched.
    fn merge(&mut self, contribution: Self);
}

/// Declares a typed workflow context.
///
/// ```rust
/// nimbus_engine::workflow_context! {
///     /// Context of a tiny two-key wizard.
///     pub struct DemoContext keyed by DemoKey {
///         name: String => Name,
///         count: u32 => Count,
///     }
/// }
///
/// use nimbus_engine::WorkflowContext;
///
/// let mut context = DemoContext::default();
/// context.merge(DemoContext { name: Some("web".into()), ..Default::default() });
/// assert_eq!(context.present_keys().into_iter().collect::<Vec<_>>(), vec![DemoKey::Name]);
/// assert_eq!(DemoKey::Count.to_string(), "count");
/// ```
#[macro_export]
macro_rules! workflow_context {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident keyed by $key:ident {
            $( $(#[$field_meta:meta])* $field:ident : $ty:ty => $variant:ident ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$field_meta])* pub $field: ::std::option::Option<$ty>, )*
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis enum $key {
            $( $variant, )*
        }

        impl $key {
            /// Every key in declaration order.
            pub const ALL: &'static [$key] = &[ $( $key::$variant, )* ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $key::$variant => stringify!($field), )*
                }
            }
        }

        impl ::std::fmt::Display for $key {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $crate::WorkflowContext for $name {
            type Key = $key;

            fn present_keys(&self) -> ::std::collections::BTreeSet<$key> {
                let mut keys = ::std::collections::BTreeSet::new();
                $(
                    if self.$field.is_some() {
                        keys.insert($key::$variant);
                    }
                )*
                keys
            }

            fn merge(&mut self, contribution: Self) {
                $(
                    if let ::std::option::Option::Some(value) = contribution.$field {
                        self.$field = ::std::option::Option::Some(value);
                    }
                )*
            }
        }
    };
}
