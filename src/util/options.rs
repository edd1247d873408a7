//! Engine tuning options.
//!
//! Options carry typed defaults and per-option validators, and can be set
//! from the environment: a variable named `WEAKMARK_<OPTION_NAME>` (for
//! example `WEAKMARK_EDGE_TABLE_CAPACITY`) overrides the default when
//! [`Options::default`] builds the set. None of the options change what
//! survives a collection; they tune capacities and diagnostics only.

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($(#[$attr:meta])* $name:ident: $type:ty [$validator:expr] = $default:expr),* $(,)?) => [
        pub struct Options {
            $($(#[$attr])* pub $name: $type),*
        }
        impl Options {
            /// Set one option from its lower-case name and a string value.
            /// Returns whether the value parsed and validated; on failure
            /// the previous value is kept.
            pub fn set_from_str(&mut self, name: &str, value: &str) -> bool {
                match name {
                    $(stringify!($name) => if let Ok(ref value) = value.parse::<$type>() {
                        let validate = $validator;
                        if validate(value) {
                            self.$name = value.clone();
                            true
                        } else {
                            warn!("unable to set {}={:?}: invalid value", name, value);
                            false
                        }
                    } else {
                        warn!("unable to set {}={:?}: cannot parse value", name, value);
                        false
                    },)*
                    _ => {
                        warn!("unknown option {}", name);
                        false
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Options {
                    $($name: $default),*
                };
                const PREFIX: &str = "WEAKMARK_";
                for (key, value) in std::env::vars() {
                    if let Some(rest) = key.strip_prefix(PREFIX) {
                        let name = rest.to_lowercase();
                        match name.as_str() {
                            $(stringify!($name) => {
                                options.set_from_str(&name, &value);
                            })*
                            _ => {}
                        }
                    }
                }
                options
            }
        }
    ]
}

options! {
    /// Initial bucket capacity of a zone's ephemeron edge table; the table
    /// shrinks back to this when a mark phase begins.
    edge_table_capacity:     usize [always_valid] = 16,
    /// Initial slot capacity of a zone's map arena.
    map_arena_capacity:      usize [|v: &usize| *v > 0] = 8,
    /// Number of weak-marking propagation passes over one zone after which
    /// non-convergence is logged. Diagnostic only.
    fixpoint_warn_threshold: usize [|v: &usize| *v > 0] = 64,
}
