//! Process-wide configuration.
//!
//! The single option of the front end is `auto_data_mapping`: when set, a
//! computation's access relation follows its schedule (storage follows
//! scheduling); when cleared, the user is responsible for binding every
//! schedulable computation before lowering.
//!
//! Defaults are installed once, before the first function is constructed,
//! and are read lock-free afterwards. Each [`crate::ir::Function`] captures
//! the defaults (or an explicit [`Options`] value) at construction time.

use once_cell::sync::OnceCell;

/// Front-end options, captured per function at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Re-derive access relations from the schedule after every schedule
    /// transformation, and derive one at lowering time for computations
    /// that were never bound.
    pub auto_data_mapping: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_data_mapping: true,
        }
    }
}

static DEFAULTS: OnceCell<Options> = OnceCell::new();

/// Install the process-wide default options.
///
/// May be called at most once, before the first function is constructed.
/// Returns `false` if defaults were already installed (the call has no
/// effect in that case).
pub fn set_default_options(options: Options) -> bool {
    DEFAULTS.set(options).is_ok()
}

/// Read the process-wide default options.
pub fn default_options() -> Options {
    DEFAULTS.get().copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(default_options().auto_data_mapping);
    }
}
