//! Data-driven rule tables applied to the resource graph.
//!
//! Two tables exist:
//! - [`exclusion`]: resources to drop entirely
//! - [`strip`]: fields to remove from resources that stay
//!
//! Both ship with built-in entries and can be extended (or replaced) from
//! the configuration file without code changes.

pub mod condition;
pub mod exclusion;
pub mod strip;

pub use condition::PropertyCondition;
pub use exclusion::{
    ExcludedResource, ExclusionRule, ExclusionRuleSpec, FilterOutcome, builtin_exclusions, filter,
};
pub use strip::{StripRule, StripRuleSpec, builtin_strips, strip};

use crate::core::CloneError;

/// Compiled exclusion and strip tables.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Exclusion rules in evaluation order
    pub exclusions: Vec<ExclusionRule>,
    /// Strip rules in evaluation order
    pub strips: Vec<StripRule>,
}

impl RuleSet {
    /// Compile the built-in tables plus any extra rules.
    ///
    /// With `replace_builtin` set, only the extra rules are used.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ConfigError`] if any rule fails to compile.
    pub fn build(
        extra_exclusions: &[ExclusionRuleSpec],
        extra_strips: &[StripRuleSpec],
        replace_builtin: bool,
    ) -> Result<Self, CloneError> {
        let (mut exclusion_specs, mut strip_specs) = if replace_builtin {
            (Vec::new(), Vec::new())
        } else {
            (builtin_exclusions(), builtin_strips())
        };
        exclusion_specs.extend_from_slice(extra_exclusions);
        strip_specs.extend_from_slice(extra_strips);

        Ok(Self {
            exclusions: exclusion_specs
                .into_iter()
                .map(ExclusionRule::compile)
                .collect::<Result<_, _>>()?,
            strips: strip_specs.into_iter().map(StripRule::compile).collect::<Result<_, _>>()?,
        })
    }

    /// The built-in tables only.
    ///
    /// # Errors
    ///
    /// Only fails if a built-in pattern is broken.
    pub fn builtin() -> Result<Self, CloneError> {
        Self::build(&[], &[], false)
    }
}
