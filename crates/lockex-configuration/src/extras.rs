use std::borrow::Cow;
use std::sync::Arc;

use lockex_normalize::ExtraName;

/// Manager of all extra decisions and settings history.
///
/// This is an Arc mostly just to avoid size bloat on things that contain these.
#[derive(Debug, Default, Clone)]
pub struct ExtrasSpecification(Arc<ExtrasSpecificationInner>);

#[derive(Debug, Default, Clone)]
pub struct ExtrasSpecificationInner {
    /// Extras to include.
    include: IncludeExtras,
    /// The "raw" flags/settings we were passed for diagnostics.
    history: ExtrasSpecificationHistory,
}

impl ExtrasSpecification {
    fn from_history(history: ExtrasSpecificationHistory) -> Self {
        let include = if history.all_extras {
            IncludeExtras::All
        } else {
            let mut extras = history.extras.clone();
            extras.sort();
            extras.dedup();
            IncludeExtras::Some(extras)
        };

        Self(Arc::new(ExtrasSpecificationInner { include, history }))
    }

    /// Create from raw CLI args.
    pub fn from_args(extras: Vec<ExtraName>, all_extras: bool) -> Self {
        Self::from_history(ExtrasSpecificationHistory { extras, all_extras })
    }

    /// Helper to make a spec from just a list of extras.
    pub fn from_extras(extras: Vec<ExtraName>) -> Self {
        Self::from_history(ExtrasSpecificationHistory {
            extras,
            ..Default::default()
        })
    }

    /// Helper to make a spec from just `--all-extras`.
    pub fn from_all_extras() -> Self {
        Self::from_history(ExtrasSpecificationHistory {
            all_extras: true,
            ..Default::default()
        })
    }
}

impl std::ops::Deref for ExtrasSpecification {
    type Target = ExtrasSpecificationInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ExtrasSpecificationInner {
    /// Returns `true` if the specification includes the given extra.
    pub fn contains(&self, extra: &ExtraName) -> bool {
        self.include.contains(extra)
    }

    /// Returns `true` if every extra is requested.
    pub fn is_all(&self) -> bool {
        matches!(self.include, IncludeExtras::All)
    }

    /// Filter the declared extras down to the requested ones.
    pub fn extra_names<'a, Names>(
        &'a self,
        all_names: Names,
    ) -> impl Iterator<Item = &'a ExtraName> + 'a
    where
        Names: Iterator<Item = &'a ExtraName> + 'a,
    {
        all_names.filter(move |name| self.contains(name))
    }

    /// Iterate over all extras the user explicitly asked for.
    pub fn explicit_names(&self) -> impl Iterator<Item = &ExtraName> {
        self.include.names()
    }

    /// Returns `true` if the specification will have no effect.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Get the raw history for diagnostics.
    pub fn history(&self) -> &ExtrasSpecificationHistory {
        &self.history
    }
}

/// Context about a [`ExtrasSpecification`][] that we've preserved for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ExtrasSpecificationHistory {
    pub extras: Vec<ExtraName>,
    pub all_extras: bool,
}

impl ExtrasSpecificationHistory {
    /// Returns all the CLI flags that this represents.
    ///
    /// If a flag was provided multiple times (e.g. `--extras a --extras b`) this will
    /// elide the arguments and just show the flag once.
    pub fn as_flags_pretty(&self) -> Vec<Cow<'_, str>> {
        let mut flags = vec![];
        if self.all_extras {
            flags.push(Cow::Borrowed("--all-extras"));
        }
        match &*self.extras {
            [] => {}
            [extra] => flags.push(Cow::Owned(format!("--extras {extra}"))),
            [..] => flags.push(Cow::Borrowed("--extras")),
        }
        flags
    }
}

#[derive(Debug, Clone)]
pub enum IncludeExtras {
    /// Include dependencies from the specified extras.
    Some(Vec<ExtraName>),
    /// A marker indicates including dependencies from all extras.
    All,
}

impl IncludeExtras {
    /// Returns `true` if the specification includes the given extra.
    pub fn contains(&self, extra: &ExtraName) -> bool {
        match self {
            Self::Some(extras) => extras.contains(extra),
            Self::All => true,
        }
    }

    /// Returns `true` if the specification will have no effect.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Some(extras) => extras.is_empty(),
            // Conceptually they're *trying* to have an effect, so treat it as one.
            Self::All => false,
        }
    }

    /// Iterate over all extras referenced in the [`IncludeExtras`].
    pub fn names(&self) -> std::slice::Iter<'_, ExtraName> {
        match self {
            Self::Some(extras) => extras.iter(),
            Self::All => [].iter(),
        }
    }
}

impl Default for IncludeExtras {
    fn default() -> Self {
        Self::Some(Vec::new())
    }
}
