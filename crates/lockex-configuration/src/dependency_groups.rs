use std::borrow::Cow;
use std::sync::Arc;

use lockex_normalize::{DEV_DEPENDENCIES, GroupName, MAIN_GROUP};

/// Manager of all dependency-group decisions and settings history.
///
/// This is an Arc mostly just to avoid size bloat on things that contain these.
#[derive(Debug, Default, Clone)]
pub struct DependencyGroups(Arc<DependencyGroupsInner>);

#[derive(Debug, Default, Clone)]
pub struct DependencyGroupsInner {
    /// Groups to include.
    include: IncludeGroups,
    /// Groups to exclude (always wins over include).
    exclude: Vec<GroupName>,
    /// Whether an `--only` flag was passed.
    only_groups: bool,
    /// The "raw" flags/settings we were passed for diagnostics.
    history: DependencyGroupsHistory,
}

impl DependencyGroups {
    /// Create from history.
    ///
    /// This is the "real" constructor, it's basically taking raw CLI flags but in
    /// a way that's a bit nicer for other constructors to use.
    fn from_history(history: DependencyGroupsHistory) -> Self {
        let DependencyGroupsHistory {
            dev,
            mut with,
            mut only,
            without,
            all_groups,
            mut defaults,
        } = history.clone();

        // The deprecated `--dev` flag is sugar for `--with dev`.
        if dev {
            with.push(DEV_DEPENDENCIES.clone());
        }

        // `with` and `only` both name groups to include, but `only` also drops the defaults.
        let only_groups = !only.is_empty();

        let include = if all_groups {
            // `--all-groups` together with `--with`, `--without` or `--only` is rejected at the
            // CLI level.
            IncludeGroups::All
        } else {
            with.append(&mut only);
            if !only_groups {
                with.append(&mut defaults);
            }
            with.sort();
            with.dedup();
            IncludeGroups::Some(with)
        };

        Self(Arc::new(DependencyGroupsInner {
            include,
            exclude: without,
            only_groups,
            history,
        }))
    }

    /// Create from raw CLI args.
    pub fn from_args(
        dev: bool,
        with: Vec<GroupName>,
        without: Vec<GroupName>,
        only: Vec<GroupName>,
        all_groups: bool,
    ) -> Self {
        Self::from_history(DependencyGroupsHistory {
            dev,
            with,
            only,
            without,
            all_groups,
            // This is unknown at CLI-time, use `.with_defaults(...)` to apply this later!
            defaults: Vec::new(),
        })
    }

    /// Helper to make a spec from just a `--with` group.
    pub fn from_group(group: GroupName) -> Self {
        Self::from_history(DependencyGroupsHistory {
            with: vec![group],
            ..Default::default()
        })
    }

    /// Helper to make a spec from just `--all-groups`.
    pub fn from_all_groups() -> Self {
        Self::from_history(DependencyGroupsHistory {
            all_groups: true,
            ..Default::default()
        })
    }

    /// Apply defaults to a base [`DependencyGroups`].
    ///
    /// Exports include only the `main` group unless told otherwise.
    pub fn with_defaults(&self, defaults: Vec<GroupName>) -> DependencyGroupsWithDefaults {
        let mut history = self.0.history.clone();
        history.defaults = defaults;

        DependencyGroupsWithDefaults {
            cur: Self::from_history(history),
            prev: self.clone(),
        }
    }

    /// Apply the default `main` group.
    pub fn with_main(&self) -> DependencyGroupsWithDefaults {
        self.with_defaults(vec![MAIN_GROUP.clone()])
    }
}

impl std::ops::Deref for DependencyGroups {
    type Target = DependencyGroupsInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DependencyGroupsInner {
    /// Returns `true` if the `main` group is not implicitly dropped by an `--only` flag.
    pub fn prod(&self) -> bool {
        !self.only_groups
    }

    /// Returns `true` if the specification includes the given group.
    pub fn contains(&self, group: &GroupName) -> bool {
        // exclude always trumps include
        !self.exclude.contains(group) && self.include.contains(group)
    }

    /// Filter the declared groups down to the selected ones.
    pub fn group_names<'a, Names>(
        &'a self,
        all_names: Names,
    ) -> impl Iterator<Item = &'a GroupName> + 'a
    where
        Names: Iterator<Item = &'a GroupName> + 'a,
    {
        all_names.filter(move |name| self.contains(name))
    }

    /// Iterate over all groups the user explicitly asked for on the CLI.
    pub fn explicit_names(&self) -> impl Iterator<Item = &GroupName> {
        let DependencyGroupsHistory {
            // `dev` may legitimately be referenced without being declared.
            dev: _,
            with,
            only,
            without,
            all_groups: _,
            defaults: _,
        } = self.history();

        with.iter().chain(without).chain(only)
    }

    /// Returns `true` if every group is selected.
    pub fn is_all(&self) -> bool {
        matches!(self.include, IncludeGroups::All) && self.exclude.is_empty()
    }

    /// Get the raw history for diagnostics.
    pub fn history(&self) -> &DependencyGroupsHistory {
        &self.history
    }
}

/// Context about a [`DependencyGroups`][] that we've preserved for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct DependencyGroupsHistory {
    pub dev: bool,
    pub with: Vec<GroupName>,
    pub only: Vec<GroupName>,
    pub without: Vec<GroupName>,
    pub all_groups: bool,
    pub defaults: Vec<GroupName>,
}

impl DependencyGroupsHistory {
    /// Returns all the CLI flags that this represents.
    ///
    /// If a flag was provided multiple times (e.g. `--with a --with b`) this will
    /// elide the arguments and just show the flag once (e.g. just yield "--with").
    pub fn as_flags_pretty(&self) -> Vec<Cow<'_, str>> {
        let DependencyGroupsHistory {
            dev,
            with,
            only,
            without,
            all_groups,
            // defaults aren't CLI flags!
            defaults: _,
        } = self;

        let mut flags = vec![];
        if *all_groups {
            flags.push(Cow::Borrowed("--all-groups"));
        }
        if *dev {
            flags.push(Cow::Borrowed("--dev"));
        }
        for (flag, groups) in [("--with", with), ("--only", only), ("--without", without)] {
            match &**groups {
                [] => {}
                [group] => flags.push(Cow::Owned(format!("{flag} {group}"))),
                [..] => flags.push(Cow::Borrowed(flag)),
            }
        }
        flags
    }
}

/// A trivial newtype wrapped around [`DependencyGroups`][] that signifies "defaults applied".
///
/// It includes a copy of the previous semantics to provide info on if
/// the group being a default actually affected it being enabled.
#[derive(Debug, Clone)]
pub struct DependencyGroupsWithDefaults {
    /// The active semantics
    cur: DependencyGroups,
    /// The semantics before defaults were applied
    prev: DependencyGroups,
}

impl DependencyGroupsWithDefaults {
    /// Returns `true` if the group was enabled, and *only* because it was a default.
    pub fn contains_because_default(&self, group: &GroupName) -> bool {
        self.cur.contains(group) && !self.prev.contains(group)
    }
}

impl std::ops::Deref for DependencyGroupsWithDefaults {
    type Target = DependencyGroups;
    fn deref(&self) -> &Self::Target {
        &self.cur
    }
}

#[derive(Debug, Clone)]
pub enum IncludeGroups {
    /// Include dependencies from the specified groups.
    Some(Vec<GroupName>),
    /// A marker indicates including dependencies from all groups.
    All,
}

impl IncludeGroups {
    /// Returns `true` if the specification includes the given group.
    pub fn contains(&self, group: &GroupName) -> bool {
        match self {
            Self::Some(groups) => groups.contains(group),
            Self::All => true,
        }
    }
}

impl Default for IncludeGroups {
    fn default() -> Self {
        Self::Some(Vec::new())
    }
}
