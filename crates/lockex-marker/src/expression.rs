use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Those environment markers with a PEP 440 version as value such as `python_version`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MarkerValueVersion {
    /// `python_version`
    PythonVersion,
    /// `python_full_version`
    PythonFullVersion,
}

impl Display for MarkerValueVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::PythonVersion => f.write_str("python_version"),
            Self::PythonFullVersion => f.write_str("python_full_version"),
        }
    }
}

/// Those environment markers with an arbitrary string as value such as `sys_platform`.
///
/// The variant order is the order in which keys are rendered within a conjunction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MarkerValueString {
    /// `implementation_name`
    ImplementationName,
    /// `implementation_version`
    ImplementationVersion,
    /// `os_name`
    OsName,
    /// `platform_machine`
    PlatformMachine,
    /// `platform_python_implementation`
    PlatformPythonImplementation,
    /// `platform_release`
    PlatformRelease,
    /// `platform_system`
    PlatformSystem,
    /// `platform_version`
    PlatformVersion,
    /// `sys_platform`
    SysPlatform,
}

impl Display for MarkerValueString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ImplementationName => "implementation_name",
            Self::ImplementationVersion => "implementation_version",
            Self::OsName => "os_name",
            Self::PlatformMachine => "platform_machine",
            Self::PlatformPythonImplementation => "platform_python_implementation",
            Self::PlatformRelease => "platform_release",
            Self::PlatformSystem => "platform_system",
            Self::PlatformVersion => "platform_version",
            Self::SysPlatform => "sys_platform",
        })
    }
}

/// One side of a marker expression.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MarkerValue {
    /// Python version markers, compared as PEP 440 versions.
    MarkerEnvVersion(MarkerValueVersion),
    /// Environment markers compared as strings.
    MarkerEnvString(MarkerValueString),
    /// `extra`
    Extra,
    /// A quoted literal.
    QuotedString(String),
}

impl FromStr for MarkerValue {
    type Err = String;

    /// Deprecated dotted names from PEP 345 are accepted and map to their modern spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "python_version" => Self::MarkerEnvVersion(MarkerValueVersion::PythonVersion),
            "python_full_version" => Self::MarkerEnvVersion(MarkerValueVersion::PythonFullVersion),
            "implementation_name" => Self::MarkerEnvString(MarkerValueString::ImplementationName),
            "implementation_version" => {
                Self::MarkerEnvString(MarkerValueString::ImplementationVersion)
            }
            "os_name" | "os.name" => Self::MarkerEnvString(MarkerValueString::OsName),
            "platform_machine" | "platform.machine" => {
                Self::MarkerEnvString(MarkerValueString::PlatformMachine)
            }
            "platform_python_implementation"
            | "platform.python_implementation"
            | "python_implementation" => {
                Self::MarkerEnvString(MarkerValueString::PlatformPythonImplementation)
            }
            "platform_release" => Self::MarkerEnvString(MarkerValueString::PlatformRelease),
            "platform_system" => Self::MarkerEnvString(MarkerValueString::PlatformSystem),
            "platform_version" | "platform.version" => {
                Self::MarkerEnvString(MarkerValueString::PlatformVersion)
            }
            "sys_platform" | "sys.platform" => {
                Self::MarkerEnvString(MarkerValueString::SysPlatform)
            }
            "extra" => Self::Extra,
            _ => return Err(format!("Invalid key: {s}")),
        };
        Ok(value)
    }
}

impl Display for MarkerValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkerEnvVersion(marker_value_version) => marker_value_version.fmt(f),
            Self::MarkerEnvString(marker_value_string) => marker_value_string.fmt(f),
            Self::Extra => f.write_str("extra"),
            Self::QuotedString(value) => write!(f, "\"{value}\""),
        }
    }
}

/// How to compare the two sides of a marker expression.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MarkerOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessEqual,
    /// `~=`
    TildeEqual,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl MarkerOperator {
    /// The operator with its operands swapped, e.g. `'3.8' < python_version` becomes
    /// `python_version > '3.8'`.
    ///
    /// Returns `None` for `in` and `not in`, which are not symmetric.
    pub(crate) fn invert(self) -> Option<Self> {
        Some(match self {
            Self::LessThan => Self::GreaterThan,
            Self::LessEqual => Self::GreaterEqual,
            Self::GreaterThan => Self::LessThan,
            Self::GreaterEqual => Self::LessEqual,
            Self::Equal => Self::Equal,
            Self::NotEqual => Self::NotEqual,
            Self::TildeEqual | Self::In | Self::NotIn => return None,
        })
    }

    /// The operator matching exactly when this one does not.
    ///
    /// `~=` has no single-operator negation.
    pub(crate) fn negate(self) -> Option<Self> {
        Some(match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::LessThan => Self::GreaterEqual,
            Self::LessEqual => Self::GreaterThan,
            Self::GreaterThan => Self::LessEqual,
            Self::GreaterEqual => Self::LessThan,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
            Self::TildeEqual => return None,
        })
    }
}

impl FromStr for MarkerOperator {
    type Err = String;

    /// `===` is accepted as a plain equality check.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "==" | "===" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessEqual,
            "~=" => Self::TildeEqual,
            "in" => Self::In,
            other => return Err(format!("Invalid comparator: {other}")),
        };
        Ok(value)
    }
}

impl Display for MarkerOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::TildeEqual => "~=",
            Self::In => "in",
            Self::NotIn => "not in",
        })
    }
}

/// A comparison the condition algebra keeps verbatim, such as `platform_release >= "5.0"` or
/// `"linux" in sys_platform`.
///
/// Such expressions are treated as independent boolean atoms.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct MarkerExpression {
    pub(crate) l_value: MarkerValue,
    pub(crate) operator: MarkerOperator,
    pub(crate) r_value: MarkerValue,
}

impl MarkerExpression {
    pub(crate) fn new(l_value: MarkerValue, operator: MarkerOperator, r_value: MarkerValue) -> Self {
        Self {
            l_value,
            operator,
            r_value,
        }
    }

    /// The same expression with the operator negated, if one exists.
    pub(crate) fn negate(&self) -> Option<Self> {
        Some(Self {
            l_value: self.l_value.clone(),
            operator: self.operator.negate()?,
            r_value: self.r_value.clone(),
        })
    }
}

impl Display for MarkerExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.l_value, self.operator, self.r_value)
    }
}
