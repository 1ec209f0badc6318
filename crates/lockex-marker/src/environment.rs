use std::str::FromStr;

use pep440_rs::Version;

use crate::python::bump;
use crate::{MarkerExpression, MarkerOperator, MarkerValue, MarkerValueString, MarkerValueVersion};

/// The values of the PEP 508 environment markers for a concrete interpreter and platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarkerEnvironment {
    pub implementation_name: String,
    pub implementation_version: String,
    pub os_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,
    pub platform_release: String,
    pub platform_system: String,
    pub platform_version: String,
    pub python_full_version: Version,
    pub sys_platform: String,
}

impl MarkerEnvironment {
    /// The `major.minor` Python version.
    pub fn python_version(&self) -> Version {
        Version::new(self.python_full_version.release().iter().take(2))
    }

    pub fn get_string(&self, key: MarkerValueString) -> &str {
        match key {
            MarkerValueString::ImplementationName => &self.implementation_name,
            MarkerValueString::ImplementationVersion => &self.implementation_version,
            MarkerValueString::OsName => &self.os_name,
            MarkerValueString::PlatformMachine => &self.platform_machine,
            MarkerValueString::PlatformPythonImplementation => {
                &self.platform_python_implementation
            }
            MarkerValueString::PlatformRelease => &self.platform_release,
            MarkerValueString::PlatformSystem => &self.platform_system,
            MarkerValueString::PlatformVersion => &self.platform_version,
            MarkerValueString::SysPlatform => &self.sys_platform,
        }
    }

    fn resolve(&self, value: &MarkerValue) -> String {
        match value {
            MarkerValue::MarkerEnvVersion(MarkerValueVersion::PythonVersion) => {
                self.python_version().to_string()
            }
            MarkerValue::MarkerEnvVersion(MarkerValueVersion::PythonFullVersion) => {
                self.python_full_version.to_string()
            }
            MarkerValue::MarkerEnvString(key) => self.get_string(*key).to_string(),
            MarkerValue::Extra => String::new(),
            MarkerValue::QuotedString(value) => value.clone(),
        }
    }

    /// Evaluate a comparison that the condition algebra keeps verbatim.
    ///
    /// Both sides are compared as versions when both parse as one, and as strings otherwise.
    /// Ordering comparisons between non-versions never match.
    pub(crate) fn evaluate_expression(&self, expression: &MarkerExpression) -> bool {
        let l_string = self.resolve(&expression.l_value);
        let r_string = self.resolve(&expression.r_value);

        match expression.operator {
            MarkerOperator::In => return r_string.contains(&l_string),
            MarkerOperator::NotIn => return !r_string.contains(&l_string),
            _ => {}
        }

        if let (Ok(l_version), Ok(r_version)) =
            (Version::from_str(&l_string), Version::from_str(&r_string))
        {
            return match expression.operator {
                MarkerOperator::Equal => l_version == r_version,
                MarkerOperator::NotEqual => l_version != r_version,
                MarkerOperator::GreaterThan => l_version > r_version,
                MarkerOperator::GreaterEqual => l_version >= r_version,
                MarkerOperator::LessThan => l_version < r_version,
                MarkerOperator::LessEqual => l_version <= r_version,
                MarkerOperator::TildeEqual => {
                    let release = r_version.release();
                    release.len() >= 2
                        && l_version >= r_version
                        && l_version < bump(&release[..release.len() - 1])
                }
                MarkerOperator::In | MarkerOperator::NotIn => unreachable!(),
            };
        }

        match expression.operator {
            MarkerOperator::Equal => l_string == r_string,
            MarkerOperator::NotEqual => l_string != r_string,
            _ => false,
        }
    }
}
