use std::collections::BTreeSet;
use std::str::FromStr;

use insta::assert_snapshot;
use pep440_rs::Version;
use test_case::test_case;

use lockex_normalize::ExtraName;

use crate::{Condition, MarkerEnvironment};

fn parse(markers: &str) -> Condition {
    Condition::from_str(markers).unwrap()
}

fn extras(names: &[&str]) -> BTreeSet<ExtraName> {
    names
        .iter()
        .map(|name| ExtraName::from_str(name).unwrap())
        .collect()
}

fn linux() -> MarkerEnvironment {
    MarkerEnvironment {
        implementation_name: "cpython".to_string(),
        implementation_version: "3.10.4".to_string(),
        os_name: "posix".to_string(),
        platform_machine: "x86_64".to_string(),
        platform_python_implementation: "CPython".to_string(),
        platform_release: "6.1.0".to_string(),
        platform_system: "Linux".to_string(),
        platform_version: "#1 SMP".to_string(),
        python_full_version: Version::from_str("3.10.4").unwrap(),
        sys_platform: "linux".to_string(),
    }
}

#[test_case(
    r#"python_version >= "3.6" and python_version < "4.0""#,
    r#"python_version >= "3.6" and python_version < "4.0""#;
    "minor range"
)]
#[test_case(
    r#"python_version == "2.7" or python_version >= "3.6" and python_version < "4.0""#,
    r#"python_version == "2.7" or python_version >= "3.6" and python_version < "4.0""#;
    "disjoint ranges"
)]
#[test_case(
    "python_version >= '2.7' and python_version != '3.0' and python_version != '3.1'",
    r#"python_version >= "2.7" and python_version != "3.0" and python_version != "3.1""#;
    "excluded minors"
)]
#[test_case(
    r#"sys_platform == "win32" and python_version < "3.7""#,
    r#"python_version < "3.7" and sys_platform == "win32""#;
    "python first"
)]
#[test_case(
    r#"python_full_version >= "3.6.2" and python_version < "4.0""#,
    r#"python_full_version >= "3.6.2" and python_version < "4.0""#;
    "full version"
)]
#[test_case(r#"python_version > "3.8""#, r#"python_version >= "3.9""#; "greater than minor")]
#[test_case(r#"python_version <= "3.8""#, r#"python_version < "3.9""#; "less equal minor")]
#[test_case(r#"python_version ~= "3.8""#, r#"python_version >= "3.8" and python_version < "4.0""#; "compatible minor")]
#[test_case(r#"python_version < "3.8.1""#, r#"python_version < "3.9""#; "less than patch")]
#[test_case(r#"python_version >= "3.8.1""#, r#"python_version >= "3.9""#; "greater equal patch")]
#[test_case(r#"python_version <= "3.8.0""#, r#"python_version < "3.9""#; "zero patch")]
#[test_case(r#"python_version ~= "3.8.0""#, r#"python_version == "3.8""#; "compatible patch")]
#[test_case(r#"python_version == "3.8.*""#, r#"python_version == "3.8""#; "wildcard")]
#[test_case(r#"python_full_version == "3.8.1""#, r#"python_full_version == "3.8.1""#; "singleton")]
#[test_case(r#"python_version in "3.8 3.9""#, r#"python_version >= "3.8" and python_version < "3.10""#; "version in")]
#[test_case("'3.8' > python_version", r#"python_version < "3.8""#; "reversed")]
#[test_case(r#"extra == "Foo_Bar""#, r#"extra == "foo-bar""#; "normalized extra")]
#[test_case(r#"os.name == "nt""#, r#"os_name == "nt""#; "deprecated key")]
#[test_case(
    r#"platform_system != "Windows" and platform_system != "Darwin""#,
    r#"platform_system != "Darwin" and platform_system != "Windows""#;
    "excluded values"
)]
#[test_case(
    r#"sys_platform == "linux" or sys_platform == "darwin""#,
    r#"sys_platform == "darwin" or sys_platform == "linux""#;
    "alternative values"
)]
#[test_case(
    r#"implementation_name == "cpython" and platform_release >= "5.0""#,
    r#"implementation_name == "cpython" and platform_release >= "5.0""#;
    "opaque comparison"
)]
#[test_case(r#""linux" in sys_platform"#, r#""linux" in sys_platform"#; "substring")]
#[test_case(
    r#"platform_machine ~= "1.2""#,
    r#"platform_machine >= "1.2" and platform_machine < "2""#;
    "compatible string"
)]
#[test_case(
    r#"(python_version < "3.8" or sys_platform == "win32") and extra == "test""#,
    r#"python_version < "3.8" and extra == "test" or sys_platform == "win32" and extra == "test""#;
    "parenthesized"
)]
fn display(markers: &str, expected: &str) {
    assert_eq!(parse(markers).to_string(), expected);
}

#[test]
fn trivial() {
    assert!(parse("").is_true());
    assert!(parse("   ").is_true());
    assert!(Condition::never().is_false());
    assert!(Condition::always().contents().is_none());
    assert_eq!(Condition::never().to_string(), "false");
    assert_eq!(Condition::always().to_string(), "true");
}

#[test]
fn complements() {
    for markers in [
        r#"python_version >= "3.8" and sys_platform == "linux""#,
        r#"python_version == "2.7" or python_version >= "3.6" and extra == "foo""#,
        r#"platform_release >= "5.0" or os_name != "nt""#,
    ] {
        let condition = parse(markers);
        assert!(condition.or(&condition.negate()).is_true(), "{markers}");
        assert!(condition.and(&condition.negate()).is_false(), "{markers}");
        let double = condition.negate().negate();
        assert!(double.is_subset(&condition) && condition.is_subset(&double), "{markers}");
    }
}

#[test]
fn negate() {
    assert_eq!(
        parse(r#"python_version >= "3.8""#).negate().to_string(),
        r#"python_version < "3.8""#
    );
    assert_eq!(
        parse(r#"sys_platform == "linux" and python_version >= "3.8""#)
            .negate()
            .to_string(),
        r#"python_version < "3.8" or sys_platform != "linux""#
    );
}

#[test]
fn merge_to_true() {
    assert!(parse(r#"python_version < "3.8" or python_version >= "3.8""#).is_true());
    assert!(parse(r#"sys_platform == "linux" or sys_platform != "linux""#).is_true());
    assert!(parse(r#"extra == "foo" or extra != "foo""#).is_true());
    assert!(
        parse(r#"python_version < "3.8" or python_version >= "3.8" and sys_platform == "linux""#)
            .or(&parse(r#"sys_platform != "linux""#))
            .is_true()
    );
}

#[test]
fn contradictions() {
    assert!(parse(r#"sys_platform == "linux" and sys_platform == "win32""#).is_false());
    assert!(parse(r#"python_version < "3.8" and python_version >= "3.9""#).is_false());
    assert!(parse(r#"extra == "foo" and extra != "foo""#).is_false());
}

#[test]
fn subset() {
    let newer = parse(r#"python_version >= "3.9""#);
    let older = parse(r#"python_version >= "3.8""#);
    assert!(newer.is_subset(&older));
    assert!(!older.is_subset(&newer));
    assert!(parse(r#"python_version >= "3.9" and sys_platform == "linux""#).is_subset(&older));
    assert!(Condition::never().is_subset(&older));
    assert!(older.is_subset(&Condition::always()));
}

#[test]
fn disjoint() {
    assert!(parse(r#"python_version < "3.8""#).is_disjoint(&parse(r#"python_version >= "3.8""#)));
    assert!(parse(r#"sys_platform == "win32""#).is_disjoint(&parse(r#"sys_platform != "win32""#)));
    assert!(!parse(r#"python_version < "3.8""#).is_disjoint(&parse(r#"sys_platform == "win32""#)));
}

#[test]
fn without_extras() {
    let condition = parse(r#"python_version >= "3.8" and extra == "foo""#);
    assert_eq!(
        condition.without_extras().to_string(),
        r#"python_version >= "3.8""#
    );
    assert!(parse(r#"extra == "foo""#).without_extras().is_true());
}

#[test]
fn simplify_extras() {
    let condition = parse(r#"extra == "foo" or sys_platform == "win32""#);
    assert!(condition.simplify_extras(&extras(&["foo"])).is_true());
    assert_eq!(
        condition.simplify_extras(&extras(&[])).to_string(),
        r#"sys_platform == "win32""#
    );
    assert!(parse(r#"extra != "foo""#).simplify_extras(&extras(&[])).is_true());
    assert!(
        parse(r#"extra == "foo" and extra == "bar""#)
            .simplify_extras(&extras(&["foo"]))
            .is_false()
    );
}

#[test]
fn extra_names() {
    let condition = parse(r#"extra == "foo" or extra == "bar" and python_version < "3.8""#);
    let names = condition.extra_names().map(ExtraName::as_str).collect::<BTreeSet<_>>();
    assert_eq!(names, BTreeSet::from(["bar", "foo"]));
}

#[test]
fn evaluate() {
    let env = linux();
    let foo = extras(&["foo"]).into_iter().collect::<Vec<_>>();
    assert!(parse(r#"python_version >= "3.8" and sys_platform == "linux""#).evaluate(&env, &[]));
    assert!(!parse(r#"python_version < "3.10""#).evaluate(&env, &[]));
    assert!(parse(r#"python_full_version >= "3.10.4""#).evaluate(&env, &[]));
    // `python_version` is `3.10`, which sorts below `3.10.1`.
    assert!(parse(r#"python_version < "3.10.1""#).evaluate(&env, &[]));
    assert!(!parse(r#"python_full_version < "3.10.1""#).evaluate(&env, &[]));
    assert!(parse(r#"platform_release >= "5.0""#).evaluate(&env, &[]));
    assert!(parse(r#""linux" in sys_platform"#).evaluate(&env, &[]));
    assert!(parse(r#"extra == "foo""#).evaluate(&env, &foo));
    assert!(!parse(r#"extra == "foo""#).evaluate(&env, &[]));
    assert!(!parse(r#"os_name == "nt""#).evaluate(&env, &[]));
}

#[test]
fn deserialize() {
    #[derive(Debug, serde::Deserialize)]
    struct Dependency {
        markers: Condition,
    }

    let dependency: Dependency = toml::from_str(r#"markers = 'python_version >= "3.8"'"#).unwrap();
    assert_eq!(dependency.markers.to_string(), r#"python_version >= "3.8""#);

    let err = toml::from_str::<Dependency>(r#"markers = 'python_version >= "three"'"#).unwrap_err();
    assert!(err.to_string().contains("Expected PEP 440 version"));
}

#[test]
fn error_end_of_input() {
    let err = Condition::from_str(r#"python_version >= "3.8" and"#).unwrap_err();
    assert_snapshot!(err, @r#"
    Expected marker value, found end of marker
    python_version >= "3.8" and
                               ^
    "#);
}

#[test]
fn error_unknown_key() {
    let err = Condition::from_str(r#"foo == "bar""#).unwrap_err();
    assert_snapshot!(err, @r#"
    Expected a valid marker name, found 'foo'
    foo == "bar"
    ^^^
    "#);
}

#[test]
fn error_extra_operator() {
    let err = Condition::from_str(r#"extra >= "foo""#).unwrap_err();
    assert_snapshot!(err, @r#"
    The extra marker only supports `==` and `!=`, found `>=`
    extra >= "foo"
    ^^^^^^^^^^^^^^
    "#);
}

#[test]
fn error_trailing() {
    let err = Condition::from_str(r#"python_version >= "3.8" )"#).unwrap_err();
    assert_snapshot!(err, @r#"
    Unexpected character ')', expected 'and', 'or' or end of input
    python_version >= "3.8" )
                            ^
    "#);
}
