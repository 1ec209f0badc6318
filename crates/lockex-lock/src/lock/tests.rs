use std::error::Error;

use indoc::indoc;
use insta::assert_debug_snapshot;

use lockex_normalize::{GroupName, PackageName};

use super::{Lock, PackageMarkers};

const LOCK: &str = indoc! {r#"
    [[package]]
    name = "bar"
    version = "1.0"
    description = ""
    optional = false
    python-versions = "<3.9"
    groups = ["main"]
    markers = 'python_version < "3.9"'
    files = [
        {file = "bar-1.0-py3-none-any.whl", hash = "sha256:aaa"},
        {file = "bar-1.0.tar.gz", hash = "sha256:bbb"},
    ]

    [package.dependencies]
    baz = "1"

    [[package]]
    name = "Bar"
    version = "2.0"
    description = ""
    optional = false
    python-versions = ">=3.9"
    groups = ["main", "dev"]
    markers = {main = 'python_version >= "3.9"', dev = 'python_version >= "3.9" and sys_platform == "linux"'}
    files = []

    [package.dependencies]
    baz = {version = "2", markers = "sys_platform != 'win32'"}
    colorama = {version = ">=0.4", optional = true}

    [package.extras]
    color = ["colorama (>=0.4)"]

    [[package]]
    name = "custom"
    version = "0.1.0"
    description = ""
    optional = true
    python-versions = "*"
    groups = ["main"]
    files = [
        {file = "custom-0.1.0.tar.gz", hash = "md5:ccc"},
    ]

    [package.source]
    type = "legacy"
    url = "https://example.com/simple"
    reference = "private"

    [[package]]
    name = "project"
    version = "0.1.0"
    description = ""
    optional = false
    python-versions = "^3.8"
    develop = true
    groups = ["main"]
    files = []

    [package.source]
    type = "directory"
    url = "../project"

    [[package]]
    name = "vendored"
    version = "3.1.4"
    description = ""
    optional = false
    python-versions = "*"
    groups = ["main"]
    files = []

    [package.source]
    type = "git"
    url = "https://github.com/org/vendored.git"
    reference = "main"
    resolved_reference = "0123abcd"
    subdirectory = "lib"

    [extras]
    color = ["custom"]

    [metadata]
    lock-version = "2.1"
    python-versions = "^3.8"
    content-hash = "abc123"
"#};

fn group(name: &str) -> GroupName {
    name.parse().unwrap()
}

fn find<'a>(lock: &'a Lock, name: &str, version: &str) -> &'a super::LockedPackage {
    lock.packages()
        .iter()
        .find(|package| {
            package.name().as_str() == name && package.version().to_string() == version
        })
        .unwrap()
}

#[test]
fn packages() {
    let lock = Lock::from_toml(LOCK).unwrap();
    assert_eq!(lock.lock_version().to_string(), "2.1");
    assert!(lock.is_locked_groups_and_markers());
    assert_eq!(lock.content_hash(), Some("abc123"));
    assert_eq!(lock.python_versions().to_specifiers(), ">=3.8,<4");

    let summary = lock
        .packages()
        .iter()
        .map(|package| {
            format!(
                "{} from {} (python {}, develop: {}, optional: {}, files: {})",
                package.id(),
                package.source(),
                package.python_versions(),
                package.develop(),
                package.optional(),
                package.files().len(),
            )
        })
        .collect::<Vec<_>>();
    assert_debug_snapshot!(summary, @r#"
    [
        "bar==1.0 from registry (python <3.9, develop: false, optional: false, files: 2)",
        "bar==2.0 from registry (python >=3.9, develop: false, optional: false, files: 0)",
        "custom==0.1.0 from private (https://example.com/simple) (python *, develop: false, optional: true, files: 1)",
        "project==0.1.0 from ../project (python ^3.8, develop: true, optional: false, files: 0)",
        "vendored==3.1.4 from git+https://github.com/org/vendored.git@0123abcd#subdirectory=lib (python *, develop: false, optional: false, files: 0)",
    ]
    "#);
}

#[test]
fn dependencies_and_extras() {
    let lock = Lock::from_toml(LOCK).unwrap();

    let bar = find(&lock, "bar", "2.0");
    let dependencies = bar
        .dependencies()
        .iter()
        .map(|requirement| format!("{requirement} (optional: {})", requirement.optional))
        .collect::<Vec<_>>();
    assert_debug_snapshot!(dependencies, @r#"
    [
        "baz (2) ; sys_platform != \"win32\" (optional: false)",
        "colorama (>=0.4) (optional: true)",
    ]
    "#);

    let colorama = PackageName::from_owned("colorama".to_string()).unwrap();
    assert_eq!(
        bar.extras().values().next().map(Vec::as_slice),
        Some([colorama].as_slice())
    );
    assert_eq!(
        lock.extras()
            .values()
            .flatten()
            .map(PackageName::as_str)
            .collect::<Vec<_>>(),
        ["custom"]
    );
}

#[test]
fn grouped_markers() {
    let lock = Lock::from_toml(LOCK).unwrap();

    let bar = find(&lock, "bar", "2.0");
    let PackageMarkers::Groups(groups) = bar.markers() else {
        panic!("expected markers per group");
    };
    assert_eq!(groups.len(), 2);

    let main = bar.markers().for_groups(|name| *name == group("main"));
    assert_eq!(main.to_string(), r#"python_version >= "3.9""#);

    let dev = bar.markers().for_groups(|name| *name == group("dev"));
    assert_eq!(
        dev.to_string(),
        r#"python_version >= "3.9" and sys_platform == "linux""#
    );

    // None of the package's groups is selected, so all of them apply.
    let docs = bar.markers().for_groups(|name| *name == group("docs"));
    assert_eq!(docs.to_string(), r#"python_version >= "3.9""#);

    let older = find(&lock, "bar", "1.0");
    assert_eq!(
        older.markers().for_groups(|_| true).to_string(),
        r#"python_version < "3.9""#
    );
    assert!(older.files()[0].is_wheel());
    assert!(!older.files()[1].is_wheel());
}

#[test]
fn legacy_files() {
    let lock = Lock::from_toml(indoc! {r#"
        [[package]]
        name = "foo"
        version = "1.0"
        description = ""
        category = "main"
        optional = false
        python-versions = "*"

        [metadata]
        python-versions = "*"
        content-hash = "123"

        [metadata.files]
        foo = [
            {file = "foo-1.0.tar.gz", hash = "sha256:abc"},
        ]
    "#})
    .unwrap();
    assert_eq!(lock.lock_version().to_string(), "1.0");
    assert!(!lock.is_locked_groups_and_markers());
    assert_eq!(lock.packages()[0].files()[0].hash.to_string(), "sha256:abc");
    assert_eq!(lock.packages()[0].markers(), &PackageMarkers::Always);
}

#[test]
fn unsupported_version() {
    let err = Lock::from_toml(indoc! {r#"
        [metadata]
        lock-version = "3.0"
    "#})
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Lock file version `3.0` is not supported; the newest supported version is `2.x`"
    );
}

#[test]
fn invalid_markers() {
    let err = Lock::from_toml(indoc! {r#"
        [[package]]
        name = "foo"
        version = "1.0"
        markers = "python_version >="
    "#})
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid markers for package `foo`");
    assert!(err.source().is_some());
}

#[test]
fn missing_lock_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = Lock::read(&temp_dir.path().join("poetry.lock")).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Lock file `"), "{message}");
    assert!(
        message.ends_with("poetry.lock` not found; run `poetry lock` to create it"),
        "{message}"
    );
}
