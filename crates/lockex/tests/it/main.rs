//! this is the single integration test, as documented by matklad
//! in <https://matklad.github.io/post/2021/02/27/delete-cargo-integration-tests.html>

mod export;
