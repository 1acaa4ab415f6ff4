// Copyright 2024-2025 The Reclone Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;
use std::process::Output;

use testutils::TestRepo;
use testutils::new_temp_dir;

fn reclone() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("reclone").unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn two_branch_source(root: &Path) -> TestRepo {
    let src = TestRepo::init(root.join("src"));
    src.set_ref("refs/heads/main", "aaaa");
    src.set_ref("refs/heads/dev", "bbbb");
    src.set_head_symref("refs/heads/main");
    src
}

#[test]
#[cfg(unix)]
fn test_clone_into_new_directory() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let dst = temp_dir.path().join("clone");
    let unpack = testutils::write_script(temp_dir.path(), "fake-unpack-trees", "exit 0");

    let output = reclone()
        .env("RECLONE_UNPACK_TREES", &unpack)
        .arg(src.git_dir.to_str().unwrap())
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("Cloning into"), "{}", stderr(&output));

    assert_eq!(
        fs::read_to_string(dst.join(".git/refs/remotes/origin/main")).unwrap(),
        "aaaa\n"
    );
    assert_eq!(
        fs::read_to_string(dst.join(".git/HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
}

#[test]
fn test_bare_clone() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let dst = temp_dir.path().join("clone.git");

    let output = reclone()
        .arg("--bare")
        .arg(src.git_dir.to_str().unwrap())
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(
        stderr(&output).contains("Cloning into bare repository"),
        "{}",
        stderr(&output)
    );

    let config = fs::read_to_string(dst.join("config")).unwrap();
    assert!(config.contains("bare = true"), "{config}");
    assert!(!dst.join(".git").exists());
    // a bare clone maps branches straight into its own heads namespace
    assert_eq!(
        fs::read_to_string(dst.join("refs/heads/main")).unwrap(),
        "aaaa\n"
    );
    assert_eq!(
        fs::read_to_string(dst.join("HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
}

#[test]
fn test_quiet_clone_prints_no_status() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let dst = temp_dir.path().join("clone");

    let output = reclone()
        .arg("-q")
        .arg("--no-checkout")
        .arg(src.git_dir.to_str().unwrap())
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!stderr(&output).contains("Cloning into"), "{}", stderr(&output));
}

#[test]
fn test_missing_source_is_fatal() {
    let temp_dir = new_temp_dir();
    let dst = temp_dir.path().join("clone");
    let output = reclone()
        .arg("/no/such/repository")
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(128), "{}", stderr(&output));
    assert!(stderr(&output).contains("does not exist"), "{}", stderr(&output));
    assert!(!dst.exists());
}

#[test]
fn test_nonempty_destination_is_fatal() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let dst = temp_dir.path().join("occupied");
    fs::create_dir_all(&dst).unwrap();
    fs::write(dst.join("file"), "keep me").unwrap();

    let output = reclone()
        .arg(src.git_dir.to_str().unwrap())
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(128), "{}", stderr(&output));
    assert!(
        stderr(&output).contains("already exists and is not an empty directory"),
        "{}",
        stderr(&output)
    );
    assert_eq!(fs::read_to_string(dst.join("file")).unwrap(), "keep me");
}

#[test]
fn test_resume_rejects_other_options() {
    let output = reclone()
        .arg("--resume")
        .arg("--bare")
        .arg("some-dir")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
    assert!(
        stderr(&output).contains("cannot be used with"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn test_bare_with_origin_is_fatal() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let output = reclone()
        .arg("--bare")
        .arg("--origin")
        .arg("upstream")
        .arg(src.git_dir.to_str().unwrap())
        .arg(temp_dir.path().join("dst").to_str().unwrap())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(128), "{}", stderr(&output));
    assert!(stderr(&output).contains("incompatible"), "{}", stderr(&output));
}

#[test]
fn test_shared_clone_borrows_objects() {
    let temp_dir = new_temp_dir();
    let src = two_branch_source(temp_dir.path());
    let dst = temp_dir.path().join("clone");

    let output = reclone()
        .arg("--shared")
        .arg("--no-checkout")
        .arg(src.git_dir.to_str().unwrap())
        .arg(dst.to_str().unwrap())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let alternates = fs::read_to_string(dst.join(".git/objects/info/alternates")).unwrap();
    assert!(alternates.trim_end().ends_with("objects"), "{alternates}");
    assert!(!dst.join(".git/objects/aa").exists());
}
