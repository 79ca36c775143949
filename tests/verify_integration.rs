mod common;

use common::{stderr, stdout, FakeRepo};
use std::fs;

#[test]
fn verifies_place_files_scenario() {
    let repo = FakeRepo::new("exit 0");
    let target = repo.test_dir.join("pf.testtarget");
    fs::write(
        &target,
        "#TARGET name pf\n#TARGET type place-files\n\ngoodieA > targetname.testdest\n",
    )
    .expect("write target");
    let captured = repo.test_dir.join("pf.out");
    fs::write(
        &captured,
        format!(
            "simulated: cp -a {}/goodieA {}/targetname.testdest\n",
            repo.goodies_dir.display(),
            repo.home.display()
        ),
    )
    .expect("write output");

    let output = repo.tconf(
        "verify",
        &[
            "--target",
            target.to_str().expect("utf-8 path"),
            "--output",
            captured.to_str().expect("utf-8 path"),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("PASS: place-files target pf"));
}

#[test]
fn verifies_pkg_install_scenario_and_explains() {
    let repo = FakeRepo::new("exit 0");
    let target = repo.test_dir.join("pk.testtarget");
    fs::write(&target, "#TARGET name pk\n#TARGET type pkg-install\n\nfoo bar\n")
        .expect("write target");
    let captured = repo.test_dir.join("pk.out");
    fs::write(
        &captured,
        "simulated: sudo apt-get update >/dev/null\n\
         simulated: sudo apt-get install -y >/dev/null foo bar\n",
    )
    .expect("write output");

    let output = repo.tconf(
        "verify",
        &[
            "--target",
            target.to_str().expect("utf-8 path"),
            "--output",
            captured.to_str().expect("utf-8 path"),
            "--explain",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("expect: sudo apt-get install -y >/dev/null foo bar"));
    assert!(out.contains("PASS: pkg-install target pk"));
}

#[test]
fn truncated_capture_fails_verification() {
    let repo = FakeRepo::new("exit 0");
    let target = repo.test_dir.join("pk.testtarget");
    fs::write(&target, "#TARGET name pk\n#TARGET type pkg-install\n\nfoo\nbar\n")
        .expect("write target");
    let captured = repo.test_dir.join("pk.out");
    fs::write(
        &captured,
        "simulated: sudo apt-get update >/dev/null\n\
         simulated: sudo apt-get install -y >/dev/null foo\n",
    )
    .expect("write output");

    let output = repo.tconf(
        "verify",
        &[
            "--target",
            target.to_str().expect("utf-8 path"),
            "--output",
            captured.to_str().expect("utf-8 path"),
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("FAIL: pkg-install target pk (not enough output)"), "stderr: {err}");
    assert!(err.contains("Found: [Not enough output]"));
}

#[test]
fn generate_writes_a_parseable_target() {
    let repo = FakeRepo::new("exit 0");

    let output = repo.tconf("generate", &["--type", "script", "--seed", "4"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let path = stdout(&output).trim().to_string();
    let text = fs::read_to_string(&path).expect("read generated target");
    assert!(text.starts_with("#!"));
    assert!(text.contains("#TARGET type script"));
    assert!(path.ends_with(".testtarget"));

    let bogus = repo.tconf("generate", &["--type", "bogus"]);
    assert_eq!(bogus.status.code(), Some(1));
    let err = stderr(&bogus);
    assert!(err.contains("Cannot test unknown target type bogus."));
    assert_eq!(err.lines().filter(|line| line.contains("bogus")).count(), 1);
}
