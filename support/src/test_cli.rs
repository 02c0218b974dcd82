use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};

/// Runs a binary over `NAME.L2` fixtures.
///
/// A fixture succeeds when stdout equals `NAME.L2.out`; if `NAME.error`
/// exists instead, the binary must fail with exactly that stderr.
pub struct TestCli {
  base_dir: PathBuf,
  bin: String,
}

impl TestCli {
  pub fn new<S: ToString, P: AsRef<Path>>(bin_name: S, base_dir: P) -> Self {
    Self {
      base_dir: base_dir.as_ref().to_owned(),
      bin: bin_name.to_string(),
    }
  }

  pub fn test<S: AsRef<str>>(self, prog_name: S) {
    let prog = prog_name.as_ref();
    let source = self.base_dir.join(format!("{}.L2", prog));
    let mut cmd = Command::cargo_bin(&self.bin).unwrap();
    cmd.arg(&source);

    let error = self.base_dir.join(format!("{}.error", prog));
    if error.exists() {
      let stderr = fs::read_to_string(error).unwrap();
      cmd
        .assert()
        .failure()
        .stderr(predicates::str::diff(stderr));
      return;
    }

    let output = self.base_dir.join(format!("{}.L2.out", prog));
    let stdout = fs::read_to_string(&output).unwrap_or_else(|err| {
      panic!("{} has no expected output: {:?}", prog, err)
    });
    cmd
      .assert()
      .success()
      .stdout(predicates::str::diff(stdout));
  }
}
